//! Category domain model and the system category set

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};
use super::transaction::{CashFlowActivity, TransactionNature, TransactionType};

/// A transaction category, scoped to one company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub cash_flow_activity: Option<CashFlowActivity>,
    #[serde(default)]
    pub transaction_nature: Option<TransactionNature>,
    #[serde(default = "default_true")]
    pub include_in_profit_loss: bool,
    #[serde(default)]
    pub is_system: bool,
    pub company_id: String,
}

fn default_true() -> bool {
    true
}

/// Input for creating a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub cash_flow_activity: Option<CashFlowActivity>,
    #[serde(default)]
    pub transaction_nature: Option<TransactionNature>,
    #[serde(default = "default_true")]
    pub include_in_profit_loss: bool,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub company_id: String,
}

impl NewCategory {
    pub fn validate(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::validation("Category name is required"));
        }
        if self.name.chars().count() > 50 {
            return Err(Error::validation("Category name cannot exceed 50 characters"));
        }
        Ok(())
    }
}

struct Template {
    name: &'static str,
    kind: TransactionType,
    activity: CashFlowActivity,
    nature: TransactionNature,
    in_profit_loss: bool,
}

const fn t(
    name: &'static str,
    kind: TransactionType,
    activity: CashFlowActivity,
    nature: TransactionNature,
    in_profit_loss: bool,
) -> Template {
    Template { name, kind, activity, nature, in_profit_loss }
}

use CashFlowActivity::{Financing, Investing, Operating};
use TransactionNature::{NonOperating, Operating as CoreBusiness};
use TransactionType::{Expense, Income};

const DEFAULTS: &[Template] = &[
    t("Sales Revenue", Income, Operating, CoreBusiness, true),
    t("Service Income", Income, Operating, CoreBusiness, true),
    t("Interest Income", Income, Investing, NonOperating, true),
    t("Investment Income", Income, Investing, NonOperating, true),
    t("Other Income", Income, Operating, NonOperating, true),
    t("Loan Proceeds", Income, Financing, NonOperating, false),
    t("Capital Contribution", Income, Financing, NonOperating, false),
    t("Cost of Goods", Expense, Operating, CoreBusiness, true),
    t("Rent", Expense, Operating, CoreBusiness, true),
    t("Salaries", Expense, Operating, CoreBusiness, true),
    t("Utilities", Expense, Operating, CoreBusiness, true),
    t("Marketing", Expense, Operating, CoreBusiness, true),
    t("Taxes", Expense, Operating, CoreBusiness, true),
    t("Interest Expense", Expense, Financing, NonOperating, true),
    t("Other Expense", Expense, Operating, NonOperating, true),
    t("Equipment Purchase", Expense, Investing, NonOperating, false),
    t("Loan Repayment", Expense, Financing, NonOperating, false),
    t("Owner Drawings", Expense, Financing, NonOperating, false),
];

/// System categories seeded for every new company
pub fn default_categories(company_id: &str) -> Vec<NewCategory> {
    DEFAULTS
        .iter()
        .map(|d| NewCategory {
            name: d.name.to_string(),
            kind: d.kind,
            cash_flow_activity: Some(d.activity),
            transaction_nature: Some(d.nature),
            include_in_profit_loss: d.in_profit_loss,
            is_system: true,
            company_id: company_id.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_categories_are_unique_per_type() {
        let defaults = default_categories("c1");
        let keys: HashSet<_> = defaults.iter().map(|c| (c.kind, c.name.clone())).collect();
        assert_eq!(keys.len(), defaults.len());
        assert!(defaults.iter().all(|c| c.is_system && c.company_id == "c1"));
    }

    #[test]
    fn test_capital_flows_stay_out_of_profit_and_loss() {
        let defaults = default_categories("c1");
        for name in ["Loan Proceeds", "Equipment Purchase", "Loan Repayment", "Owner Drawings"] {
            let cat = defaults.iter().find(|c| c.name == name).unwrap();
            assert!(!cat.include_in_profit_loss, "{} should be excluded", name);
            assert_ne!(cat.cash_flow_activity, Some(CashFlowActivity::Operating));
        }
        let sales = defaults.iter().find(|c| c.name == "Sales Revenue").unwrap();
        assert!(sales.include_in_profit_loss);
        assert_eq!(sales.transaction_nature, Some(TransactionNature::Operating));
    }

    #[test]
    fn test_new_category_validation() {
        let mut cat = NewCategory {
            name: "  Packaging ".to_string(),
            kind: TransactionType::Expense,
            cash_flow_activity: None,
            transaction_nature: None,
            include_in_profit_loss: true,
            is_system: false,
            company_id: String::new(),
        };
        cat.validate().unwrap();
        assert_eq!(cat.name, "Packaging");

        cat.name = "   ".to_string();
        assert!(cat.validate().is_err());
    }
}
