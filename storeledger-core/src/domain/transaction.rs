//! Transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

const MAX_DESCRIPTION_LEN: usize = 500;

/// Largest accepted amount, 999,999,999,999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

/// Cash-flow statement section a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashFlowActivity {
    Operating,
    Investing,
    Financing,
}

impl CashFlowActivity {
    pub const ALL: [CashFlowActivity; 3] = [
        CashFlowActivity::Operating,
        CashFlowActivity::Investing,
        CashFlowActivity::Financing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CashFlowActivity::Operating => "operating",
            CashFlowActivity::Investing => "investing",
            CashFlowActivity::Financing => "financing",
        }
    }
}

/// Whether a transaction comes from the core business or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionNature {
    Operating,
    NonOperating,
}

impl TransactionNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionNature::Operating => "operating",
            TransactionNature::NonOperating => "non_operating",
        }
    }
}

/// A recorded income or expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    /// Always positive, the sign comes from `kind`
    #[serde(with = "amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub cash_flow_activity: Option<CashFlowActivity>,
    #[serde(default)]
    pub transaction_nature: Option<TransactionNature>,
    #[serde(default = "default_true")]
    pub include_in_profit_loss: bool,
    pub company_id: String,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Transaction {
    /// Amount with sign applied: positive for income, negative for expense
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    /// Apply a partial update. Nothing changes when the result is invalid.
    pub fn apply(&mut self, update: &TransactionUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(kind) = update.kind {
            next.kind = kind;
        }
        if let Some(category) = &update.category {
            next.category = category.trim().to_string();
        }
        if let Some(amount) = update.amount {
            next.amount = amount;
        }
        if let Some(description) = &update.description {
            next.description = normalize_description(Some(description));
        }
        if let Some(date) = update.date {
            next.date = date;
        }
        if let Some(store_id) = &update.store_id {
            next.store_id = store_id.clone();
        }
        if let Some(activity) = update.cash_flow_activity {
            next.cash_flow_activity = activity;
        }
        if let Some(nature) = update.transaction_nature {
            next.transaction_nature = nature;
        }
        if let Some(include) = update.include_in_profit_loss {
            next.include_in_profit_loss = include;
        }

        validate_amount(next.amount)?;
        validate_category(&next.category)?;
        validate_description(next.description.as_deref())?;
        next.updated_at = Some(Utc::now());
        *self = next;
        Ok(())
    }
}

/// Input for recording a new transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(with = "amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub cash_flow_activity: Option<CashFlowActivity>,
    #[serde(default)]
    pub transaction_nature: Option<TransactionNature>,
    #[serde(default)]
    pub include_in_profit_loss: Option<bool>,
}

impl NewTransaction {
    pub fn new(
        kind: TransactionType,
        category: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            amount,
            description: None,
            date,
            store_id: None,
            cash_flow_activity: None,
            transaction_nature: None,
            include_in_profit_loss: None,
        }
    }

    pub fn with_store(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trim text fields and check business rules
    pub fn validate(&mut self) -> Result<()> {
        self.category = self.category.trim().to_string();
        self.description = normalize_description(self.description.as_deref());
        self.store_id = self
            .store_id
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        validate_amount(self.amount)?;
        validate_category(&self.category)?;
        validate_description(self.description.as_deref())
    }

    /// Build the record that is sent to the backend
    pub fn into_record(self, company_id: &str, created_by: &str) -> TransactionRecord {
        TransactionRecord {
            kind: self.kind,
            category: self.category,
            amount: self.amount,
            description: self.description,
            date: self.date,
            store_id: self.store_id,
            cash_flow_activity: self.cash_flow_activity,
            transaction_nature: self.transaction_nature,
            include_in_profit_loss: self.include_in_profit_loss.unwrap_or(true),
            company_id: company_id.to_string(),
            created_by: Some(created_by.to_string()),
        }
    }
}

/// A transaction without backend-assigned fields (id, timestamps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(with = "amount")]
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub store_id: Option<String>,
    pub cash_flow_activity: Option<CashFlowActivity>,
    pub transaction_nature: Option<TransactionNature>,
    pub include_in_profit_loss: bool,
    pub company_id: String,
    pub created_by: Option<String>,
}

/// Partial update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionUpdate {
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionType>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, with = "amount::option")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub store_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub cash_flow_activity: Option<Option<CashFlowActivity>>,
    #[serde(default, deserialize_with = "double_option")]
    pub transaction_nature: Option<Option<TransactionNature>>,
    #[serde(default)]
    pub include_in_profit_loss: Option<bool>,
}

/// Distinguish a missing field (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn normalize_description(desc: Option<&str>) -> Option<String> {
    desc.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string)
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation("Amount must be greater than zero"));
    }
    if amount > MAX_AMOUNT {
        return Err(Error::validation("Amount cannot exceed 999,999,999,999.99"));
    }
    if amount.normalize().scale() > 2 {
        return Err(Error::validation("Amount cannot have more than 2 decimal places"));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<()> {
    if category.is_empty() {
        return Err(Error::validation("Category is required"));
    }
    Ok(())
}

fn validate_description(desc: Option<&str>) -> Result<()> {
    if desc.map_or(0, |d| d.chars().count()) > MAX_DESCRIPTION_LEN {
        return Err(Error::validation(format!(
            "Description cannot exceed {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

/// Amounts travel as JSON numbers but backends sometimes hand back strings.
///
/// A value that an `f64` cannot hold exactly is written as a decimal string
/// instead, so nothing is rounded on the way out.
pub mod amount {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value as JsonValue;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value.to_f64() {
            Some(f) if f.to_string().parse::<Decimal>().ok() == Some(*value) => {
                serializer.serialize_f64(f)
            }
            _ => serializer.serialize_str(&value.normalize().to_string()),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let value: JsonValue = Deserialize::deserialize(deserializer)?;
        parse(&value).map_err(D::Error::custom)
    }

    pub(crate) fn parse(value: &JsonValue) -> Result<Decimal, String> {
        let raw = match value {
            JsonValue::Number(n) => n.to_string(),
            JsonValue::String(s) => s.trim().to_string(),
            _ => return Err("expected number or string for amount".to_string()),
        };
        raw.parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&raw))
            .map_err(|e| format!("invalid decimal: {}", e))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
        where
            D: Deserializer<'de>,
        {
            use serde::de::Error;
            let value: Option<JsonValue> = Option::deserialize(deserializer)?;
            match value {
                None | Some(JsonValue::Null) => Ok(None),
                Some(v) => parse(&v).map(Some).map_err(D::Error::custom),
            }
        }
    }
}
