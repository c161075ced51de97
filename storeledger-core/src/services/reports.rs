//! Financial aggregation
//!
//! Pure functions over already-fetched transactions. Callers restrict the
//! input to what the user may see; nothing here touches a backend.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::transaction::amount;
use crate::domain::{
    CashFlowActivity, Category, Store, Transaction, TransactionNature, TransactionType,
};

/// Inclusive date range a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::validation(format!("Invalid month: {}-{:02}", year, month)))
}

fn last_of_month(first: NaiveDate) -> Result<NaiveDate> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| Error::validation("Date out of range"))
}

impl ReportPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::validation("Start date must not be after end date"));
        }
        Ok(Self { start, end })
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = first_of_month(year, month)?;
        Self::new(start, last_of_month(start)?)
    }

    pub fn this_month(today: NaiveDate) -> Result<Self> {
        Self::month(today.year(), today.month())
    }

    pub fn last_month(today: NaiveDate) -> Result<Self> {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        Self::month(year, month)
    }

    pub fn this_quarter(today: NaiveDate) -> Result<Self> {
        let first_month = (today.month() - 1) / 3 * 3 + 1;
        let start = first_of_month(today.year(), first_month)?;
        let end = last_of_month(first_of_month(today.year(), first_month + 2)?)?;
        Self::new(start, end)
    }

    pub fn this_year(today: NaiveDate) -> Result<Self> {
        Self::year(today.year())
    }

    pub fn last_year(today: NaiveDate) -> Result<Self> {
        Self::year(today.year() - 1)
    }

    fn year(year: i32) -> Result<Self> {
        let start = first_of_month(year, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| Error::validation("Date out of range"))?;
        Self::new(start, end)
    }

    /// Resolve a preset name such as `this_month` or `last-year`
    pub fn preset(name: &str, today: NaiveDate) -> Result<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "this_month" => Self::this_month(today),
            "last_month" => Self::last_month(today),
            "this_quarter" => Self::this_quarter(today),
            "this_year" => Self::this_year(today),
            "last_year" => Self::last_year(today),
            other => Err(Error::validation(format!(
                "Unknown period '{}', expected this_month, last_month, this_quarter, \
                 this_year or last_year",
                other
            ))),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First day of every calendar month the period touches
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut months = Vec::new();
        let mut cursor = NaiveDate::from_ymd_opt(self.start.year(), self.start.month(), 1);
        while let Some(month) = cursor {
            if month > self.end {
                break;
            }
            months.push(month);
            cursor = month.checked_add_months(Months::new(1));
        }
        months
    }
}

fn overflow() -> Error {
    Error::validation("Totals exceed the supported amount range; narrow the period or store")
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(overflow)
}

fn sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(overflow)
}

fn sum(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, add)
}

/// Percentage `part / whole`, 2 dp; `None` when `whole` is zero
fn percent(part: Decimal, whole: Decimal) -> Result<Option<Decimal>> {
    if whole.is_zero() {
        return Ok(None);
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|p| Some(p.round_dp(2)))
        .ok_or_else(overflow)
}

/// Category lookup keyed by (type, name)
struct CategoryIndex<'a> {
    by_key: HashMap<(TransactionType, &'a str), &'a Category>,
}

impl<'a> CategoryIndex<'a> {
    fn new(categories: &'a [Category]) -> Self {
        Self {
            by_key: categories.iter().map(|c| ((c.kind, c.name.as_str()), c)).collect(),
        }
    }

    fn find(&self, tx: &Transaction) -> Option<&'a Category> {
        self.by_key.get(&(tx.kind, tx.category.as_str())).copied()
    }

    fn activity(&self, tx: &Transaction) -> CashFlowActivity {
        tx.cash_flow_activity
            .or_else(|| self.find(tx).and_then(|c| c.cash_flow_activity))
            .unwrap_or(CashFlowActivity::Operating)
    }

    fn nature(&self, tx: &Transaction) -> TransactionNature {
        tx.transaction_nature
            .or_else(|| self.find(tx).and_then(|c| c.transaction_nature))
            .unwrap_or(TransactionNature::Operating)
    }
}

/// One category inside a report section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryLine {
    pub category: String,
    #[serde(with = "amount")]
    pub amount: Decimal,
    pub count: usize,
    /// Percent of the section total
    #[serde(with = "amount")]
    pub share: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(with = "amount")]
    pub total: Decimal,
    pub lines: Vec<CategoryLine>,
}

impl ReportSection {
    fn from_totals(totals: BTreeMap<String, (Decimal, usize)>) -> Result<Self> {
        let total = sum(totals.values().map(|(amount, _)| *amount))?;
        let mut lines = totals
            .into_iter()
            .map(|(category, (amount, count))| {
                Ok(CategoryLine {
                    share: percent(amount, total)?.unwrap_or(Decimal::ZERO),
                    category,
                    amount,
                    count,
                })
            })
            .collect::<Result<Vec<CategoryLine>>>()?;
        lines.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.category.cmp(&b.category)));
        Ok(Self { total, lines })
    }
}

fn add_to(totals: &mut BTreeMap<String, (Decimal, usize)>, tx: &Transaction) -> Result<()> {
    let entry = totals.entry(tx.category.clone()).or_insert((Decimal::ZERO, 0));
    entry.0 = add(entry.0, tx.amount)?;
    entry.1 += 1;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitLossReport {
    pub period: ReportPeriod,
    /// Operating income
    pub revenue: ReportSection,
    pub operating_expenses: ReportSection,
    pub non_operating_income: ReportSection,
    pub non_operating_expenses: ReportSection,
    #[serde(with = "amount")]
    pub total_income: Decimal,
    #[serde(with = "amount")]
    pub total_expense: Decimal,
    #[serde(with = "amount")]
    pub operating_profit: Decimal,
    #[serde(with = "amount")]
    pub net_profit: Decimal,
    #[serde(with = "amount::option")]
    pub profit_margin: Option<Decimal>,
    /// In-period transactions left out of profit and loss
    pub excluded_count: usize,
}

/// Profit and loss statement for the period
pub fn profit_loss(
    transactions: &[Transaction],
    categories: &[Category],
    period: ReportPeriod,
) -> Result<ProfitLossReport> {
    let index = CategoryIndex::new(categories);
    let mut revenue = BTreeMap::new();
    let mut operating_expenses = BTreeMap::new();
    let mut non_operating_income = BTreeMap::new();
    let mut non_operating_expenses = BTreeMap::new();
    let mut excluded_count = 0;

    for tx in transactions.iter().filter(|t| period.contains(t.date)) {
        if !tx.include_in_profit_loss {
            excluded_count += 1;
            continue;
        }
        let bucket = match (tx.kind, index.nature(tx)) {
            (TransactionType::Income, TransactionNature::Operating) => &mut revenue,
            (TransactionType::Income, TransactionNature::NonOperating) => {
                &mut non_operating_income
            }
            (TransactionType::Expense, TransactionNature::Operating) => &mut operating_expenses,
            (TransactionType::Expense, TransactionNature::NonOperating) => {
                &mut non_operating_expenses
            }
        };
        add_to(bucket, tx)?;
    }

    let revenue = ReportSection::from_totals(revenue)?;
    let operating_expenses = ReportSection::from_totals(operating_expenses)?;
    let non_operating_income = ReportSection::from_totals(non_operating_income)?;
    let non_operating_expenses = ReportSection::from_totals(non_operating_expenses)?;

    let total_income = add(revenue.total, non_operating_income.total)?;
    let total_expense = add(operating_expenses.total, non_operating_expenses.total)?;
    let net_profit = sub(total_income, total_expense)?;

    Ok(ProfitLossReport {
        period,
        operating_profit: sub(revenue.total, operating_expenses.total)?,
        profit_margin: percent(net_profit, total_income)?,
        revenue,
        operating_expenses,
        non_operating_income,
        non_operating_expenses,
        total_income,
        total_expense,
        net_profit,
        excluded_count,
    })
}

/// Net movement of one category within an activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowLine {
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Signed: inflows positive, outflows negative
    #[serde(with = "amount")]
    pub amount: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFlow {
    pub activity: CashFlowActivity,
    #[serde(with = "amount")]
    pub inflow: Decimal,
    #[serde(with = "amount")]
    pub outflow: Decimal,
    #[serde(with = "amount")]
    pub net: Decimal,
    pub lines: Vec<CashFlowLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowReport {
    pub period: ReportPeriod,
    #[serde(with = "amount")]
    pub opening_balance: Decimal,
    /// Operating, investing, financing - always all three
    pub activities: Vec<ActivityFlow>,
    #[serde(with = "amount")]
    pub net_change: Decimal,
    #[serde(with = "amount")]
    pub closing_balance: Decimal,
}

fn activity_flow(
    transactions: &[Transaction],
    index: &CategoryIndex<'_>,
    activity: CashFlowActivity,
    period: ReportPeriod,
) -> Result<ActivityFlow> {
    let mut inflow = Decimal::ZERO;
    let mut outflow = Decimal::ZERO;
    let mut lines: BTreeMap<(String, &'static str), CashFlowLine> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|t| period.contains(t.date) && index.activity(t) == activity)
    {
        match tx.kind {
            TransactionType::Income => inflow = add(inflow, tx.amount)?,
            TransactionType::Expense => outflow = add(outflow, tx.amount)?,
        }
        let line = lines
            .entry((tx.category.clone(), tx.kind.as_str()))
            .or_insert_with(|| CashFlowLine {
                category: tx.category.clone(),
                kind: tx.kind,
                amount: Decimal::ZERO,
                count: 0,
            });
        line.amount = add(line.amount, tx.signed_amount())?;
        line.count += 1;
    }
    let mut lines: Vec<CashFlowLine> = lines.into_values().collect();
    lines.sort_by(|a, b| {
        b.amount
            .abs()
            .cmp(&a.amount.abs())
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(ActivityFlow {
        activity,
        inflow,
        outflow,
        net: sub(inflow, outflow)?,
        lines,
    })
}

/// Cash flow statement. Every transaction counts, whether or not it is part
/// of profit and loss.
pub fn cash_flow(
    transactions: &[Transaction],
    categories: &[Category],
    period: ReportPeriod,
) -> Result<CashFlowReport> {
    let index = CategoryIndex::new(categories);
    let opening_balance = sum(
        transactions
            .iter()
            .filter(|t| t.date < period.start)
            .map(Transaction::signed_amount),
    )?;

    let activities = CashFlowActivity::ALL
        .iter()
        .map(|&activity| activity_flow(transactions, &index, activity, period))
        .collect::<Result<Vec<ActivityFlow>>>()?;

    let net_change = sum(activities.iter().map(|a| a.net))?;

    Ok(CashFlowReport {
        period,
        opening_balance,
        activities,
        net_change,
        closing_balance: add(opening_balance, net_change)?,
    })
}

/// Performance of one store. `store_id` is `None` for the unassigned row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub store_id: Option<String>,
    pub store_name: String,
    #[serde(with = "amount")]
    pub income: Decimal,
    #[serde(with = "amount")]
    pub expense: Decimal,
    #[serde(with = "amount")]
    pub net_profit: Decimal,
    pub transaction_count: usize,
    #[serde(with = "amount")]
    pub average_transaction: Decimal,
    #[serde(with = "amount::option")]
    pub profit_margin: Option<Decimal>,
    #[serde(with = "amount::option")]
    pub income_share: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreTotals {
    #[serde(with = "amount")]
    pub income: Decimal,
    #[serde(with = "amount")]
    pub expense: Decimal,
    #[serde(with = "amount")]
    pub net_profit: Decimal,
    pub transaction_count: usize,
    #[serde(with = "amount::option")]
    pub profit_margin: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetricsReport {
    pub period: ReportPeriod,
    pub stores: Vec<StoreMetrics>,
    pub totals: StoreTotals,
    pub top_store_id: Option<String>,
}

pub const UNASSIGNED_STORE_NAME: &str = "Unassigned";

#[derive(Default)]
struct Tally {
    income: Decimal,
    expense: Decimal,
    count: usize,
}

impl Tally {
    fn add(&mut self, tx: &Transaction) -> Result<()> {
        match tx.kind {
            TransactionType::Income => self.income = add(self.income, tx.amount)?,
            TransactionType::Expense => self.expense = add(self.expense, tx.amount)?,
        }
        self.count += 1;
        Ok(())
    }

    fn net(&self) -> Result<Decimal> {
        sub(self.income, self.expense)
    }
}

/// Per-store comparison. `stores` are the stores in the caller's scope;
/// transactions of other stores are ignored.
pub fn store_metrics(
    transactions: &[Transaction],
    stores: &[Store],
    period: ReportPeriod,
) -> Result<StoreMetricsReport> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    let mut unassigned = Tally::default();

    for tx in transactions
        .iter()
        .filter(|t| t.include_in_profit_loss && period.contains(t.date))
    {
        match tx.store_id.as_deref() {
            Some(id) if stores.iter().any(|s| s.id == id) => {
                tallies.entry(id).or_default().add(tx)?
            }
            Some(_) => {}
            None => unassigned.add(tx)?,
        }
    }

    let total_income = add(sum(tallies.values().map(|t| t.income))?, unassigned.income)?;
    let total_expense = add(sum(tallies.values().map(|t| t.expense))?, unassigned.expense)?;
    let total_count = tallies.values().map(|t| t.count).sum::<usize>() + unassigned.count;

    let row = |store_id: Option<String>,
               store_name: String,
               tally: &Tally|
     -> Result<StoreMetrics> {
        let net_profit = tally.net()?;
        let average_transaction = if tally.count == 0 {
            Decimal::ZERO
        } else {
            add(tally.income, tally.expense)?
                .checked_div(Decimal::from(tally.count))
                .ok_or_else(overflow)?
                .round_dp(2)
        };
        Ok(StoreMetrics {
            store_id,
            store_name,
            income: tally.income,
            expense: tally.expense,
            net_profit,
            transaction_count: tally.count,
            average_transaction,
            profit_margin: percent(net_profit, tally.income)?,
            income_share: percent(tally.income, total_income)?,
        })
    };

    let empty = Tally::default();
    let mut rows = stores
        .iter()
        .map(|s| {
            let tally = tallies.get(s.id.as_str()).unwrap_or(&empty);
            row(Some(s.id.clone()), s.name.clone(), tally)
        })
        .collect::<Result<Vec<StoreMetrics>>>()?;
    if unassigned.count > 0 {
        rows.push(row(None, UNASSIGNED_STORE_NAME.to_string(), &unassigned)?);
    }
    rows.sort_by(|a, b| {
        b.net_profit
            .cmp(&a.net_profit)
            .then_with(|| a.store_name.cmp(&b.store_name))
    });

    let top_store_id = rows
        .iter()
        .find(|r| r.store_id.is_some() && r.transaction_count > 0)
        .and_then(|r| r.store_id.clone());

    let net_profit = sub(total_income, total_expense)?;
    Ok(StoreMetricsReport {
        period,
        stores: rows,
        totals: StoreTotals {
            income: total_income,
            expense: total_expense,
            net_profit,
            transaction_count: total_count,
            profit_margin: percent(net_profit, total_income)?,
        },
        top_store_id,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// `YYYY-MM`
    pub month: String,
    #[serde(with = "amount")]
    pub income: Decimal,
    #[serde(with = "amount")]
    pub expense: Decimal,
    #[serde(with = "amount")]
    pub net: Decimal,
}

/// Monthly income and expense of profit-and-loss transactions. Months
/// without activity are included with zeros.
pub fn monthly_trend(
    transactions: &[Transaction],
    period: ReportPeriod,
) -> Result<Vec<TrendPoint>> {
    let mut by_month: BTreeMap<NaiveDate, Tally> =
        period.months().into_iter().map(|m| (m, Tally::default())).collect();

    for tx in transactions
        .iter()
        .filter(|t| t.include_in_profit_loss && period.contains(t.date))
    {
        if let Some(month) = NaiveDate::from_ymd_opt(tx.date.year(), tx.date.month(), 1) {
            by_month.entry(month).or_default().add(tx)?;
        }
    }

    by_month
        .into_iter()
        .map(|(month, tally)| {
            Ok(TrendPoint {
                month: month.format("%Y-%m").to_string(),
                income: tally.income,
                expense: tally.expense,
                net: tally.net()?,
            })
        })
        .collect()
}

pub const RECENT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub period: ReportPeriod,
    #[serde(with = "amount")]
    pub total_income: Decimal,
    #[serde(with = "amount")]
    pub total_expense: Decimal,
    #[serde(with = "amount")]
    pub net_profit: Decimal,
    #[serde(with = "amount::option")]
    pub profit_margin: Option<Decimal>,
    pub transaction_count: usize,
    pub trend: Vec<TrendPoint>,
    pub recent: Vec<Transaction>,
}

/// Headline numbers for the period plus the latest activity
pub fn dashboard(transactions: &[Transaction], period: ReportPeriod) -> Result<Dashboard> {
    let mut totals = Tally::default();
    for tx in transactions
        .iter()
        .filter(|t| t.include_in_profit_loss && period.contains(t.date))
    {
        totals.add(tx)?;
    }

    let mut recent: Vec<Transaction> = transactions
        .iter()
        .filter(|t| period.contains(t.date))
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));
    recent.truncate(RECENT_TRANSACTIONS);

    let net_profit = totals.net()?;
    Ok(Dashboard {
        period,
        total_income: totals.income,
        total_expense: totals.expense,
        net_profit,
        profit_margin: percent(net_profit, totals.income)?,
        transaction_count: totals.count,
        trend: monthly_trend(transactions, period)?,
        recent,
    })
}
