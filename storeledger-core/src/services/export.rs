//! CSV export of transactions

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{Permission, Transaction};
use crate::ports::LedgerRepository;

use super::auth::UserContext;
use super::transactions::{fetch_scoped, query_filter, TransactionQuery};

const HEADER: [&str; 9] = [
    "date",
    "type",
    "category",
    "amount",
    "store",
    "description",
    "cash_flow_activity",
    "transaction_nature",
    "include_in_profit_loss",
];

pub struct ExportService {
    repository: Arc<dyn LedgerRepository>,
}

impl ExportService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Suggested file name for a download
    pub fn file_name(query: &TransactionQuery) -> String {
        match (query.start, query.end) {
            (Some(start), Some(end)) => format!("transactions-{}-{}.csv", start, end),
            _ => "transactions.csv".to_string(),
        }
    }

    pub async fn export_csv(&self, ctx: &UserContext, query: &TransactionQuery) -> Result<String> {
        ctx.require(Permission::ExportData)?;
        let filter = query_filter(ctx, query)?;
        let transactions = fetch_scoped(self.repository.as_ref(), ctx, filter).await?;
        let stores: HashMap<String, String> = self
            .repository
            .list_stores(&ctx.session, ctx.company_id())
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        write_csv(&transactions, &stores)
    }
}

fn write_csv(transactions: &[Transaction], stores: &HashMap<String, String>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_error)?;

    for tx in transactions {
        let store = tx
            .store_id
            .as_ref()
            .map(|id| stores.get(id).cloned().unwrap_or_else(|| id.clone()))
            .unwrap_or_default();
        writer
            .write_record([
                tx.date.to_string(),
                tx.kind.as_str().to_string(),
                tx.category.clone(),
                format!("{:.2}", tx.amount),
                store,
                tx.description.clone().unwrap_or_default(),
                tx.cash_flow_activity.map(|a| a.as_str().to_string()).unwrap_or_default(),
                tx.transaction_nature.map(|n| n.as_str().to_string()).unwrap_or_default(),
                tx.include_in_profit_loss.to_string(),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("Failed to write CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(format!("CSV is not valid UTF-8: {}", e)))
}

fn csv_error(e: csv::Error) -> Error {
    Error::Other(format!("Failed to write CSV: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::{DemoBackend, DEMO_ACCOUNTANT_EMAIL, DEMO_MANAGER_EMAIL, DEMO_PASSWORD};
    use crate::domain::{Credentials, TransactionType};
    use crate::services::AuthService;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn setup(email: &str) -> (ExportService, UserContext) {
        let backend = Arc::new(DemoBackend::seeded());
        let auth = AuthService::new(backend.clone(), backend.clone());
        let signed_in = auth.sign_in(Credentials::new(email, DEMO_PASSWORD)).await.unwrap();
        let ctx = auth.resolve(signed_in.session).await.unwrap().context;
        (ExportService::new(backend), ctx)
    }

    #[test]
    fn test_csv_layout() {
        let tx = Transaction {
            id: "t1".to_string(),
            kind: TransactionType::Expense,
            category: "Rent".to_string(),
            amount: Decimal::new(12005, 1),
            description: Some("March, back office".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            store_id: Some("s1".to_string()),
            company_id: "c1".to_string(),
            created_by: None,
            cash_flow_activity: None,
            transaction_nature: None,
            include_in_profit_loss: true,
            created_at: None,
            updated_at: None,
        };
        let stores = HashMap::from([("s1".to_string(), "Main".to_string())]);
        let csv = write_csv(&[tx], &stores).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "2026-03-01,expense,Rent,1200.50,Main,\"March, back office\",,,true"
        );
    }

    #[tokio::test]
    async fn test_manager_export_is_scoped() {
        let (svc, ctx) = setup(DEMO_MANAGER_EMAIL).await;
        let csv = svc.export_csv(&ctx, &TransactionQuery::default()).await.unwrap();
        assert!(csv.lines().count() > 1);
        assert!(csv.lines().skip(1).all(|l| l.contains("Main Street Bakery")));
    }

    #[tokio::test]
    async fn test_export_filters_by_type() {
        let (svc, ctx) = setup(DEMO_ACCOUNTANT_EMAIL).await;
        let query = TransactionQuery {
            kind: Some(TransactionType::Income),
            ..Default::default()
        };
        let csv = svc.export_csv(&ctx, &query).await.unwrap();
        assert!(csv.lines().skip(1).all(|l| l.split(',').nth(1) == Some("income")));
    }
}
