//! Report service - fetches what the caller may see and runs the
//! aggregations in [`super::reports`]

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Permission, Store, Transaction};
use crate::ports::LedgerRepository;

use super::auth::UserContext;
use super::reports::{
    self, CashFlowReport, Dashboard, ProfitLossReport, ReportPeriod, StoreMetricsReport,
};
use super::transactions::{fetch_scoped, scoped_filter};

/// Report parameters: a preset name or an explicit range, plus an optional store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub store_id: Option<String>,
}

impl ReportQuery {
    /// An explicit range wins over a preset; the default is the current month
    pub fn resolve(&self, today: NaiveDate) -> Result<ReportPeriod> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => ReportPeriod::new(start, end),
            (None, None) => match self.period.as_deref() {
                Some(name) => ReportPeriod::preset(name, today),
                None => ReportPeriod::this_month(today),
            },
            _ => Err(Error::validation("Both start and end are required for a custom range")),
        }
    }
}

pub struct ReportService {
    repository: Arc<dyn LedgerRepository>,
}

impl ReportService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    async fn transactions(
        &self,
        ctx: &UserContext,
        store_id: Option<&str>,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let filter = scoped_filter(ctx, store_id)?.map(|f| f.between(start, Some(end)));
        fetch_scoped(self.repository.as_ref(), ctx, filter).await
    }

    pub async fn profit_loss(
        &self,
        ctx: &UserContext,
        query: &ReportQuery,
    ) -> Result<ProfitLossReport> {
        ctx.require(Permission::ViewReports)?;
        let period = query.resolve(Self::today())?;
        let txs = self
            .transactions(ctx, query.store_id.as_deref(), Some(period.start), period.end)
            .await?;
        let categories = self.repository.list_categories(&ctx.session, ctx.company_id()).await?;
        reports::profit_loss(&txs, &categories, period)
    }

    /// Fetches everything up to the end of the period so the opening
    /// balance covers all earlier history
    pub async fn cash_flow(
        &self,
        ctx: &UserContext,
        query: &ReportQuery,
    ) -> Result<CashFlowReport> {
        ctx.require(Permission::ViewReports)?;
        let period = query.resolve(Self::today())?;
        let txs = self
            .transactions(ctx, query.store_id.as_deref(), None, period.end)
            .await?;
        let categories = self.repository.list_categories(&ctx.session, ctx.company_id()).await?;
        reports::cash_flow(&txs, &categories, period)
    }

    pub async fn store_metrics(
        &self,
        ctx: &UserContext,
        query: &ReportQuery,
    ) -> Result<StoreMetricsReport> {
        ctx.require(Permission::ViewReports)?;
        let period = query.resolve(Self::today())?;
        let txs = self
            .transactions(ctx, query.store_id.as_deref(), Some(period.start), period.end)
            .await?;
        let stores: Vec<Store> = self
            .repository
            .list_stores(&ctx.session, ctx.company_id())
            .await?
            .into_iter()
            .filter(|s| ctx.can_access_store(Some(&s.id)))
            .filter(|s| query.store_id.as_ref().map_or(true, |id| *id == s.id))
            .collect();
        reports::store_metrics(&txs, &stores, period)
    }

    pub async fn dashboard(&self, ctx: &UserContext, query: &ReportQuery) -> Result<Dashboard> {
        ctx.require(Permission::ViewReports)?;
        let period = query.resolve(Self::today())?;
        let txs = self
            .transactions(ctx, query.store_id.as_deref(), Some(period.start), period.end)
            .await?;
        reports::dashboard(&txs, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::{
        DemoBackend, DEMO_MANAGER_EMAIL, DEMO_OWNER_EMAIL, DEMO_PASSWORD,
    };
    use crate::domain::{Credentials, NewTransaction, TransactionType};
    use crate::services::{AuthService, TransactionService};
    use rust_decimal::Decimal;

    async fn setup(email: &str) -> (ReportService, UserContext) {
        let backend = Arc::new(DemoBackend::seeded());
        let auth = AuthService::new(backend.clone(), backend.clone());
        let signed_in = auth.sign_in(Credentials::new(email, DEMO_PASSWORD)).await.unwrap();
        let ctx = auth.resolve(signed_in.session).await.unwrap().context;
        (ReportService::new(backend), ctx)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_query_resolution() {
        let today = date("2026-05-14");
        let default = ReportQuery::default().resolve(today).unwrap();
        assert_eq!(default.start, date("2026-05-01"));
        assert_eq!(default.end, date("2026-05-31"));

        let preset = ReportQuery {
            period: Some("last-month".to_string()),
            ..Default::default()
        };
        assert_eq!(preset.resolve(today).unwrap().start, date("2026-04-01"));

        let half_open = ReportQuery {
            start: Some(date("2026-01-01")),
            ..Default::default()
        };
        assert!(matches!(half_open.resolve(today), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_profit_loss_on_demo_data() {
        let (svc, ctx) = setup(DEMO_OWNER_EMAIL).await;
        let query = ReportQuery {
            period: Some("last_month".to_string()),
            ..Default::default()
        };
        let report = svc.profit_loss(&ctx, &query).await.unwrap();
        assert!(report.revenue.total > Decimal::ZERO);
        assert_eq!(report.net_profit, report.total_income - report.total_expense);
    }

    #[tokio::test]
    async fn test_cash_flow_opening_balance_uses_history() {
        let backend = Arc::new(DemoBackend::empty());
        let auth = AuthService::new(backend.clone(), backend.clone());
        let signed_in = auth
            .register_owner(crate::services::OwnerRegistration {
                credentials: Credentials::new("new@shop.test", "secret1"),
                company_name: Some("Corner Shop".to_string()),
            })
            .await
            .unwrap();
        let ctx = auth.resolve(signed_in.session).await.unwrap().context;

        let txs = TransactionService::new(backend.clone());
        txs.create(
            &ctx,
            NewTransaction::new(
                TransactionType::Income,
                "Capital Contribution",
                Decimal::new(1000, 0),
                date("2026-01-05"),
            ),
        )
        .await
        .unwrap();
        txs.create(
            &ctx,
            NewTransaction::new(
                TransactionType::Expense,
                "Rent",
                Decimal::new(300, 0),
                date("2026-02-01"),
            ),
        )
        .await
        .unwrap();

        let svc = ReportService::new(backend);
        let query = ReportQuery {
            start: Some(date("2026-02-01")),
            end: Some(date("2026-02-28")),
            ..Default::default()
        };
        let report = svc.cash_flow(&ctx, &query).await.unwrap();
        assert_eq!(report.opening_balance, Decimal::new(1000, 0));
        assert_eq!(report.closing_balance, Decimal::new(700, 0));
    }

    #[tokio::test]
    async fn test_manager_reports_cover_managed_store() {
        let (svc, ctx) = setup(DEMO_MANAGER_EMAIL).await;
        let report = svc.store_metrics(&ctx, &ReportQuery::default()).await.unwrap();
        assert_eq!(report.stores.len(), 1);
        let managed = ctx.profile.managed_store_ids[0].as_str();
        assert_eq!(report.stores[0].store_id.as_deref(), Some(managed));

        let other = ReportQuery {
            store_id: Some("demo-store-harbour".to_string()),
            ..Default::default()
        };
        assert!(matches!(svc.dashboard(&ctx, &other).await, Err(Error::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_plain_user_cannot_view_reports() {
        let backend = Arc::new(DemoBackend::seeded());
        let auth = AuthService::new(backend.clone(), backend.clone());
        let joined = auth
            .join_company(Credentials::new("clerk@demo.local", "secret1"), "demo42")
            .await
            .unwrap();
        let ctx = auth.resolve(joined.session).await.unwrap().context;
        let svc = ReportService::new(backend);
        assert!(matches!(
            svc.profit_loss(&ctx, &ReportQuery::default()).await,
            Err(Error::Forbidden(_))
        ));
    }
}
