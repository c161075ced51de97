//! Integration tests for storeledger-core services
//!
//! These tests drive whole workflows through `LedgerContext` on the
//! in-memory demo backend: registration, joining, role changes, store scope
//! and the reports built on top.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tempfile::TempDir;

use storeledger_core::adapters::{BackendHandle, DemoBackend};
use storeledger_core::config::Config;
use storeledger_core::domain::transaction::MAX_AMOUNT;
use storeledger_core::domain::{
    Credentials, MemberUpdate, NewTransaction, Role, TransactionType, TransactionUpdate,
};
use storeledger_core::services::{
    EntryPoint, LogEvent, LoggingService, OwnerRegistration, ReportQuery, TransactionQuery,
    UserContext,
};
use storeledger_core::{Error, LedgerContext};

// ============================================================================
// Test Helpers
// ============================================================================

/// Context on a blank demo backend, loaded the same way the binaries do
fn create_empty_context(temp_dir: &TempDir) -> LedgerContext {
    let config = Config::load_with(temp_dir.path(), |key| match key {
        "STORELEDGER_DEMO_MODE" => Some("true".to_string()),
        _ => None,
    })
    .expect("Failed to load config");
    assert!(config.demo_mode);
    let backend = BackendHandle::from_backend(Arc::new(DemoBackend::empty()));
    LedgerContext::with_backend(config, backend)
}

async fn context_for(ledger: &LedgerContext, email: &str, password: &str) -> UserContext {
    let signed_in = ledger
        .auth_service
        .sign_in(Credentials::new(email, password))
        .await
        .expect("sign in failed");
    ledger
        .auth_service
        .resolve(signed_in.session)
        .await
        .expect("resolve failed")
        .context
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn money(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

/// Owner with two stores and a member who joined with the company code
async fn create_company(ledger: &LedgerContext) -> (UserContext, String, String, String) {
    let signed_in = ledger
        .auth_service
        .register_owner(OwnerRegistration {
            credentials: Credentials::new("owner@shop.test", "secret1"),
            company_name: Some("Corner Shop".to_string()),
        })
        .await
        .unwrap();
    let code = signed_in.company.company_code.clone();
    let owner = ledger.auth_service.resolve(signed_in.session).await.unwrap().context;

    let north = ledger.store_service.create(&owner, "North").await.unwrap();
    let south = ledger.store_service.create(&owner, "South").await.unwrap();

    ledger
        .auth_service
        .join_company(Credentials::new("clerk@shop.test", "secret1"), &code.to_lowercase())
        .await
        .unwrap();

    (owner, north.id, south.id, code)
}

// ============================================================================
// Onboarding
// ============================================================================

#[tokio::test]
async fn test_owner_registration_seeds_company() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, _, _, code) = create_company(&ledger).await;

    assert_eq!(owner.role(), Role::Owner);
    assert_eq!(owner.company.name.as_deref(), Some("Corner Shop"));
    assert_eq!(owner.session.company_code.as_deref(), Some(code.as_str()));

    let categories = ledger.category_service.list(&owner).await.unwrap();
    assert!(categories.iter().all(|c| c.is_system));
    assert!(categories.iter().any(|c| c.name == "Sales Revenue"));

    let members = ledger.member_service.list(&owner).await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.role == Role::User));
}

#[tokio::test]
async fn test_join_with_unknown_code_creates_no_account() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    create_company(&ledger).await;

    let err = ledger
        .auth_service
        .join_company(Credentials::new("late@shop.test", "secret1"), "ZZZZZZ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // The failed join must not leave a half-created login behind
    let err = ledger
        .auth_service
        .sign_in(Credentials::new("late@shop.test", "secret1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

// ============================================================================
// Roles and store scope
// ============================================================================

#[tokio::test]
async fn test_promoted_manager_is_limited_to_assigned_store() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, north, south, _) = create_company(&ledger).await;

    let clerk_id = ledger
        .member_service
        .list(&owner)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.role == Role::User)
        .unwrap()
        .id;
    ledger
        .member_service
        .update(
            &owner,
            &clerk_id,
            MemberUpdate {
                role: Some(Role::Manager),
                managed_store_ids: Some(vec![north.clone()]),
                full_name: Some("Clerk".to_string()),
            },
        )
        .await
        .unwrap();

    let manager = context_for(&ledger, "clerk@shop.test", "secret1").await;
    assert_eq!(manager.role(), Role::Manager);

    let day = date(2026, 3, 2);
    let sale = NewTransaction::new(TransactionType::Income, "Sales Revenue", money(250), day)
        .with_store(north.clone());
    ledger.transaction_service.create(&manager, sale).await.unwrap();

    let elsewhere = NewTransaction::new(TransactionType::Income, "Sales Revenue", money(90), day)
        .with_store(south.clone());
    let err = ledger.transaction_service.create(&manager, elsewhere).await.unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));

    // Owner books at both stores and at company level
    for (store, amount) in [(Some(&south), 400), (None, 60)] {
        let rent = money(amount);
        let mut tx = NewTransaction::new(TransactionType::Expense, "Rent", rent, date(2026, 3, 1));
        if let Some(id) = store {
            tx = tx.with_store(id.clone());
        }
        ledger.transaction_service.create(&owner, tx).await.unwrap();
    }

    let seen = ledger
        .transaction_service
        .list(&manager, &TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].store_id.as_deref(), Some(north.as_str()));

    let all = ledger
        .transaction_service
        .list(&owner, &TransactionQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_reports_follow_recorded_transactions() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, north, south, _) = create_company(&ledger).await;

    let entries = [
        (TransactionType::Income, "Capital Contribution", 5000, None, date(2026, 2, 20)),
        (TransactionType::Income, "Sales Revenue", 1200, Some(&north), date(2026, 3, 3)),
        (TransactionType::Income, "Sales Revenue", 800, Some(&south), date(2026, 3, 4)),
        (TransactionType::Expense, "Cost of Goods", 700, Some(&north), date(2026, 3, 5)),
        (TransactionType::Expense, "Equipment Purchase", 1500, Some(&south), date(2026, 3, 6)),
        (TransactionType::Expense, "Interest Expense", 50, None, date(2026, 3, 15)),
    ];
    for (kind, category, amount, store, day) in entries {
        let mut tx = NewTransaction::new(kind, category, money(amount), day);
        if let Some(id) = store {
            tx = tx.with_store(id.clone());
        }
        ledger.transaction_service.create(&owner, tx).await.unwrap();
    }

    let march = ReportQuery {
        start: Some(date(2026, 3, 1)),
        end: Some(date(2026, 3, 31)),
        ..Default::default()
    };

    let pl = ledger.report_service.profit_loss(&owner, &march).await.unwrap();
    assert_eq!(pl.revenue.total, money(2000));
    assert_eq!(pl.operating_expenses.total, money(700));
    assert_eq!(pl.non_operating_expenses.total, money(50));
    assert_eq!(pl.operating_profit, money(1300));
    assert_eq!(pl.net_profit, money(1250));
    assert_eq!(pl.profit_margin, Some(Decimal::new(6250, 2)));
    assert_eq!(pl.excluded_count, 1);

    let cf = ledger.report_service.cash_flow(&owner, &march).await.unwrap();
    assert_eq!(cf.opening_balance, money(5000));
    assert_eq!(cf.net_change, money(-250));
    assert_eq!(cf.closing_balance, money(4750));

    // South wins: its equipment purchase stays out of profit and loss
    let stores = ledger.report_service.store_metrics(&owner, &march).await.unwrap();
    assert_eq!(stores.top_store_id.as_deref(), Some(south.as_str()));
    assert_eq!(stores.stores.len(), 3, "two stores plus the unassigned row");

    let dashboard = ledger.report_service.dashboard(&owner, &march).await.unwrap();
    assert_eq!(dashboard.trend.len(), 1);
    assert_eq!(dashboard.recent.len(), 5);
    assert_eq!(dashboard.net_profit, money(1250));
}

#[tokio::test]
async fn test_reclassified_transaction_moves_between_report_sections() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, north, _, _) = create_company(&ledger).await;

    let tx = ledger
        .transaction_service
        .create(
            &owner,
            NewTransaction::new(TransactionType::Expense, "Rent", money(900), date(2026, 4, 1))
                .with_store(north),
        )
        .await
        .unwrap();

    let april = ReportQuery {
        start: Some(date(2026, 4, 1)),
        end: Some(date(2026, 4, 30)),
        ..Default::default()
    };
    let before = ledger.report_service.profit_loss(&owner, &april).await.unwrap();
    assert_eq!(before.operating_expenses.total, money(900));

    ledger
        .transaction_service
        .update(
            &owner,
            &tx.id,
            TransactionUpdate {
                category: Some("Owner Drawings".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = ledger.report_service.profit_loss(&owner, &april).await.unwrap();
    assert_eq!(after.operating_expenses.total, Decimal::ZERO);
    assert_eq!(after.excluded_count, 1);
}

#[tokio::test]
async fn test_amounts_are_capped_and_reports_stay_exact() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, north, _, _) = create_company(&ledger).await;
    let day = date(2026, 6, 1);

    let too_big = NewTransaction::new(TransactionType::Income, "Sales Revenue", Decimal::MAX, day);
    let err = ledger.transaction_service.create(&owner, too_big).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let mut ids = Vec::new();
    for _ in 0..3 {
        let sale = NewTransaction::new(TransactionType::Income, "Sales Revenue", MAX_AMOUNT, day)
            .with_store(north.clone());
        ids.push(ledger.transaction_service.create(&owner, sale).await.unwrap().id);
    }

    let raise = TransactionUpdate {
        amount: Some(MAX_AMOUNT + Decimal::ONE),
        ..Default::default()
    };
    let err = ledger
        .transaction_service
        .update(&owner, &ids[0], raise)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let june = ReportQuery {
        start: Some(date(2026, 6, 1)),
        end: Some(date(2026, 6, 30)),
        ..Default::default()
    };
    let report = ledger.report_service.profit_loss(&owner, &june).await.unwrap();
    assert_eq!(report.revenue.total, MAX_AMOUNT * Decimal::new(3, 0));
    let metrics = ledger.report_service.store_metrics(&owner, &june).await.unwrap();
    let row = metrics
        .stores
        .iter()
        .find(|m| m.store_id.as_deref() == Some(north.as_str()))
        .unwrap();
    assert_eq!(row.transaction_count, 3);
    assert_eq!(row.average_transaction, MAX_AMOUNT);
}

// ============================================================================
// Export and event log
// ============================================================================

#[tokio::test]
async fn test_export_uses_store_names() {
    let temp_dir = TempDir::new().unwrap();
    let ledger = create_empty_context(&temp_dir);
    let (owner, north, _, _) = create_company(&ledger).await;

    ledger
        .transaction_service
        .create(
            &owner,
            NewTransaction::new(
                TransactionType::Income,
                "Sales Revenue",
                money(42),
                date(2026, 5, 2),
            )
            .with_store(north)
                .with_description("Morning rush"),
        )
        .await
        .unwrap();

    let csv = ledger
        .export_service
        .export_csv(&owner, &TransactionQuery::default())
        .await
        .unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1],
        "2026-05-02,income,Sales Revenue,42.00,North,Morning rush,operating,operating,true"
    );
}

#[test]
fn test_event_log_records_errors_without_payloads() {
    let temp_dir = TempDir::new().unwrap();
    let logging = LoggingService::new(temp_dir.path(), EntryPoint::Web, "0.1.0").unwrap();

    logging
        .log(LogEvent::new("transaction_created").with_backend("supabase"))
        .unwrap();
    let error = Error::validation("Amount must be positive");
    logging
        .log(
            LogEvent::new("request_failed")
                .with_route("/api/transactions")
                .with_error(&error),
        )
        .unwrap();

    let stats = logging.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.errors, 1);

    let errors = logging.get_errors(10).unwrap();
    assert_eq!(errors[0].route.as_deref(), Some("/api/transactions"));
    assert_eq!(errors[0].error_kind.as_deref(), Some("validation"));
}
