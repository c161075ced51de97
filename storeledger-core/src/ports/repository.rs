//! Ledger repository port - data access abstraction
//!
//! Every call carries the caller's session: backends apply their own row
//! level rules with it. Lookups that must work before a user belongs to a
//! company (finding a company by code, writing the first profile) use the
//! backend's privileged key internally.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::result::Result;
use crate::domain::{
    Category, Company, NewCategory, NewCompany, NewStore, Profile, Session, Store, Transaction,
    TransactionRecord, TransactionType,
};

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    // === Profiles ===

    /// Get the profile of a user
    async fn get_profile(&self, session: &Session, user_id: &str) -> Result<Option<Profile>>;

    /// All profiles of a company
    async fn list_profiles(&self, session: &Session, company_id: &str) -> Result<Vec<Profile>>;

    /// Insert or replace a profile (privileged)
    async fn save_profile(&self, session: &Session, profile: &Profile) -> Result<Profile>;

    // === Companies ===

    async fn get_company(&self, session: &Session, company_id: &str) -> Result<Option<Company>>;

    /// Look up a company by its join code (privileged)
    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>>;

    async fn create_company(&self, session: &Session, company: &NewCompany) -> Result<Company>;

    // === Stores ===

    async fn list_stores(&self, session: &Session, company_id: &str) -> Result<Vec<Store>>;

    async fn create_store(&self, session: &Session, store: &NewStore) -> Result<Store>;

    async fn update_store(&self, session: &Session, id: &str, name: &str) -> Result<Store>;

    async fn delete_store(&self, session: &Session, id: &str) -> Result<()>;

    // === Categories ===

    async fn list_categories(&self, session: &Session, company_id: &str) -> Result<Vec<Category>>;

    async fn create_category(&self, session: &Session, category: &NewCategory) -> Result<Category>;

    async fn delete_category(&self, session: &Session, id: &str) -> Result<()>;

    // === Transactions ===

    /// Transactions matching the filter, newest first
    async fn list_transactions(
        &self,
        session: &Session,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    async fn get_transaction(&self, session: &Session, id: &str) -> Result<Option<Transaction>>;

    async fn create_transaction(
        &self,
        session: &Session,
        record: &TransactionRecord,
    ) -> Result<Transaction>;

    /// Replace the mutable fields of an existing transaction
    async fn update_transaction(&self, session: &Session, tx: &Transaction) -> Result<Transaction>;

    async fn delete_transaction(&self, session: &Session, id: &str) -> Result<()>;
}

/// Transaction query. `store_ids: Some(vec![])` matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub company_id: String,
    pub store_ids: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub kind: Option<TransactionType>,
    pub category: Option<String>,
}

impl TransactionFilter {
    pub fn for_company(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            ..Default::default()
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn in_stores(mut self, store_ids: Vec<String>) -> Self {
        self.store_ids = Some(store_ids);
        self
    }

    /// In-memory evaluation, used by the demo backend and to double-check
    /// backend results
    pub fn matches(&self, tx: &Transaction) -> bool {
        if tx.company_id != self.company_id {
            return false;
        }
        if let Some(ids) = &self.store_ids {
            match &tx.store_id {
                Some(id) if ids.contains(id) => {}
                _ => return false,
            }
        }
        if self.start_date.is_some_and(|start| tx.date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| tx.date > end) {
            return false;
        }
        if self.kind.is_some_and(|kind| tx.kind != kind) {
            return false;
        }
        if let Some(category) = &self.category {
            if &tx.category != category {
                return false;
            }
        }
        true
    }
}
