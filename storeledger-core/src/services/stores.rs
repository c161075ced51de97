//! Store service

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{NewStore, Permission, Store};
use crate::ports::{LedgerRepository, TransactionFilter};

use super::auth::UserContext;

pub struct StoreService {
    repository: Arc<dyn LedgerRepository>,
}

impl StoreService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Stores the caller may see
    pub async fn list(&self, ctx: &UserContext) -> Result<Vec<Store>> {
        let stores = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
        Ok(stores
            .into_iter()
            .filter(|s| ctx.can_access_store(Some(&s.id)))
            .collect())
    }

    pub async fn create(&self, ctx: &UserContext, name: &str) -> Result<Store> {
        ctx.require(Permission::ManageStores)?;
        let existing = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
        let mut store = NewStore::new(name, ctx.company_id());
        store.validate(&existing)?;
        self.repository.create_store(&ctx.session, &store).await
    }

    pub async fn rename(&self, ctx: &UserContext, id: &str, name: &str) -> Result<Store> {
        ctx.require(Permission::ManageStores)?;
        let existing = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
        if !existing.iter().any(|s| s.id == id) {
            return Err(Error::not_found(format!("Store {}", id)));
        }
        let others: Vec<Store> = existing.into_iter().filter(|s| s.id != id).collect();
        let mut store = NewStore::new(name, ctx.company_id());
        store.validate(&others)?;
        self.repository.update_store(&ctx.session, id, &store.name).await
    }

    /// Delete a store that no longer has transactions
    pub async fn delete(&self, ctx: &UserContext, id: &str) -> Result<()> {
        ctx.require(Permission::ManageStores)?;
        let existing = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
        if !existing.iter().any(|s| s.id == id) {
            return Err(Error::not_found(format!("Store {}", id)));
        }

        let filter = TransactionFilter::for_company(ctx.company_id()).in_stores(vec![id.to_string()]);
        let in_use = self.repository.list_transactions(&ctx.session, &filter).await?.len();
        if in_use > 0 {
            return Err(Error::conflict(format!(
                "Store still has {} transactions; move or delete them first",
                in_use
            )));
        }
        self.repository.delete_store(&ctx.session, id).await
    }
}
