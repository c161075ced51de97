//! Transaction service - scoped listing and recording of transactions

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Category, NewTransaction, Permission, StoreScope, Transaction, TransactionType,
    TransactionUpdate,
};
use crate::ports::{LedgerRepository, TransactionFilter};

use super::auth::UserContext;

/// Listing parameters as they arrive from the API or CLI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionType>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Build the filter for what `ctx` may see, optionally narrowed to one
/// store. `Ok(None)` means the caller can see nothing.
pub(crate) fn scoped_filter(
    ctx: &UserContext,
    store_id: Option<&str>,
) -> Result<Option<TransactionFilter>> {
    let filter = TransactionFilter::for_company(ctx.company_id());
    if let Some(id) = store_id {
        if !ctx.can_access_store(Some(id)) {
            return Err(Error::forbidden("You do not have access to this store"));
        }
        return Ok(Some(filter.in_stores(vec![id.to_string()])));
    }
    match ctx.store_scope() {
        StoreScope::All => Ok(Some(filter)),
        StoreScope::Only(ids) if ids.is_empty() => Ok(None),
        StoreScope::Only(ids) => Ok(Some(filter.in_stores(ids))),
    }
}

/// [`scoped_filter`] narrowed by a listing query
pub(crate) fn query_filter(ctx: &UserContext, query: &TransactionQuery) -> Result<Option<TransactionFilter>> {
    Ok(scoped_filter(ctx, query.store_id.as_deref())?.map(|mut f| {
        f.start_date = query.start;
        f.end_date = query.end;
        f.kind = query.kind;
        f.category = query.category.clone();
        f
    }))
}

/// Fetch transactions through a scoped filter, re-checking every row
pub(crate) async fn fetch_scoped(
    repository: &dyn LedgerRepository,
    ctx: &UserContext,
    filter: Option<TransactionFilter>,
) -> Result<Vec<Transaction>> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };
    let mut txs = repository.list_transactions(&ctx.session, &filter).await?;
    txs.retain(|t| filter.matches(t));
    Ok(txs)
}

fn find_category<'a>(categories: &'a [Category], name: &str, kind: TransactionType) -> Option<&'a Category> {
    categories
        .iter()
        .find(|c| c.kind == kind && c.name.eq_ignore_ascii_case(name))
}

pub struct TransactionService {
    repository: Arc<dyn LedgerRepository>,
}

impl TransactionService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    /// Transactions the caller may see, newest first
    pub async fn list(&self, ctx: &UserContext, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let filter = query_filter(ctx, query)?;
        fetch_scoped(self.repository.as_ref(), ctx, filter).await
    }

    pub async fn create(&self, ctx: &UserContext, input: NewTransaction) -> Result<Transaction> {
        ctx.require(Permission::ManageTransactions)?;
        let mut input = input;
        input.validate()?;

        self.check_store(ctx, input.store_id.as_deref()).await?;

        let categories = self.repository.list_categories(&ctx.session, ctx.company_id()).await?;
        let category = find_category(&categories, &input.category, input.kind).ok_or_else(|| {
            Error::validation(format!(
                "Unknown {} category '{}'",
                input.kind.as_str(),
                input.category
            ))
        })?;
        input.category = category.name.clone();
        input.cash_flow_activity = input.cash_flow_activity.or(category.cash_flow_activity);
        input.transaction_nature = input.transaction_nature.or(category.transaction_nature);
        input.include_in_profit_loss = input
            .include_in_profit_loss
            .or(Some(category.include_in_profit_loss));

        let record = input.into_record(ctx.company_id(), ctx.user_id());
        self.repository.create_transaction(&ctx.session, &record).await
    }

    pub async fn update(&self, ctx: &UserContext, id: &str, update: TransactionUpdate) -> Result<Transaction> {
        ctx.require(Permission::ManageTransactions)?;
        let existing = self.get_visible(ctx, id).await?;

        let mut tx = existing.clone();
        tx.apply(&update)?;

        if tx.store_id != existing.store_id {
            self.check_store(ctx, tx.store_id.as_deref()).await?;
        }

        if tx.category != existing.category || tx.kind != existing.kind {
            let categories = self.repository.list_categories(&ctx.session, ctx.company_id()).await?;
            let category = find_category(&categories, &tx.category, tx.kind).ok_or_else(|| {
                Error::validation(format!("Unknown {} category '{}'", tx.kind.as_str(), tx.category))
            })?;
            tx.category = category.name.clone();
            // Classification follows the new category unless given explicitly
            if update.cash_flow_activity.is_none() {
                tx.cash_flow_activity = category.cash_flow_activity;
            }
            if update.transaction_nature.is_none() {
                tx.transaction_nature = category.transaction_nature;
            }
            if update.include_in_profit_loss.is_none() {
                tx.include_in_profit_loss = category.include_in_profit_loss;
            }
        }

        self.repository.update_transaction(&ctx.session, &tx).await
    }

    pub async fn delete(&self, ctx: &UserContext, id: &str) -> Result<()> {
        ctx.require(Permission::ManageTransactions)?;
        self.get_visible(ctx, id).await?;
        self.repository.delete_transaction(&ctx.session, id).await
    }

    /// Load a transaction of the caller's company and check store scope.
    /// Out-of-company rows look the same as missing ones.
    async fn get_visible(&self, ctx: &UserContext, id: &str) -> Result<Transaction> {
        let tx = self
            .repository
            .get_transaction(&ctx.session, id)
            .await?
            .filter(|t| t.company_id == ctx.company_id())
            .ok_or_else(|| Error::not_found(format!("Transaction {}", id)))?;
        if !ctx.can_access_store(tx.store_id.as_deref()) {
            return Err(Error::forbidden("You do not have access to this transaction's store"));
        }
        Ok(tx)
    }

    /// The store must belong to the company and be in the caller's scope
    async fn check_store(&self, ctx: &UserContext, store_id: Option<&str>) -> Result<()> {
        if let Some(id) = store_id {
            let stores = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
            if !stores.iter().any(|s| s.id == id) {
                return Err(Error::validation(format!("Unknown store '{}'", id)));
            }
        }
        if !ctx.can_access_store(store_id) {
            return Err(Error::forbidden(match store_id {
                Some(_) => "You do not have access to this store",
                None => "Only roles with access to all stores can record company-level transactions",
            }));
        }
        Ok(())
    }
}
