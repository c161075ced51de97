//! Category service

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{default_categories, Category, NewCategory, Permission, Session};
use crate::ports::LedgerRepository;

use super::auth::UserContext;

pub struct CategoryService {
    repository: Arc<dyn LedgerRepository>,
}

impl CategoryService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, ctx: &UserContext) -> Result<Vec<Category>> {
        self.repository.list_categories(&ctx.session, ctx.company_id()).await
    }

    /// Create a custom category. Names are unique per type, ignoring case.
    pub async fn create(&self, ctx: &UserContext, input: NewCategory) -> Result<Category> {
        ctx.require(Permission::ManageCategories)?;
        let mut input = input;
        input.validate()?;
        input.company_id = ctx.company_id().to_string();
        input.is_system = false;

        let existing = self.list(ctx).await?;
        if existing
            .iter()
            .any(|c| c.kind == input.kind && c.name.eq_ignore_ascii_case(&input.name))
        {
            return Err(Error::conflict(format!(
                "An {} category named '{}' already exists",
                input.kind.as_str(),
                input.name
            )));
        }
        self.repository.create_category(&ctx.session, &input).await
    }

    pub async fn delete(&self, ctx: &UserContext, id: &str) -> Result<()> {
        ctx.require(Permission::ManageCategories)?;
        let category = self
            .list(ctx)
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found(format!("Category {}", id)))?;
        if category.is_system {
            return Err(Error::forbidden("System categories cannot be deleted"));
        }
        self.repository.delete_category(&ctx.session, id).await
    }
}

/// Create whichever system categories the company is missing
pub(crate) async fn seed_defaults(
    repository: &dyn LedgerRepository,
    session: &Session,
    company_id: &str,
) -> Result<usize> {
    let existing = repository.list_categories(session, company_id).await?;
    let mut created = 0;
    for category in default_categories(company_id) {
        let present = existing
            .iter()
            .any(|c| c.kind == category.kind && c.name.eq_ignore_ascii_case(&category.name));
        if !present {
            repository.create_category(session, &category).await?;
            created += 1;
        }
    }
    Ok(created)
}
