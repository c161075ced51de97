//! Member service - roles and store assignments inside a company

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{MemberUpdate, Permission, Profile, Role};
use crate::ports::LedgerRepository;

use super::auth::UserContext;

pub struct MemberService {
    repository: Arc<dyn LedgerRepository>,
}

impl MemberService {
    pub fn new(repository: Arc<dyn LedgerRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, ctx: &UserContext) -> Result<Vec<Profile>> {
        ctx.require(Permission::ManageMembers)?;
        self.repository.list_profiles(&ctx.session, ctx.company_id()).await
    }

    pub async fn update(&self, ctx: &UserContext, user_id: &str, update: MemberUpdate) -> Result<Profile> {
        ctx.require(Permission::ManageMembers)?;
        let mut profile = self
            .list(ctx)
            .await?
            .into_iter()
            .find(|p| p.id == user_id)
            .ok_or_else(|| Error::not_found(format!("Member {}", user_id)))?;

        if let Some(role) = update.role {
            if user_id == ctx.user_id() && role != Role::Owner {
                return Err(Error::validation("You cannot remove your own owner role"));
            }
            profile.role = role;
        }

        if let Some(store_ids) = update.managed_store_ids {
            let stores = self.repository.list_stores(&ctx.session, ctx.company_id()).await?;
            if let Some(unknown) = store_ids.iter().find(|id| !stores.iter().any(|s| &s.id == *id)) {
                return Err(Error::validation(format!("Unknown store '{}'", unknown)));
            }
            let mut store_ids = store_ids;
            store_ids.sort();
            store_ids.dedup();
            profile.managed_store_ids = store_ids;
        }

        if let Some(name) = update.full_name {
            let name = name.trim().to_string();
            profile.full_name = if name.is_empty() { None } else { Some(name) };
        }

        self.repository.save_profile(&ctx.session, &profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::{DemoBackend, DEMO_ACCOUNTANT_EMAIL, DEMO_OWNER_EMAIL, DEMO_PASSWORD};
    use crate::domain::Credentials;
    use crate::services::AuthService;

    async fn setup(email: &str) -> (MemberService, UserContext) {
        let backend = Arc::new(DemoBackend::seeded());
        let auth = AuthService::new(backend.clone(), backend.clone());
        let signed_in = auth.sign_in(Credentials::new(email, DEMO_PASSWORD)).await.unwrap();
        let ctx = auth.resolve(signed_in.session).await.unwrap().context;
        (MemberService::new(backend), ctx)
    }

    #[tokio::test]
    async fn test_owner_lists_members() {
        let (svc, ctx) = setup(DEMO_OWNER_EMAIL).await;
        let members = svc.list(&ctx).await.unwrap();
        assert_eq!(members.len(), 3);
    }

    #[tokio::test]
    async fn test_accountant_cannot_manage_members() {
        let (svc, ctx) = setup(DEMO_ACCOUNTANT_EMAIL).await;
        assert!(matches!(svc.list(&ctx).await, Err(Error::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_promote_and_assign_stores() {
        let (svc, ctx) = setup(DEMO_OWNER_EMAIL).await;
        let accountant = svc
            .list(&ctx)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.role == Role::Accountant)
            .unwrap();

        let update = MemberUpdate {
            role: Some(Role::Manager),
            managed_store_ids: Some(vec!["demo-store-harbour".to_string()]),
            full_name: None,
        };
        let updated = svc.update(&ctx, &accountant.id, update).await.unwrap();
        assert_eq!(updated.role, Role::Manager);
        assert_eq!(updated.managed_store_ids, vec!["demo-store-harbour".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_store_is_rejected() {
        let (svc, ctx) = setup(DEMO_OWNER_EMAIL).await;
        let update = MemberUpdate {
            managed_store_ids: Some(vec!["elsewhere".to_string()]),
            ..Default::default()
        };
        let err = svc.update(&ctx, "demo-manager", update).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_owner_cannot_demote_self() {
        let (svc, ctx) = setup(DEMO_OWNER_EMAIL).await;
        let own_id = ctx.user_id().to_string();
        let update = MemberUpdate {
            role: Some(Role::Accountant),
            ..Default::default()
        };
        assert!(matches!(svc.update(&ctx, &own_id, update).await, Err(Error::Validation(_))));
        assert!(matches!(
            svc.update(&ctx, "stranger", MemberUpdate::default()).await,
            Err(Error::NotFound(_))
        ));
    }
}
