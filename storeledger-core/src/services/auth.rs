//! Auth service - sign-in, registration and session resolution

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::domain::company::{generate_code, normalize_code};
use crate::domain::result::{Error, Result};
use crate::domain::{
    AuthUser, BackendKind, Company, Credentials, NewCompany, Permission, Profile, Role, Session,
    StoreScope,
};
use crate::ports::{AuthProvider, LedgerRepository};

use super::categories;

/// Attempts at finding an unused company code
const CODE_ATTEMPTS: usize = 5;

/// Everything known about the caller of a request
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user: AuthUser,
    pub profile: Profile,
    pub company: Company,
    pub session: Session,
}

impl UserContext {
    pub fn company_id(&self) -> &str {
        &self.company.id
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.profile.role.can(permission)
    }

    /// Fail with Forbidden unless the role grants `permission`
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "role '{}' does not have permission '{}'",
                self.profile.role.as_str(),
                permission.as_str()
            )))
        }
    }

    pub fn store_scope(&self) -> StoreScope {
        self.profile.store_scope()
    }

    /// `None` asks about company-level records
    pub fn can_access_store(&self, store_id: Option<&str>) -> bool {
        self.store_scope().allows(store_id)
    }
}

/// Result of a successful sign-in or registration
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    #[serde(skip)]
    pub session: Session,
    pub profile: Profile,
    pub company: Company,
}

/// A resolved request. `refreshed` means the session tokens changed and
/// the caller should store the new ones.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub context: UserContext,
    pub refreshed: bool,
}

/// Registration data for a new company owner
#[derive(Debug, Clone)]
pub struct OwnerRegistration {
    pub credentials: Credentials,
    pub company_name: Option<String>,
}

pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    repository: Arc<dyn LedgerRepository>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthProvider>, repository: Arc<dyn LedgerRepository>) -> Self {
        Self { auth, repository }
    }

    pub fn backend(&self) -> BackendKind {
        self.auth.kind()
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<SignedIn> {
        let mut credentials = credentials;
        credentials.validate()?;
        let session = self.auth.sign_in(&credentials).await?;
        let (profile, company) = self.load_membership(&session, &session.user_id).await?;
        Ok(signed_in(session, profile, company))
    }

    /// Sign up, create a company with a fresh code, make the user its
    /// owner and seed the system categories
    pub async fn register_owner(&self, registration: OwnerRegistration) -> Result<SignedIn> {
        let mut credentials = registration.credentials;
        credentials.validate()?;
        let company_name = registration
            .company_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let session = self.auth.sign_up(&credentials).await?;
        let company = self
            .create_company(&session, &session.user_id, company_name)
            .await?;

        let mut profile = Profile::new(session.user_id.clone(), Role::Owner, company.id.clone());
        profile.full_name = credentials.full_name.clone();
        let profile = self.repository.save_profile(&session, &profile).await?;

        categories::seed_defaults(self.repository.as_ref(), &session, &company.id).await?;

        Ok(signed_in(session, profile, company))
    }

    /// Sign up and join an existing company as a plain user
    pub async fn join_company(&self, credentials: Credentials, company_code: &str) -> Result<SignedIn> {
        let mut credentials = credentials;
        credentials.validate()?;
        let code = normalize_code(company_code)?;

        // Look the company up first so a typo does not leave an orphan account
        let company = self
            .repository
            .find_company_by_code(&code)
            .await?
            .ok_or_else(|| Error::not_found(format!("No company uses the code {}", code)))?;

        let session = self.auth.sign_up(&credentials).await?;
        let mut profile = Profile::new(session.user_id.clone(), Role::User, company.id.clone());
        profile.full_name = credentials.full_name.clone();
        let profile = self.repository.save_profile(&session, &profile).await?;

        Ok(signed_in(session, profile, company))
    }

    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        self.auth.sign_out(session).await
    }

    /// Validate a session and load the caller's profile and company.
    ///
    /// An expired Supabase token is refreshed once; any other failure is
    /// returned as is.
    pub async fn resolve(&self, session: Session) -> Result<Resolved> {
        let expired = session
            .expires_at
            .is_some_and(|at| at <= Utc::now().timestamp());

        let (session, user, refreshed) = if expired && self.can_refresh(&session) {
            let fresh = self.auth.refresh(&session).await?;
            let user = self.auth.get_user(&fresh).await?;
            (fresh, user, true)
        } else {
            match self.auth.get_user(&session).await {
                Ok(user) => (session, user, false),
                Err(Error::Unauthorized(_)) if self.can_refresh(&session) => {
                    let fresh = self.auth.refresh(&session).await?;
                    let user = self.auth.get_user(&fresh).await?;
                    (fresh, user, true)
                }
                Err(e) => return Err(e),
            }
        };

        let (profile, company) = self.load_membership(&session, &user.id).await?;
        let mut session = session;
        session.company_code = Some(company.company_code.clone());

        Ok(Resolved {
            context: UserContext {
                user,
                profile,
                company,
                session,
            },
            refreshed,
        })
    }

    fn can_refresh(&self, session: &Session) -> bool {
        session.backend == BackendKind::Supabase && session.refresh_token.is_some()
    }

    async fn load_membership(&self, session: &Session, user_id: &str) -> Result<(Profile, Company)> {
        let profile = self
            .repository
            .get_profile(session, user_id)
            .await?
            .ok_or_else(|| Error::forbidden("No profile found for this account"))?;
        let company_id = profile
            .company_id
            .clone()
            .ok_or_else(|| Error::forbidden("This account does not belong to a company"))?;
        let company = self
            .repository
            .get_company(session, &company_id)
            .await?
            .ok_or_else(|| Error::forbidden("The company of this account no longer exists"))?;
        Ok((profile, company))
    }

    async fn create_company(
        &self,
        session: &Session,
        owner_id: &str,
        name: Option<String>,
    ) -> Result<Company> {
        let mut last_error = None;
        for _ in 0..CODE_ATTEMPTS {
            let company = NewCompany {
                owner_id: owner_id.to_string(),
                company_code: generate_code(),
                name: name.clone(),
            };
            match self.repository.create_company(session, &company).await {
                Ok(created) => return Ok(created),
                Err(Error::Conflict(msg)) => last_error = Some(msg),
                Err(e) => return Err(e),
            }
        }
        Err(Error::conflict(last_error.unwrap_or_else(|| {
            "Could not allocate a unique company code".to_string()
        })))
    }
}

fn signed_in(mut session: Session, profile: Profile, company: Company) -> SignedIn {
    session.company_code = Some(company.company_code.clone());
    SignedIn {
        session,
        profile,
        company,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::{
        DemoBackend, DEMO_COMPANY_CODE, DEMO_MANAGER_EMAIL, DEMO_OWNER_EMAIL, DEMO_PASSWORD,
    };
    use crate::domain::default_categories;
    use crate::ports::TransactionFilter;

    fn service(backend: Arc<DemoBackend>) -> AuthService {
        AuthService::new(backend.clone(), backend)
    }

    #[tokio::test]
    async fn test_sign_in_stamps_company_code() {
        let svc = service(Arc::new(DemoBackend::seeded()));
        let signed_in = svc
            .sign_in(Credentials::new(" Owner@Demo.Local ", DEMO_PASSWORD))
            .await
            .unwrap();
        assert_eq!(signed_in.profile.role, Role::Owner);
        assert_eq!(signed_in.session.company_code.as_deref(), Some(DEMO_COMPANY_CODE));
    }

    #[tokio::test]
    async fn test_register_owner_seeds_company() {
        let backend = Arc::new(DemoBackend::empty());
        let svc = service(backend.clone());

        let mut credentials = Credentials::new("founder@example.com", "secret");
        credentials.full_name = Some("Fay Founder".to_string());
        let signed_in = svc
            .register_owner(OwnerRegistration {
                credentials,
                company_name: Some("  Corner Cafe ".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(signed_in.profile.role, Role::Owner);
        assert_eq!(signed_in.company.name.as_deref(), Some("Corner Cafe"));
        assert_eq!(signed_in.company.company_code.len(), 6);

        let categories = backend
            .list_categories(&signed_in.session, &signed_in.company.id)
            .await
            .unwrap();
        assert_eq!(categories.len(), default_categories("x").len());
        assert!(categories.iter().all(|c| c.is_system));
    }

    #[tokio::test]
    async fn test_join_company_by_code() {
        let svc = service(Arc::new(DemoBackend::seeded()));
        let joined = svc
            .join_company(Credentials::new("clerk@example.com", "secret"), "demo42")
            .await
            .unwrap();
        assert_eq!(joined.profile.role, Role::User);
        assert_eq!(joined.company.company_code, DEMO_COMPANY_CODE);
    }

    #[tokio::test]
    async fn test_join_with_unknown_code_creates_no_account() {
        let backend = Arc::new(DemoBackend::seeded());
        let svc = service(backend.clone());
        let err = svc
            .join_company(Credentials::new("clerk@example.com", "secret"), "ZZZZZZ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // The email is still free
        assert!(backend
            .sign_up(&Credentials::new("clerk@example.com", "secret"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_user_without_profile_is_forbidden() {
        let backend = Arc::new(DemoBackend::empty());
        let session = backend
            .sign_up(&Credentials::new("loner@example.com", "secret"))
            .await
            .unwrap();
        let svc = service(backend);
        let err = svc.resolve(session).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_resolve_refreshes_expired_session_once() {
        let svc = service(Arc::new(DemoBackend::seeded()));
        let signed_in = svc
            .sign_in(Credentials::new(DEMO_OWNER_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();

        let mut session = signed_in.session.clone();
        session.expires_at = Some(Utc::now().timestamp() - 10);
        let resolved = svc.resolve(session).await.unwrap();
        assert!(resolved.refreshed);
        assert_ne!(resolved.context.session.access_token, signed_in.session.access_token);

        // The old token is gone and the new one works without refreshing
        let again = svc.resolve(resolved.context.session.clone()).await.unwrap();
        assert!(!again.refreshed);
    }

    #[tokio::test]
    async fn test_invalid_token_without_refresh_token() {
        let svc = service(Arc::new(DemoBackend::seeded()));
        let session = Session::new(BackendKind::Supabase, "bogus", "demo-owner");
        let err = svc.resolve(session).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_manager_context() {
        let backend = Arc::new(DemoBackend::seeded());
        let svc = service(backend.clone());
        let signed_in = svc
            .sign_in(Credentials::new(DEMO_MANAGER_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();
        let ctx = svc.resolve(signed_in.session).await.unwrap().context;

        assert!(ctx.require(Permission::ViewReports).is_ok());
        assert!(matches!(ctx.require(Permission::ManageStores), Err(Error::Forbidden(_))));
        assert!(!ctx.can_access_store(None));

        let StoreScope::Only(ids) = ctx.store_scope() else {
            panic!("manager should be store-scoped");
        };
        assert_eq!(ids.len(), 1);
        let filter = TransactionFilter::for_company(ctx.company_id()).in_stores(ids);
        assert!(!backend.list_transactions(&ctx.session, &filter).await.unwrap().is_empty());
    }
}
