//! Authentication provider port
//!
//! Supabase and LeanCloud expose the same operations behind this trait so the
//! rest of the application never needs to know which one is running.

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{AuthUser, BackendKind, Credentials, Session};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Which backend this provider talks to
    fn kind(&self) -> BackendKind;

    /// Exchange credentials for a session
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

    /// Create a user and return its first session
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session>;

    /// Invalidate the session where the backend supports it
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// Resolve the user behind a session. An expired or revoked token is
    /// `Error::Unauthorized`.
    async fn get_user(&self, session: &Session) -> Result<AuthUser>;

    /// Obtain a fresh session, e.g. from a refresh token
    async fn refresh(&self, session: &Session) -> Result<Session>;
}
