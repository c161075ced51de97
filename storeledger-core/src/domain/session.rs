//! Authenticated session state and its cookie representation

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// The persistence/auth provider in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Supabase,
    LeanCloud,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Supabase => "supabase",
            BackendKind::LeanCloud => "leancloud",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(BackendKind::Supabase),
            "leancloud" | "lc" => Ok(BackendKind::LeanCloud),
            other => Err(Error::Config(format!(
                "Unknown backend '{}', expected 'supabase' or 'leancloud'",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const SB_ACCESS_TOKEN: &str = "sb-access-token";
pub const SB_REFRESH_TOKEN: &str = "sb-refresh-token";
pub const SB_USER_ID: &str = "sb-user-id";

pub const LC_SESSION_TOKEN: &str = "lc_session_token";
pub const LC_USER_ID: &str = "lc_user_id";
pub const LC_USERNAME: &str = "lc_username";
pub const LC_COMPANY_CODE: &str = "lc_company_code";

/// Cookie names a backend writes, used to clear them on logout
pub fn cookie_names(kind: BackendKind) -> &'static [&'static str] {
    match kind {
        BackendKind::Supabase => &[SB_ACCESS_TOKEN, SB_REFRESH_TOKEN, SB_USER_ID],
        BackendKind::LeanCloud => &[LC_SESSION_TOKEN, LC_USER_ID, LC_USERNAME, LC_COMPANY_CODE],
    }
}

/// Login credentials. LeanCloud logs in by username, we use the email for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: None,
        }
    }

    pub fn validate(&mut self) -> Result<()> {
        self.email = self.email.trim().to_lowercase();
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(Error::validation("A valid email address is required"));
        }
        if self.password.len() < 4 {
            return Err(Error::validation("Password must be at least 4 characters"));
        }
        Ok(())
    }
}

/// The identity behind a session, as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A signed-in session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub backend: BackendKind,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub company_code: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
}

// Tokens stay out of debug output
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("company_code", &self.company_code)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(backend: BackendKind, access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            backend,
            access_token: access_token.into(),
            refresh_token: None,
            user_id: user_id.into(),
            username: None,
            company_code: None,
            expires_at: None,
        }
    }

    /// Cookies to set for this session
    pub fn cookie_pairs(&self) -> Vec<(&'static str, String)> {
        match self.backend {
            BackendKind::Supabase => {
                let mut pairs = vec![
                    (SB_ACCESS_TOKEN, self.access_token.clone()),
                    (SB_USER_ID, self.user_id.clone()),
                ];
                if let Some(refresh) = &self.refresh_token {
                    pairs.push((SB_REFRESH_TOKEN, refresh.clone()));
                }
                pairs
            }
            BackendKind::LeanCloud => {
                let mut pairs = vec![
                    (LC_SESSION_TOKEN, self.access_token.clone()),
                    (LC_USER_ID, self.user_id.clone()),
                ];
                if let Some(username) = &self.username {
                    pairs.push((LC_USERNAME, username.clone()));
                }
                if let Some(code) = &self.company_code {
                    pairs.push((LC_COMPANY_CODE, code.clone()));
                }
                pairs
            }
        }
    }

    /// Rebuild a session from request cookies. Missing token or user id means
    /// the request is anonymous.
    pub fn from_cookies<F>(backend: BackendKind, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        match backend {
            BackendKind::Supabase => Some(Self {
                backend,
                access_token: non_empty(SB_ACCESS_TOKEN)?,
                refresh_token: non_empty(SB_REFRESH_TOKEN),
                user_id: non_empty(SB_USER_ID)?,
                username: None,
                company_code: None,
                expires_at: None,
            }),
            BackendKind::LeanCloud => Some(Self {
                backend,
                access_token: non_empty(LC_SESSION_TOKEN)?,
                refresh_token: None,
                user_id: non_empty(LC_USER_ID)?,
                username: non_empty(LC_USERNAME),
                company_code: non_empty(LC_COMPANY_CODE),
                expires_at: None,
            }),
        }
    }
}
