//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Supabase (GoTrue + PostgREST) over HTTP
//! - LeanCloud REST storage over HTTP
//! - An in-memory demo backend for demo mode and tests

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::{BackendKind, Transaction};
use crate::ports::{AuthProvider, LedgerRepository};

pub mod demo;
mod http;
pub mod leancloud;
pub mod supabase;

#[cfg(test)]
pub mod mock_server;

pub use demo::DemoBackend;
pub use leancloud::LeanCloudClient;
pub use supabase::SupabaseClient;

/// The auth provider and repository of the selected backend
#[derive(Clone)]
pub struct BackendHandle {
    pub kind: BackendKind,
    pub demo: bool,
    pub auth: Arc<dyn AuthProvider>,
    pub repository: Arc<dyn LedgerRepository>,
}

impl BackendHandle {
    /// Wrap a single type that implements both ports
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AuthProvider + LedgerRepository + 'static,
    {
        Self {
            kind: backend.kind(),
            demo: false,
            auth: backend.clone(),
            repository: backend,
        }
    }

    /// Seeded in-memory backend
    pub fn demo() -> Self {
        Self {
            demo: true,
            ..Self::from_backend(Arc::new(DemoBackend::seeded()))
        }
    }
}

/// Build the backend the configuration selects
pub fn connect(config: &Config) -> Result<BackendHandle> {
    if config.demo_mode {
        return Ok(BackendHandle::demo());
    }
    match config.backend {
        BackendKind::Supabase => {
            let settings = config.supabase.as_ref().ok_or_else(|| {
                Error::Config("Supabase is not configured: set SUPABASE_URL and SUPABASE_ANON_KEY".to_string())
            })?;
            Ok(BackendHandle::from_backend(Arc::new(SupabaseClient::new(settings)?)))
        }
        BackendKind::LeanCloud => {
            let settings = config.leancloud.as_ref().ok_or_else(|| {
                Error::Config(
                    "LeanCloud is not configured: set LEANCLOUD_APP_ID and LEANCLOUD_APP_KEY".to_string(),
                )
            })?;
            Ok(BackendHandle::from_backend(Arc::new(LeanCloudClient::new(settings)?)))
        }
    }
}

/// Fields of a transaction that may be written back on update
pub(crate) fn transaction_patch(tx: &Transaction) -> Result<JsonValue> {
    let mut body = serde_json::to_value(tx)?;
    if let JsonValue::Object(map) = &mut body {
        for key in ["id", "created_at", "company_id", "created_by"] {
            map.remove(key);
        }
    }
    Ok(body)
}
