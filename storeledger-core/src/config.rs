//! Configuration management
//!
//! Non-secret settings may live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "backend": "leancloud",
//!   "demoMode": false,
//!   "server": { "host": "0.0.0.0", "port": 3000, "secureCookies": true }
//! }
//! ```
//! Environment variables override the file. API keys are only ever read from
//! the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
pub use crate::domain::BackendKind;

pub const BACKEND_ENV: &str = "STORELEDGER_BACKEND";
pub const DEMO_MODE_ENV: &str = "STORELEDGER_DEMO_MODE";
pub const DATA_DIR_ENV: &str = "STORELEDGER_DIR";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    demo_mode: bool,
    #[serde(default)]
    server: ServerSettingsFile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettingsFile {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    secure_cookies: Option<bool>,
}

/// Supabase project credentials
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
}

/// LeanCloud application credentials
#[derive(Clone, PartialEq, Eq)]
pub struct LeanCloudSettings {
    pub app_id: String,
    pub app_key: String,
    pub master_key: Option<String>,
    pub server_url: String,
}

// Keys stay out of debug output
impl std::fmt::Debug for SupabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSettings")
            .field("url", &self.url)
            .field("service_role_key", &self.service_role_key.is_some())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for LeanCloudSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeanCloudSettings")
            .field("app_id", &self.app_id)
            .field("server_url", &self.server_url)
            .field("master_key", &self.master_key.is_some())
            .finish_non_exhaustive()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub secure_cookies: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secure_cookies: false,
        }
    }
}

/// StoreLedger configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub demo_mode: bool,
    pub supabase: Option<SupabaseSettings>,
    pub leancloud: Option<LeanCloudSettings>,
    pub server: ServerSettings,
    pub data_dir: PathBuf,
}

/// Pick the backend from environment flags
///
/// 1. `STORELEDGER_BACKEND` when set
/// 2. LeanCloud when only LeanCloud credentials are present
/// 3. Supabase otherwise
pub fn detect_backend<F>(env: F) -> Result<BackendKind>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| env(key).is_some_and(|v| !v.trim().is_empty());

    if let Some(explicit) = env(BACKEND_ENV).filter(|v| !v.trim().is_empty()) {
        return BackendKind::parse(&explicit);
    }
    if present("LEANCLOUD_APP_ID") && !present("SUPABASE_URL") {
        return Ok(BackendKind::LeanCloud);
    }
    Ok(BackendKind::Supabase)
}

fn parse_bool(value: Option<String>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default LeanCloud API domain for an app id
fn default_leancloud_server(app_id: &str) -> String {
    let prefix: String = app_id.chars().take(8).collect::<String>().to_lowercase();
    format!("https://{}.api.lncldglobal.com", prefix)
}

/// Default data directory: `STORELEDGER_DIR` or `~/.storeledger`
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".storeledger")
}

impl Config {
    /// Load config from the data directory and the process environment
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with(data_dir, |key| std::env::var(key).ok())
    }

    /// Load config with an explicit variable lookup
    pub fn load_with<F>(data_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings_path = data_dir.join("settings.json");
        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Invalid {}: {}", settings_path.display(), e)))?
        } else {
            SettingsFile::default()
        };

        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match env(BACKEND_ENV) {
            Some(_) => detect_backend(&env)?,
            None => match raw.backend.as_deref() {
                Some(name) => BackendKind::parse(name)?,
                None => detect_backend(&env)?,
            },
        };

        let demo_mode = parse_bool(env(DEMO_MODE_ENV)).unwrap_or(raw.demo_mode);

        let supabase = match (env("SUPABASE_URL"), env("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseSettings {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                service_role_key: env("SUPABASE_SERVICE_ROLE_KEY"),
            }),
            _ => None,
        };

        let leancloud = match (env("LEANCLOUD_APP_ID"), env("LEANCLOUD_APP_KEY")) {
            (Some(app_id), Some(app_key)) => Some(LeanCloudSettings {
                server_url: env("LEANCLOUD_SERVER_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| default_leancloud_server(&app_id)),
                app_id,
                app_key,
                master_key: env("LEANCLOUD_MASTER_KEY"),
            }),
            _ => None,
        };

        let port = match env("STORELEDGER_PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("Invalid STORELEDGER_PORT: {}", p)))?,
            None => raw.server.port.unwrap_or(DEFAULT_PORT),
        };

        let server = ServerSettings {
            host: env("STORELEDGER_HOST")
                .or(raw.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            secure_cookies: parse_bool(env("STORELEDGER_SECURE_COOKIES"))
                .or(raw.server.secure_cookies)
                .unwrap_or(false),
        };

        Ok(Self {
            backend,
            demo_mode,
            supabase,
            leancloud,
            server,
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Check the selected backend has the credentials it needs
    pub fn validate(&self) -> Result<()> {
        if self.demo_mode {
            return Ok(());
        }
        match self.backend {
            BackendKind::Supabase if self.supabase.is_none() => Err(Error::Config(
                "Supabase backend selected but SUPABASE_URL / SUPABASE_ANON_KEY are not set"
                    .to_string(),
            )),
            BackendKind::LeanCloud if self.leancloud.is_none() => Err(Error::Config(
                "LeanCloud backend selected but LEANCLOUD_APP_ID / LEANCLOUD_APP_KEY are not set"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether privileged lookups (join by company code) are possible
    pub fn has_privileged_key(&self) -> bool {
        match self.backend {
            BackendKind::Supabase => self
                .supabase
                .as_ref()
                .is_some_and(|s| s.service_role_key.is_some()),
            BackendKind::LeanCloud => self
                .leancloud
                .as_ref()
                .is_some_and(|l| l.master_key.is_some()),
        }
    }
}
