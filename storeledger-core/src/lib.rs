//! StoreLedger Core - Business logic for small-business bookkeeping
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Transaction, Category, Store, etc.)
//! - **ports**: Trait definitions for external dependencies (AuthProvider, LedgerRepository)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (Supabase, LeanCloud, demo)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
mod log_migrations;

use adapters::BackendHandle;
use config::Config;
use domain::result::Result;
use domain::BackendKind;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Category, Company, Profile, Role, Session, Store, Transaction, TransactionType,
};
pub use domain::result::{Error, OperationResult};

/// Main context for StoreLedger operations
///
/// This is the primary entry point for all business logic. It holds the
/// configuration, the selected backend and all services.
pub struct LedgerContext {
    pub config: Config,
    pub backend: BackendHandle,
    pub auth_service: AuthService,
    pub transaction_service: TransactionService,
    pub category_service: CategoryService,
    pub store_service: StoreService,
    pub member_service: MemberService,
    pub report_service: ReportService,
    pub export_service: ExportService,
}

impl LedgerContext {
    /// Connect to the backend the configuration selects
    pub fn new(config: Config) -> Result<Self> {
        let backend = adapters::connect(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Build a context around an already connected backend
    pub fn with_backend(config: Config, backend: BackendHandle) -> Self {
        let repository = &backend.repository;

        Self {
            auth_service: AuthService::new(backend.auth.clone(), repository.clone()),
            transaction_service: TransactionService::new(repository.clone()),
            category_service: CategoryService::new(repository.clone()),
            store_service: StoreService::new(repository.clone()),
            member_service: MemberService::new(repository.clone()),
            report_service: ReportService::new(repository.clone()),
            export_service: ExportService::new(repository.clone()),
            config,
            backend,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind
    }

    pub fn is_demo(&self) -> bool {
        self.backend.demo
    }
}
