//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area and takes the caller's
//! [`UserContext`] so permissions and store scope are checked in one place.

mod auth;
mod categories;
mod export;
pub mod logging;
mod members;
pub mod reports;
mod reporting;
mod stores;
mod transactions;

pub use auth::{AuthService, OwnerRegistration, Resolved, SignedIn, UserContext};
pub use categories::CategoryService;
pub use export::ExportService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LogStats, LoggingService};
pub use members::MemberService;
pub use reporting::{ReportQuery, ReportService};
pub use reports::{
    CashFlowReport, Dashboard, ProfitLossReport, ReportPeriod, StoreMetricsReport, TrendPoint,
};
pub use stores::StoreService;
pub use transactions::{TransactionQuery, TransactionService};
