//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod category;
pub mod company;
mod profile;
pub mod result;
pub mod session;
mod store;
pub mod transaction;

pub use category::{default_categories, Category, NewCategory};
pub use company::{Company, NewCompany};
pub use profile::{MemberUpdate, Permission, Profile, Role, StoreScope};
pub use session::{AuthUser, BackendKind, Credentials, Session};
pub use store::{NewStore, Store};
pub use transaction::{
    CashFlowActivity, NewTransaction, Transaction, TransactionNature, TransactionRecord,
    TransactionType, TransactionUpdate,
};
