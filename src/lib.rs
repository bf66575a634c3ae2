// ============================================================================
// canteen-core - Order-and-Ledger Transaction Core
// ============================================================================
//
// In-process transaction core for a campus cafeteria: per-user money ledger,
// dish catalog with stock, exactly-once order placement, purchase-request
// workflow, and read-model projections, all behind a role-checked command API.
// Every committed state change is also appended to an in-memory event journal
// for audit and replay.
//
// ============================================================================

pub mod api;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod ledger;
pub mod orders;
pub mod procurement;
pub mod reports;

pub use api::{CanteenCore, DoubleOrderProbe, Permission, Session};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult, DomainError, ValidationError};
