// ============================================================================
// Order Engine
// ============================================================================
//
// Composes Catalog and Ledger into the atomic order-placement transaction,
// owns the Order lifecycle, and guards against duplicate submissions.
//
// ============================================================================

pub mod dedup;
pub mod engine;

pub use dedup::DedupWindow;
pub use engine::{OrderEngine, OrderEvent};
