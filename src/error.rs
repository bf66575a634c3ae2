use uuid::Uuid;

use crate::domain::order::OrderStatus;
use crate::domain::purchase_request::RequestStatus;
use crate::domain::user::Role;

// ============================================================================
// Error Taxonomy
// ============================================================================
//
// Three layers, matching how callers are expected to react:
// - ValidationError: bad input, rejected before any state is touched
// - DomainError: expected business-rule violations, safe to surface to users
// - CoreError: the full taxonomy including access control, conflicts, and
//   internal failures
//
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be positive")]
    ZeroAmount,

    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    #[error("product name cannot be empty")]
    EmptyProductName,

    #[error("unit cannot be empty")]
    EmptyUnit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("dish is out of stock")]
    OutOfStock,

    #[error("dish is not available for ordering")]
    DishNotAvailable,

    #[error("invalid order transition from {0:?}")]
    InvalidTransition(OrderStatus),

    #[error("purchase request already decided: {0:?}")]
    AlreadyDecided(RequestStatus),

    #[error("duplicate order request inside the deduplication window")]
    DuplicateRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("access denied: {role:?} cannot {action}")]
    AccessDenied { role: Role, action: &'static str },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// True when the caller should refetch state and retry the command.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}
