use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

// ============================================================================
// Purchase Request - Procurement State Machine
// ============================================================================
//
// Created by a cook, decided exactly once by an admin. Pending is the only
// non-terminal state; Approved and Rejected are mutually exclusive and never
// reversed.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: Uuid,
    pub cook_id: Uuid,
    /// Optional link to a catalog dish; approval restocks it automatically.
    pub dish_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: u32,
    pub unit: String,
    pub reason: Option<String>,
    pub status: RequestStatus,
    pub admin_id: Option<Uuid>,
    pub admin_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl PurchaseRequest {
    pub fn new(
        cook_id: Uuid,
        product_name: impl Into<String>,
        quantity: u32,
        unit: impl Into<String>,
        reason: Option<String>,
        dish_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cook_id,
            dish_id,
            product_name: product_name.into(),
            quantity,
            unit: unit.into(),
            reason,
            status: RequestStatus::Pending,
            admin_id: None,
            admin_comment: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    /// Commit a decision. The expected-Pending check here is the single
    /// point that makes the transition exactly-once: a losing concurrent
    /// decider observes the terminal status and gets `AlreadyDecided`.
    pub fn decide(
        &mut self,
        admin_id: Uuid,
        decision: Decision,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<RequestStatus, DomainError> {
        if self.status != RequestStatus::Pending {
            return Err(DomainError::AlreadyDecided(self.status));
        }

        self.status = match decision {
            Decision::Approve => RequestStatus::Approved,
            Decision::Reject => RequestStatus::Rejected,
        };
        self.admin_id = Some(admin_id);
        self.admin_comment = comment;
        self.decided_at = Some(at);
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_request() -> PurchaseRequest {
        PurchaseRequest::new(
            Uuid::new_v4(),
            "Chicken for soup",
            10,
            "kg",
            Some("ran out in storage".into()),
            None,
        )
    }

    #[test]
    fn test_new_request_is_pending() {
        let request = pending_request();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.decided_at.is_none());
        assert!(request.admin_id.is_none());
    }

    #[test]
    fn test_approve_stamps_decision_fields() {
        let mut request = pending_request();
        let admin = Uuid::new_v4();
        let status = request
            .decide(admin, Decision::Approve, Some("ok".into()), Utc::now())
            .unwrap();

        assert_eq!(status, RequestStatus::Approved);
        assert_eq!(request.admin_id, Some(admin));
        assert_eq!(request.admin_comment.as_deref(), Some("ok"));
        assert!(request.decided_at.is_some());
    }

    #[test]
    fn test_decision_is_never_reversed() {
        let mut request = pending_request();
        request
            .decide(Uuid::new_v4(), Decision::Approve, Some("ok".into()), Utc::now())
            .unwrap();

        let err = request
            .decide(Uuid::new_v4(), Decision::Reject, Some("x".into()), Utc::now())
            .unwrap_err();

        assert_eq!(err, DomainError::AlreadyDecided(RequestStatus::Approved));
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.admin_comment.as_deref(), Some("ok"));
    }

    #[test]
    fn test_reject_is_terminal_too() {
        let mut request = pending_request();
        request
            .decide(Uuid::new_v4(), Decision::Reject, None, Utc::now())
            .unwrap();

        let err = request
            .decide(Uuid::new_v4(), Decision::Approve, None, Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::AlreadyDecided(RequestStatus::Rejected));
    }
}
