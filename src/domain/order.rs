use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

// ============================================================================
// Order - Lifecycle Record
// ============================================================================
//
// An order is created once by the Order Engine and is immutable afterwards
// except for the single Pending -> Served transition. `price_charged` is
// fixed at creation and never follows later menu price changes.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    OneTime,
    Subscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Served,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub dish_id: Uuid,
    /// Denormalized at creation so reports survive later catalog edits.
    pub dish_name: String,
    pub meal_type: MealType,
    pub payment_type: PaymentType,
    pub price_charged: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub served_by: Option<Uuid>,
    pub served_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        user_id: Uuid,
        dish_id: Uuid,
        dish_name: impl Into<String>,
        meal_type: MealType,
        payment_type: PaymentType,
        price_charged: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            dish_id,
            dish_name: dish_name.into(),
            meal_type,
            payment_type,
            price_charged,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            served_by: None,
            served_at: None,
        }
    }

    /// Pending -> Served, exactly once. Served is terminal.
    pub fn mark_served(
        &mut self,
        cook_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Served;
                self.served_by = Some(cook_id);
                self.served_at = Some(at);
                Ok(())
            }
            OrderStatus::Served => Err(DomainError::InvalidTransition(self.status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_order() -> Order {
        Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Buckwheat porridge",
            MealType::Breakfast,
            PaymentType::OneTime,
            8_000,
        )
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = pending_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.served_by.is_none());
        assert!(order.served_at.is_none());
    }

    #[test]
    fn test_mark_served_once() {
        let mut order = pending_order();
        let cook = Uuid::new_v4();
        order.mark_served(cook, Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Served);
        assert_eq!(order.served_by, Some(cook));
        assert!(order.served_at.is_some());
    }

    #[test]
    fn test_second_serve_is_invalid_and_leaves_state_unchanged() {
        let mut order = pending_order();
        let cook = Uuid::new_v4();
        order.mark_served(cook, Utc::now()).unwrap();
        let served_at = order.served_at;

        let err = order.mark_served(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidTransition(OrderStatus::Served));
        assert_eq!(order.served_by, Some(cook));
        assert_eq!(order.served_at, served_at);
    }
}
