use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Subscription - Prepaid Meal Plan
// ============================================================================
//
// Sold as a one-shot ledger debit of the plan price. Meal consumption against
// `meals_left` is owned by the payment-selection collaborator.
//
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub total_meals: u32,
    pub price_minor: u64,
    pub duration_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_meals: u32,
    pub meals_left: u32,
    pub price_minor: u64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl Subscription {
    pub fn purchase(user_id: Uuid, plan: SubscriptionPlan, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            total_meals: plan.total_meals,
            meals_left: plan.total_meals,
            price_minor: plan.price_minor,
            start_date: now,
            end_date: now + Duration::days(i64::from(plan.duration_days)),
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_starts_full() {
        let plan = SubscriptionPlan {
            total_meals: 20,
            price_minor: 200_000,
            duration_days: 30,
        };
        let now = Utc::now();
        let sub = Subscription::purchase(Uuid::new_v4(), plan, now);

        assert_eq!(sub.meals_left, 20);
        assert!(sub.is_active);
        assert_eq!(sub.end_date - sub.start_date, Duration::days(30));
    }
}
