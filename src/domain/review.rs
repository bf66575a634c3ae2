use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ============================================================================
// Review
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub dish_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Rating must be in [1, 5]; everything else about a review is free-form.
    pub fn new(
        dish_id: Uuid,
        user_id: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Self, ValidationError> {
        if !(1..=5).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dish_id,
            user_id,
            rating,
            comment,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let dish = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(Review::new(dish, user, 1, None).is_ok());
        assert!(Review::new(dish, user, 5, None).is_ok());
        assert_eq!(
            Review::new(dish, user, 0, None).unwrap_err(),
            ValidationError::RatingOutOfRange(0)
        );
        assert_eq!(
            Review::new(dish, user, 6, None).unwrap_err(),
            ValidationError::RatingOutOfRange(6)
        );
    }
}
