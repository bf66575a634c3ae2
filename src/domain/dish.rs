use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Dish - Catalog Item
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DishCategory {
    Breakfast,
    Lunch,
    Drink,
}

/// Running rating aggregate folded from submitted reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub sum: u32,
    pub count: u32,
}

impl RatingAggregate {
    pub fn record(&mut self, rating: u8) {
        self.sum += u32::from(rating);
        self.count += 1;
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(f64::from(self.sum) / f64::from(self.count))
        }
    }
}

/// Static dish data. Stock quantity is owned by the Catalog so it can be
/// locked independently of reads like menu listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: DishCategory,
    pub price_minor: u64,
    pub is_available: bool,
    pub ingredients: Option<String>,
    pub allergens: Option<String>,
    pub calories: Option<u32>,
    pub rating: RatingAggregate,
}

impl Dish {
    pub fn new(name: impl Into<String>, category: DishCategory, price_minor: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            category,
            price_minor,
            is_available: true,
            ingredients: None,
            allergens: None,
            calories: None,
            rating: RatingAggregate::default(),
        }
    }

    pub fn with_calories(mut self, calories: u32) -> Self {
        self.calories = Some(calories);
        self
    }

    pub fn with_allergens(mut self, allergens: impl Into<String>) -> Self {
        self.allergens = Some(allergens.into());
        self
    }
}
