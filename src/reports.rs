use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::dish::{Dish, DishCategory};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::purchase_request::{PurchaseRequest, RequestStatus};
use crate::domain::review::Review;

// ============================================================================
// Read-Model Projections
// ============================================================================
//
// Pure functions over snapshots of committed records. No write side effects;
// recomputing over identical input yields identical output, which the tests
// assert directly. Fields that may be absent in the source data are explicit
// Options, never silently omitted.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusCounts {
    pub pending: usize,
    pub served: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRevenue {
    pub category: DishCategory,
    pub order_count: usize,
    pub revenue_minor: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishRevenue {
    pub dish_id: Uuid,
    pub dish_name: String,
    pub order_count: usize,
    pub revenue_minor: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialReport {
    pub generated_at: DateTime<Utc>,
    /// Revenue counts served orders only; pending money is listed apart.
    pub total_revenue_minor: u64,
    pub pending_revenue_minor: u64,
    pub orders: OrderStatusCounts,
    pub average_order_value_minor: Option<u64>,
    pub unique_customers: usize,
    pub total_balance_held_minor: u64,
    pub revenue_by_category: Vec<CategoryRevenue>,
    pub top_dishes: Vec<DishRevenue>,
    pub purchase_requests: RequestStatusCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DishPopularity {
    pub dish_id: Uuid,
    pub name: String,
    pub order_count: usize,
    pub average_rating: Option<f64>,
    pub calories: Option<u32>,
    pub allergens: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionReport {
    pub generated_at: DateTime<Utc>,
    pub top_dishes: Vec<DishPopularity>,
    pub average_calories_per_served_order: Option<f64>,
    pub review_count: usize,
    pub average_rating: Option<f64>,
}

const TOP_DISH_LIMIT: usize = 10;

pub fn financial_report(
    now: DateTime<Utc>,
    orders: &[Order],
    dishes: &[Dish],
    balances: &[(Uuid, u64)],
    requests: &[PurchaseRequest],
) -> FinancialReport {
    let served: Vec<&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Served)
        .collect();
    let pending_count = orders.len() - served.len();

    let total_revenue_minor: u64 = served.iter().map(|o| o.price_charged).sum();
    let pending_revenue_minor: u64 = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .map(|o| o.price_charged)
        .sum();

    let average_order_value_minor = if served.is_empty() {
        None
    } else {
        Some(total_revenue_minor / served.len() as u64)
    };

    let unique_customers = orders
        .iter()
        .map(|o| o.user_id)
        .collect::<HashSet<_>>()
        .len();

    let category_of: HashMap<Uuid, DishCategory> =
        dishes.iter().map(|d| (d.id, d.category)).collect();

    let mut by_category: HashMap<DishCategory, (usize, u64)> = HashMap::new();
    for order in &served {
        if let Some(category) = category_of.get(&order.dish_id) {
            let entry = by_category.entry(*category).or_default();
            entry.0 += 1;
            entry.1 += order.price_charged;
        }
    }
    let mut revenue_by_category: Vec<CategoryRevenue> = by_category
        .into_iter()
        .map(|(category, (order_count, revenue_minor))| CategoryRevenue {
            category,
            order_count,
            revenue_minor,
        })
        .collect();
    revenue_by_category.sort_by(|a, b| {
        b.revenue_minor
            .cmp(&a.revenue_minor)
            .then_with(|| format!("{:?}", a.category).cmp(&format!("{:?}", b.category)))
    });

    let mut by_dish: HashMap<Uuid, (String, usize, u64)> = HashMap::new();
    for order in &served {
        let entry = by_dish
            .entry(order.dish_id)
            .or_insert_with(|| (order.dish_name.clone(), 0, 0));
        entry.1 += 1;
        entry.2 += order.price_charged;
    }
    let mut top_dishes: Vec<DishRevenue> = by_dish
        .into_iter()
        .map(|(dish_id, (dish_name, order_count, revenue_minor))| DishRevenue {
            dish_id,
            dish_name,
            order_count,
            revenue_minor,
        })
        .collect();
    top_dishes.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.dish_name.cmp(&b.dish_name))
            .then_with(|| a.dish_id.cmp(&b.dish_id))
    });
    top_dishes.truncate(TOP_DISH_LIMIT);

    let mut purchase_requests = RequestStatusCounts {
        pending: 0,
        approved: 0,
        rejected: 0,
    };
    for request in requests {
        match request.status {
            RequestStatus::Pending => purchase_requests.pending += 1,
            RequestStatus::Approved => purchase_requests.approved += 1,
            RequestStatus::Rejected => purchase_requests.rejected += 1,
        }
    }

    FinancialReport {
        generated_at: now,
        total_revenue_minor,
        pending_revenue_minor,
        orders: OrderStatusCounts {
            pending: pending_count,
            served: served.len(),
        },
        average_order_value_minor,
        unique_customers,
        total_balance_held_minor: balances.iter().map(|(_, b)| b).sum(),
        revenue_by_category,
        top_dishes,
        purchase_requests,
    }
}

pub fn nutrition_report(
    now: DateTime<Utc>,
    orders: &[Order],
    dishes: &[Dish],
    reviews: &[Review],
) -> NutritionReport {
    let mut order_counts: HashMap<Uuid, usize> = HashMap::new();
    for order in orders {
        *order_counts.entry(order.dish_id).or_default() += 1;
    }

    let mut rating_sums: HashMap<Uuid, (u32, u32)> = HashMap::new();
    for review in reviews {
        let entry = rating_sums.entry(review.dish_id).or_default();
        entry.0 += u32::from(review.rating);
        entry.1 += 1;
    }

    let mut top_dishes: Vec<DishPopularity> = dishes
        .iter()
        .map(|dish| {
            let average_rating = rating_sums
                .get(&dish.id)
                .map(|(sum, count)| f64::from(*sum) / f64::from(*count));
            DishPopularity {
                dish_id: dish.id,
                name: dish.name.clone(),
                order_count: order_counts.get(&dish.id).copied().unwrap_or(0),
                average_rating,
                calories: dish.calories,
                allergens: dish.allergens.clone(),
            }
        })
        .collect();
    top_dishes.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.dish_id.cmp(&b.dish_id))
    });
    top_dishes.truncate(TOP_DISH_LIMIT);

    let calories_of: HashMap<Uuid, u32> = dishes
        .iter()
        .filter_map(|d| d.calories.map(|c| (d.id, c)))
        .collect();
    let served_calories: Vec<u32> = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Served)
        .filter_map(|o| calories_of.get(&o.dish_id).copied())
        .collect();
    let average_calories_per_served_order = if served_calories.is_empty() {
        None
    } else {
        Some(
            served_calories.iter().map(|c| f64::from(*c)).sum::<f64>()
                / served_calories.len() as f64,
        )
    };

    let average_rating = if reviews.is_empty() {
        None
    } else {
        Some(
            reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64,
        )
    };

    NutritionReport {
        generated_at: now,
        top_dishes,
        average_calories_per_served_order,
        review_count: reviews.len(),
        average_rating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{MealType, PaymentType};

    fn served_order(user_id: Uuid, dish: &Dish) -> Order {
        let mut order = Order::new(
            user_id,
            dish.id,
            dish.name.clone(),
            MealType::Lunch,
            PaymentType::OneTime,
            dish.price_minor,
        );
        order.mark_served(Uuid::new_v4(), Utc::now()).unwrap();
        order
    }

    fn sample_history() -> (Vec<Order>, Vec<Dish>, Vec<(Uuid, u64)>, Vec<PurchaseRequest>) {
        let soup = Dish::new("Chicken soup", DishCategory::Lunch, 120).with_calories(200);
        let pilaf = Dish::new("Pilaf", DishCategory::Lunch, 180).with_calories(350);
        let compote = Dish::new("Compote", DishCategory::Drink, 30);

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let orders = vec![
            served_order(alice, &soup),
            served_order(alice, &soup),
            served_order(bob, &pilaf),
            Order::new(
                bob,
                compote.id,
                compote.name.clone(),
                MealType::Lunch,
                PaymentType::OneTime,
                compote.price_minor,
            ),
        ];

        let mut decided = PurchaseRequest::new(Uuid::new_v4(), "Rice", 5, "kg", None, None);
        decided
            .decide(
                Uuid::new_v4(),
                crate::domain::purchase_request::Decision::Approve,
                None,
                Utc::now(),
            )
            .unwrap();
        let requests = vec![
            decided,
            PurchaseRequest::new(Uuid::new_v4(), "Milk", 12, "l", None, None),
        ];

        let balances = vec![(alice, 300), (bob, 150)];
        (orders, vec![soup, pilaf, compote], balances, requests)
    }

    #[test]
    fn test_financial_report_aggregates() {
        let (orders, dishes, balances, requests) = sample_history();
        let report = financial_report(Utc::now(), &orders, &dishes, &balances, &requests);

        // Two soups at 120 plus one pilaf at 180, served.
        assert_eq!(report.total_revenue_minor, 420);
        assert_eq!(report.pending_revenue_minor, 30);
        assert_eq!(report.orders, OrderStatusCounts { pending: 1, served: 3 });
        assert_eq!(report.average_order_value_minor, Some(140));
        assert_eq!(report.unique_customers, 2);
        assert_eq!(report.total_balance_held_minor, 450);
        assert_eq!(report.top_dishes[0].dish_name, "Chicken soup");
        assert_eq!(report.top_dishes[0].revenue_minor, 240);
        assert_eq!(
            report.purchase_requests,
            RequestStatusCounts {
                pending: 1,
                approved: 1,
                rejected: 0
            }
        );
        assert_eq!(report.revenue_by_category[0].category, DishCategory::Lunch);
        assert_eq!(report.revenue_by_category[0].revenue_minor, 420);
    }

    #[test]
    fn test_nutrition_report_nullable_fields() {
        let (orders, dishes, _, _) = sample_history();
        let compote_id = dishes[2].id;
        let reviews = vec![
            Review::new(dishes[0].id, Uuid::new_v4(), 5, None).unwrap(),
            Review::new(dishes[0].id, Uuid::new_v4(), 4, Some("good".into())).unwrap(),
        ];

        let report = nutrition_report(Utc::now(), &orders, &dishes, &reviews);

        assert_eq!(report.review_count, 2);
        assert_eq!(report.average_rating, Some(4.5));
        // Served orders: soup(200) x2, pilaf(350); compote is pending.
        assert_eq!(report.average_calories_per_served_order, Some(250.0));

        let soup = &report.top_dishes[0];
        assert_eq!(soup.name, "Chicken soup");
        assert_eq!(soup.order_count, 2);
        assert_eq!(soup.average_rating, Some(4.5));

        // The compote never declared calories and has no reviews.
        let compote = report
            .top_dishes
            .iter()
            .find(|d| d.dish_id == compote_id)
            .unwrap();
        assert_eq!(compote.calories, None);
        assert_eq!(compote.average_rating, None);
    }

    #[test]
    fn test_projections_are_deterministic() {
        let (orders, dishes, balances, requests) = sample_history();
        let reviews = vec![Review::new(dishes[1].id, Uuid::new_v4(), 3, None).unwrap()];
        let now = Utc::now();

        let financial_a = financial_report(now, &orders, &dishes, &balances, &requests);
        let financial_b = financial_report(now, &orders, &dishes, &balances, &requests);
        assert_eq!(financial_a, financial_b);

        let nutrition_a = nutrition_report(now, &orders, &dishes, &reviews);
        let nutrition_b = nutrition_report(now, &orders, &dishes, &reviews);
        assert_eq!(nutrition_a, nutrition_b);
    }

    #[test]
    fn test_empty_history() {
        let report = financial_report(Utc::now(), &[], &[], &[], &[]);
        assert_eq!(report.total_revenue_minor, 0);
        assert_eq!(report.average_order_value_minor, None);
        assert_eq!(report.unique_customers, 0);

        let nutrition = nutrition_report(Utc::now(), &[], &[], &[]);
        assert_eq!(nutrition.average_calories_per_served_order, None);
        assert_eq!(nutrition.average_rating, None);
        assert!(nutrition.top_dishes.is_empty());
    }
}
