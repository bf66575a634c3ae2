use canteen_core::domain::dish::{Dish, DishCategory};
use canteen_core::domain::order::{MealType, PaymentType};
use canteen_core::domain::subscription::SubscriptionPlan;
use canteen_core::domain::user::{Role, User};
use canteen_core::{CanteenCore, CoreConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,canteen_core=debug")),
        )
        .init();

    tracing::info!("🚀 Starting Canteen Transaction Core Demo");

    let core = CanteenCore::new(CoreConfig::from_env());

    // === 1. Seed users and the menu ===
    tracing::info!("Seeding users and dishes");
    let student_id = core
        .register_user(User::new(Role::Student, "Ivan Ivanov").with_class("10A"), 0)
        .await;
    let cook_id = core
        .register_user(User::new(Role::Cook, "Alexey Smirnov"), 0)
        .await;
    let admin_id = core
        .register_user(User::new(Role::Admin, "Anna Kozlova"), 0)
        .await;

    let soup_id = core
        .add_dish(
            Dish::new("Chicken soup", DishCategory::Lunch, 15_000).with_calories(220),
            3,
        )
        .await;
    let porridge_id = core
        .add_dish(
            Dish::new("Oatmeal porridge", DishCategory::Breakfast, 8_000).with_calories(180),
            5,
        )
        .await;
    let compote_id = core
        .add_dish(Dish::new("Berry compote", DishCategory::Drink, 4_000), 10)
        .await;

    let student = core.session(student_id).await?;
    let cook = core.session(cook_id).await?;
    let admin = core.session(admin_id).await?;

    // === 2. Top up and browse ===
    let balance = core.topup_balance(&student, 100_000).await?;
    tracing::info!("💰 Student balance after top-up: {balance}");
    for entry in core.menu(&student, None).await? {
        tracing::info!(
            "📋 {}: {} minor units, {} in stock",
            entry.dish.name,
            entry.dish.price_minor,
            entry.quantity
        );
    }

    // === 3. Place and serve an order ===
    let order = core
        .create_order(&student, soup_id, MealType::Lunch, PaymentType::OneTime)
        .await?;
    tracing::info!("🧾 Order {} placed, charged {}", order.id, order.price_charged);
    let served = core.mark_order_served(&cook, order.id).await?;
    tracing::info!("🍽️ Order {} served by cook {:?}", served.id, served.served_by);

    // === 4. Review the dish ===
    core.create_review(&student, soup_id, 5, Some("Best soup this week".into()))
        .await?;
    let dish = core.dish(&student, soup_id).await?;
    tracing::info!("⭐ {} now rated {:?}", dish.name, dish.rating.average());

    // === 5. Procurement: cook asks, admin approves, stock returns ===
    let request = core
        .create_purchase_request(
            &cook,
            "Chicken soup base",
            20,
            "portions",
            Some("stock is running low".into()),
            Some(soup_id),
        )
        .await?;
    let decided = core
        .approve_purchase_request(&admin, request.id, Some("approved for Monday".into()))
        .await?;
    tracing::info!(
        "✅ Purchase request {} decided: {:?}",
        decided.id,
        decided.status
    );

    // === 6. Subscription purchase and a breakfast order ===
    let plan = SubscriptionPlan {
        total_meals: 10,
        price_minor: 60_000,
        duration_days: 30,
    };
    let subscription = core.create_subscription(&student, plan).await?;
    tracing::info!(
        "🎫 Subscription {} bought, {} meals on it",
        subscription.id,
        subscription.meals_left
    );
    core.create_order(&student, porridge_id, MealType::Breakfast, PaymentType::OneTime)
        .await?;

    // === 7. Reports ===
    let financial = core.financial_report(&admin).await?;
    tracing::info!(
        "📊 Revenue: {} minor units across {} served orders, {} unique customers",
        financial.total_revenue_minor,
        financial.orders.served,
        financial.unique_customers
    );
    let nutrition = core.nutrition_report(&admin).await?;
    tracing::info!(
        "🥗 Top dish: {:?}, average rating {:?}",
        nutrition.top_dishes.first().map(|d| d.name.as_str()),
        nutrition.average_rating
    );

    // === 8. Duplicate-order probe ===
    let probe = core
        .probe_duplicate_order(
            &admin,
            student_id,
            compote_id,
            MealType::Lunch,
            PaymentType::OneTime,
        )
        .await?;
    tracing::info!(
        "🔁 Probe: {} committed, {} rejected as duplicates (exactly-once: {})",
        probe.committed_orders.len(),
        probe.duplicate_rejections,
        probe.exactly_once
    );

    tracing::info!(
        "📜 Journal holds {} events, demo finished",
        core.journal().len().await
    );
    Ok(())
}
