use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, MenuEntry};
use crate::config::CoreConfig;
use crate::domain::dish::{Dish, DishCategory};
use crate::domain::order::{MealType, Order, PaymentType};
use crate::domain::purchase_request::{Decision, PurchaseRequest};
use crate::domain::review::Review;
use crate::domain::subscription::{Subscription, SubscriptionPlan};
use crate::domain::user::{Role, User};
use crate::error::{CoreError, CoreResult};
use crate::history::Journal;
use crate::ledger::Ledger;
use crate::orders::OrderEngine;
use crate::procurement::{ProcurementWorkflow, RestockFulfillment};
use crate::reports::{financial_report, nutrition_report, FinancialReport, NutritionReport};

// ============================================================================
// Command API Boundary
// ============================================================================
//
// Callers arrive pre-authenticated as a Session (user_id, role). Every
// command checks an explicit role -> permission table before dispatch;
// an unauthorized call is an AccessDenied error, never a silent no-op.
// Student commands always act on the session's own user id.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadMenu,
    PlaceOrder,
    ViewOwnOrders,
    ViewOwnBalance,
    ViewAllOrders,
    ServeOrders,
    TopupBalance,
    PurchaseSubscription,
    WriteReview,
    SubmitPurchaseRequest,
    ViewPurchaseRequests,
    DecidePurchaseRequests,
    ViewReports,
    RunDiagnostics,
}

/// The authorization table. Role-based branching lives here and nowhere
/// else.
fn permissions(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::Student => &[
            ReadMenu,
            PlaceOrder,
            ViewOwnOrders,
            ViewOwnBalance,
            TopupBalance,
            PurchaseSubscription,
            WriteReview,
        ],
        Role::Cook => &[
            ReadMenu,
            ViewAllOrders,
            ServeOrders,
            SubmitPurchaseRequest,
            ViewPurchaseRequests,
        ],
        Role::Admin => &[
            ReadMenu,
            ViewAllOrders,
            ViewPurchaseRequests,
            DecidePurchaseRequests,
            ViewReports,
            RunDiagnostics,
        ],
    }
}

fn authorize(session: &Session, permission: Permission, action: &'static str) -> CoreResult<()> {
    if permissions(session.role).contains(&permission) {
        Ok(())
    } else {
        warn!(user_id = %session.user_id, role = ?session.role, action, "access denied");
        Err(CoreError::AccessDenied {
            role: session.role,
            action,
        })
    }
}

/// Outcome of the duplicate-order diagnostic: two logically identical
/// order commands raced against each other.
#[derive(Debug, Clone, Serialize)]
pub struct DoubleOrderProbe {
    pub committed_orders: Vec<Uuid>,
    pub duplicate_rejections: usize,
    pub other_failures: Vec<String>,
    pub exactly_once: bool,
}

pub struct CanteenCore {
    users: RwLock<HashMap<Uuid, User>>,
    ledger: Arc<Ledger>,
    catalog: Arc<Catalog>,
    orders: Arc<OrderEngine>,
    procurement: Arc<ProcurementWorkflow>,
    journal: Arc<Journal>,
    reviews: RwLock<Vec<Review>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl CanteenCore {
    pub fn new(config: CoreConfig) -> Self {
        let journal = Arc::new(Journal::new());
        let catalog = Arc::new(Catalog::new(Arc::clone(&journal), &config));
        let ledger = Arc::new(Ledger::new(Arc::clone(&journal), &config));
        let orders = Arc::new(OrderEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            Arc::clone(&journal),
            &config,
        ));
        let procurement = Arc::new(ProcurementWorkflow::new(
            Arc::clone(&catalog) as Arc<dyn RestockFulfillment>,
            Arc::clone(&journal),
        ));

        Self {
            users: RwLock::new(HashMap::new()),
            ledger,
            catalog,
            orders,
            procurement,
            journal,
            reviews: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ------------------------------------------------------------------
    // Wiring (seeding / identity collaborator), not session-gated
    // ------------------------------------------------------------------

    pub async fn register_user(&self, user: User, initial_balance: u64) -> Uuid {
        let user_id = user.id;
        self.ledger.open_account(user_id, initial_balance).await;
        self.users.write().await.insert(user_id, user);
        user_id
    }

    pub async fn add_dish(&self, dish: Dish, initial_stock: u32) -> Uuid {
        let dish_id = dish.id;
        self.catalog.add_dish(dish, initial_stock).await;
        dish_id
    }

    /// Build a session for a registered user, as the authentication
    /// collaborator would after verifying credentials.
    pub async fn session(&self, user_id: Uuid) -> CoreResult<Session> {
        let users = self.users.read().await;
        let user = users.get(&user_id).ok_or(CoreError::NotFound {
            entity: "user",
            id: user_id,
        })?;
        Ok(Session::new(user.id, user.role))
    }

    // ------------------------------------------------------------------
    // Catalog reads
    // ------------------------------------------------------------------

    pub async fn menu(
        &self,
        session: &Session,
        category: Option<DishCategory>,
    ) -> CoreResult<Vec<MenuEntry>> {
        authorize(session, Permission::ReadMenu, "read the menu")?;
        Ok(self.catalog.menu(category).await)
    }

    pub async fn dish(&self, session: &Session, dish_id: Uuid) -> CoreResult<Dish> {
        authorize(session, Permission::ReadMenu, "read the menu")?;
        self.catalog.get_dish(dish_id).await
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub async fn create_order(
        &self,
        session: &Session,
        dish_id: Uuid,
        meal_type: MealType,
        payment_type: PaymentType,
    ) -> CoreResult<Order> {
        authorize(session, Permission::PlaceOrder, "place an order")?;
        self.orders
            .place_order(session.user_id, dish_id, meal_type, payment_type)
            .await
    }

    pub async fn my_orders(&self, session: &Session) -> CoreResult<Vec<Order>> {
        authorize(session, Permission::ViewOwnOrders, "view own orders")?;
        Ok(self.orders.orders_for_user(session.user_id).await)
    }

    pub async fn all_orders(&self, session: &Session) -> CoreResult<Vec<Order>> {
        authorize(session, Permission::ViewAllOrders, "view all orders")?;
        Ok(self.orders.all_orders().await)
    }

    /// The cook's working queue: pending orders, oldest first.
    pub async fn pending_orders(&self, session: &Session) -> CoreResult<Vec<Order>> {
        authorize(session, Permission::ViewAllOrders, "view the order queue")?;
        Ok(self.orders.pending_orders().await)
    }

    pub async fn mark_order_served(
        &self,
        session: &Session,
        order_id: Uuid,
    ) -> CoreResult<Order> {
        authorize(session, Permission::ServeOrders, "serve an order")?;
        self.orders.mark_served(order_id, session.user_id).await
    }

    // ------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------

    pub async fn topup_balance(&self, session: &Session, amount: u64) -> CoreResult<u64> {
        authorize(session, Permission::TopupBalance, "top up the balance")?;
        self.ledger.credit(session.user_id, amount).await
    }

    pub async fn my_balance(&self, session: &Session) -> CoreResult<u64> {
        authorize(session, Permission::ViewOwnBalance, "view the balance")?;
        self.ledger.balance(session.user_id).await
    }

    /// Buy a meal plan: one debit of the plan price, then the subscription
    /// record. A failed debit leaves no record behind.
    pub async fn create_subscription(
        &self,
        session: &Session,
        plan: SubscriptionPlan,
    ) -> CoreResult<Subscription> {
        authorize(session, Permission::PurchaseSubscription, "buy a subscription")?;

        self.ledger.debit(session.user_id, plan.price_minor).await?;
        let subscription = Subscription::purchase(session.user_id, plan, Utc::now());
        self.subscriptions.write().await.push(subscription.clone());

        info!(
            user_id = %session.user_id,
            subscription_id = %subscription.id,
            meals = subscription.total_meals,
            "subscription purchased"
        );
        Ok(subscription)
    }

    pub async fn my_subscriptions(&self, session: &Session) -> CoreResult<Vec<Subscription>> {
        authorize(session, Permission::ViewOwnBalance, "view subscriptions")?;
        Ok(self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.user_id == session.user_id)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    pub async fn create_review(
        &self,
        session: &Session,
        dish_id: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> CoreResult<Review> {
        authorize(session, Permission::WriteReview, "write a review")?;

        // Unknown dish is rejected before the review is built.
        self.catalog.get_dish(dish_id).await?;
        let review = Review::new(dish_id, session.user_id, rating, comment)?;

        self.catalog
            .record_rating(dish_id, review.id, review.rating)
            .await?;
        self.reviews.write().await.push(review.clone());
        Ok(review)
    }

    // ------------------------------------------------------------------
    // Purchase requests
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_purchase_request(
        &self,
        session: &Session,
        product_name: &str,
        quantity: u32,
        unit: &str,
        reason: Option<String>,
        dish_id: Option<Uuid>,
    ) -> CoreResult<PurchaseRequest> {
        authorize(
            session,
            Permission::SubmitPurchaseRequest,
            "submit a purchase request",
        )?;
        self.procurement
            .create(session.user_id, product_name, quantity, unit, reason, dish_id)
            .await
    }

    /// Cooks see their own requests; admins see everything.
    pub async fn purchase_requests(&self, session: &Session) -> CoreResult<Vec<PurchaseRequest>> {
        authorize(
            session,
            Permission::ViewPurchaseRequests,
            "view purchase requests",
        )?;
        Ok(match session.role {
            Role::Admin => self.procurement.all_requests().await,
            _ => self.procurement.requests_for_cook(session.user_id).await,
        })
    }

    pub async fn approve_purchase_request(
        &self,
        session: &Session,
        request_id: Uuid,
        comment: Option<String>,
    ) -> CoreResult<PurchaseRequest> {
        authorize(
            session,
            Permission::DecidePurchaseRequests,
            "approve a purchase request",
        )?;
        self.procurement
            .decide(request_id, session.user_id, Decision::Approve, comment)
            .await
    }

    pub async fn reject_purchase_request(
        &self,
        session: &Session,
        request_id: Uuid,
        comment: Option<String>,
    ) -> CoreResult<PurchaseRequest> {
        authorize(
            session,
            Permission::DecidePurchaseRequests,
            "reject a purchase request",
        )?;
        self.procurement
            .decide(request_id, session.user_id, Decision::Reject, comment)
            .await
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub async fn financial_report(&self, session: &Session) -> CoreResult<FinancialReport> {
        authorize(session, Permission::ViewReports, "view financial reports")?;

        let orders = self.orders.all_orders().await;
        let dishes = self.catalog.dishes_snapshot().await;
        let balances = self.ledger.balances_snapshot().await;
        let requests = self.procurement.all_requests().await;
        Ok(financial_report(
            Utc::now(),
            &orders,
            &dishes,
            &balances,
            &requests,
        ))
    }

    pub async fn nutrition_report(&self, session: &Session) -> CoreResult<NutritionReport> {
        authorize(session, Permission::ViewReports, "view nutrition reports")?;

        let orders = self.orders.all_orders().await;
        let dishes = self.catalog.dishes_snapshot().await;
        let reviews = self.reviews.read().await.clone();
        Ok(nutrition_report(Utc::now(), &orders, &dishes, &reviews))
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Fire two logically identical order commands for the given student
    /// and report what happened. Exactly one is expected to commit.
    pub async fn probe_duplicate_order(
        &self,
        session: &Session,
        student_id: Uuid,
        dish_id: Uuid,
        meal_type: MealType,
        payment_type: PaymentType,
    ) -> CoreResult<DoubleOrderProbe> {
        authorize(session, Permission::RunDiagnostics, "run diagnostics")?;

        let attempts = (0..2).map(|_| {
            let orders = Arc::clone(&self.orders);
            async move {
                orders
                    .place_order(student_id, dish_id, meal_type, payment_type)
                    .await
            }
        });
        let results = join_all(attempts).await;

        let mut probe = DoubleOrderProbe {
            committed_orders: Vec::new(),
            duplicate_rejections: 0,
            other_failures: Vec::new(),
            exactly_once: false,
        };
        for result in results {
            match result {
                Ok(order) => probe.committed_orders.push(order.id),
                Err(CoreError::Domain(crate::error::DomainError::DuplicateRequest)) => {
                    probe.duplicate_rejections += 1;
                }
                Err(other) => probe.other_failures.push(other.to_string()),
            }
        }
        probe.exactly_once =
            probe.committed_orders.len() == 1 && probe.duplicate_rejections == 1;

        info!(
            committed = probe.committed_orders.len(),
            duplicates = probe.duplicate_rejections,
            exactly_once = probe.exactly_once,
            "duplicate-order probe finished"
        );
        Ok(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::domain::purchase_request::RequestStatus;
    use crate::error::{DomainError, ValidationError};

    struct Campus {
        core: CanteenCore,
        student: Session,
        cook: Session,
        admin: Session,
        soup_id: Uuid,
    }

    async fn campus() -> Campus {
        let core = CanteenCore::new(CoreConfig::default());

        let student_id = core
            .register_user(User::new(Role::Student, "Ivan Ivanov").with_class("10A"), 500)
            .await;
        let cook_id = core
            .register_user(User::new(Role::Cook, "Alexey Smirnov"), 0)
            .await;
        let admin_id = core
            .register_user(User::new(Role::Admin, "Anna Kozlova"), 0)
            .await;

        let soup_id = core
            .add_dish(
                Dish::new("Chicken soup", DishCategory::Lunch, 200).with_calories(200),
                1,
            )
            .await;

        Campus {
            student: core.session(student_id).await.unwrap(),
            cook: core.session(cook_id).await.unwrap(),
            admin: core.session(admin_id).await.unwrap(),
            core,
            soup_id,
        }
    }

    #[tokio::test]
    async fn test_order_lifecycle_end_to_end() {
        let campus = campus().await;
        let core = &campus.core;

        // Scenario: balance 500, price 200, stock 1.
        let order = core
            .create_order(
                &campus.student,
                campus.soup_id,
                MealType::Lunch,
                PaymentType::OneTime,
            )
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(core.my_balance(&campus.student).await.unwrap(), 300);

        let served = core
            .mark_order_served(&campus.cook, order.id)
            .await
            .unwrap();
        assert_eq!(served.status, OrderStatus::Served);
        assert_eq!(served.served_by, Some(campus.cook.user_id));

        let mine = core.my_orders(&campus.student).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(core.pending_orders(&campus.cook).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_calls_fail_loudly() {
        let campus = campus().await;
        let core = &campus.core;

        // A cook cannot place orders.
        let err = core
            .create_order(
                &campus.cook,
                campus.soup_id,
                MealType::Lunch,
                PaymentType::OneTime,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::AccessDenied {
                role: Role::Cook,
                ..
            }
        ));

        // A student cannot decide purchase requests or read reports.
        assert!(matches!(
            core.approve_purchase_request(&campus.student, Uuid::new_v4(), None)
                .await
                .unwrap_err(),
            CoreError::AccessDenied { .. }
        ));
        assert!(matches!(
            core.financial_report(&campus.student).await.unwrap_err(),
            CoreError::AccessDenied { .. }
        ));

        // An admin cannot serve orders.
        assert!(matches!(
            core.mark_order_served(&campus.admin, Uuid::new_v4())
                .await
                .unwrap_err(),
            CoreError::AccessDenied { .. }
        ));

        // Nothing was silently applied.
        assert_eq!(core.my_balance(&campus.student).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_purchase_request_flow_restocks_dish() {
        let campus = campus().await;
        let core = &campus.core;

        let request = core
            .create_purchase_request(
                &campus.cook,
                "Chicken soup base",
                20,
                "portions",
                Some("running low".into()),
                Some(campus.soup_id),
            )
            .await
            .unwrap();

        let approved = core
            .approve_purchase_request(&campus.admin, request.id, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);

        // Approval restocked the linked dish.
        let entry = core
            .dish(&campus.cook, campus.soup_id)
            .await
            .unwrap();
        assert_eq!(entry.name, "Chicken soup");
        let menu = core.menu(&campus.student, None).await.unwrap();
        assert_eq!(menu[0].quantity, 21);

        // Second decision loses.
        let err = core
            .reject_purchase_request(&campus.admin, request.id, Some("x".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Domain(DomainError::AlreadyDecided(RequestStatus::Approved))
        ));

        // Cook sees own requests, admin sees all.
        assert_eq!(core.purchase_requests(&campus.cook).await.unwrap().len(), 1);
        assert_eq!(core.purchase_requests(&campus.admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_feeds_rating_and_reports() {
        let campus = campus().await;
        let core = &campus.core;

        core.create_order(
            &campus.student,
            campus.soup_id,
            MealType::Lunch,
            PaymentType::OneTime,
        )
        .await
        .unwrap();
        core.create_review(&campus.student, campus.soup_id, 5, Some("tasty".into()))
            .await
            .unwrap();

        let err = core
            .create_review(&campus.student, campus.soup_id, 6, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::RatingOutOfRange(6))
        ));

        let dish = core.dish(&campus.student, campus.soup_id).await.unwrap();
        assert_eq!(dish.rating.average(), Some(5.0));

        let nutrition = core.nutrition_report(&campus.admin).await.unwrap();
        assert_eq!(nutrition.review_count, 1);
        assert_eq!(nutrition.top_dishes[0].order_count, 1);
    }

    #[tokio::test]
    async fn test_financial_report_reflects_served_orders() {
        let campus = campus().await;
        let core = &campus.core;

        let order = core
            .create_order(
                &campus.student,
                campus.soup_id,
                MealType::Lunch,
                PaymentType::OneTime,
            )
            .await
            .unwrap();
        core.mark_order_served(&campus.cook, order.id).await.unwrap();

        let report = core.financial_report(&campus.admin).await.unwrap();
        assert_eq!(report.total_revenue_minor, 200);
        assert_eq!(report.orders.served, 1);
        assert_eq!(report.unique_customers, 1);
        // Student balance 300 after the order; staff accounts are empty.
        assert_eq!(report.total_balance_held_minor, 300);
    }

    #[tokio::test]
    async fn test_subscription_debits_once() {
        let campus = campus().await;
        let core = &campus.core;

        let plan = SubscriptionPlan {
            total_meals: 10,
            price_minor: 400,
            duration_days: 30,
        };
        let subscription = core
            .create_subscription(&campus.student, plan)
            .await
            .unwrap();
        assert_eq!(subscription.meals_left, 10);
        assert_eq!(core.my_balance(&campus.student).await.unwrap(), 100);

        // Not enough left for a second plan; no record appears.
        let err = core
            .create_subscription(&campus.student, plan)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Domain(DomainError::InsufficientFunds { .. })
        ));
        assert_eq!(
            core.my_subscriptions(&campus.student).await.unwrap().len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_order_probe_is_exactly_once() {
        let campus = campus().await;
        let core = &campus.core;

        let probe = core
            .probe_duplicate_order(
                &campus.admin,
                campus.student.user_id,
                campus.soup_id,
                MealType::Lunch,
                PaymentType::OneTime,
            )
            .await
            .unwrap();

        assert!(probe.exactly_once);
        assert_eq!(probe.committed_orders.len(), 1);
        assert_eq!(probe.duplicate_rejections, 1);
        assert!(probe.other_failures.is_empty());
        // One debit, one reservation.
        assert_eq!(core.my_balance(&campus.student).await.unwrap(), 300);
        assert_eq!(core.menu(&campus.student, None).await.unwrap()[0].quantity, 0);
    }

    #[tokio::test]
    async fn test_probe_requires_diagnostics_permission() {
        let campus = campus().await;
        let err = campus
            .core
            .probe_duplicate_order(
                &campus.student,
                campus.student.user_id,
                campus.soup_id,
                MealType::Lunch,
                PaymentType::OneTime,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AccessDenied { .. }));
    }
}
