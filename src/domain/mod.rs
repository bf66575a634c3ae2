// ============================================================================
// Domain Layer - Records and Transition Rules
// ============================================================================
//
// Plain domain records plus the pure transition methods that guard their
// state machines. Each record owns its own validity rules; the services in
// ledger/catalog/orders/procurement own locking and commit.
//
// ============================================================================

pub mod dish;
pub mod order;
pub mod purchase_request;
pub mod review;
pub mod subscription;
pub mod user;

pub use dish::{Dish, DishCategory, RatingAggregate};
pub use order::{MealType, Order, OrderStatus, PaymentType};
pub use purchase_request::{Decision, PurchaseRequest, RequestStatus};
pub use review::Review;
pub use subscription::{Subscription, SubscriptionPlan};
pub use user::{Role, User};
