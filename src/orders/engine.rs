use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogEvent};
use crate::config::CoreConfig;
use crate::domain::order::{MealType, Order, PaymentType};
use crate::error::{CoreError, CoreResult, DomainError};
use crate::history::Journal;
use crate::ledger::{Ledger, LedgerEvent};

use super::dedup::DedupWindow;

// ============================================================================
// Order Engine - Atomic Placement and Lifecycle
// ============================================================================
//
// place_order is the composite transaction: it acquires the dish stock lock
// and then the user account lock (fixed class order, both bounded), validates
// both sub-steps, applies both decrements, and journals the whole effect as
// one batch. Either failure aborts with zero partial effect. Lock order is
// always stock before account, so the two lock classes cannot form a cycle.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OrderEvent {
    Placed {
        order_id: Uuid,
        user_id: Uuid,
        dish_id: Uuid,
        price_charged: u64,
    },
    Served {
        order_id: Uuid,
        cook_id: Uuid,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed { .. } => "OrderPlaced",
            OrderEvent::Served { .. } => "OrderServed",
        }
    }
}

pub struct OrderEngine {
    catalog: Arc<Catalog>,
    ledger: Arc<Ledger>,
    journal: Arc<Journal>,
    orders: RwLock<HashMap<Uuid, Arc<Mutex<Order>>>>,
    dedup: DedupWindow,
    lock_timeout: Duration,
}

impl OrderEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        ledger: Arc<Ledger>,
        journal: Arc<Journal>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            journal,
            orders: RwLock::new(HashMap::new()),
            dedup: DedupWindow::new(config.dedup_window),
            lock_timeout: config.lock_timeout,
        }
    }

    /// Place an order: reserve one unit of stock and debit the dish price,
    /// all-or-nothing. Identical submissions inside the dedup window are
    /// rejected with `DuplicateRequest`.
    pub async fn place_order(
        &self,
        user_id: Uuid,
        dish_id: Uuid,
        meal_type: MealType,
        payment_type: PaymentType,
    ) -> CoreResult<Order> {
        self.dedup.claim(user_id, dish_id).await?;

        let result = self
            .place_order_committed(user_id, dish_id, meal_type, payment_type)
            .await;
        if let Err(ref err) = result {
            // A failed command must not poison a genuine retry.
            self.dedup.release(user_id, dish_id).await;
            warn!(%user_id, %dish_id, error = %err, "order placement aborted");
        }
        result
    }

    async fn place_order_committed(
        &self,
        user_id: Uuid,
        dish_id: Uuid,
        meal_type: MealType,
        payment_type: PaymentType,
    ) -> CoreResult<Order> {
        let dish = self.catalog.get_dish(dish_id).await?;
        if !dish.is_available {
            return Err(DomainError::DishNotAvailable.into());
        }
        // Snapshot the price now; later menu edits never affect this order.
        let price = dish.price_minor;

        // Fixed acquisition order: stock, then account.
        let mut stock = self.catalog.lock_stock(dish_id).await?;
        let mut account = self.ledger.lock_account(user_id).await?;

        // Validate the stock side before applying the debit, so neither
        // sub-step can leave a partial effect behind.
        if *stock == 0 {
            return Err(DomainError::OutOfStock.into());
        }
        let balance_after = Ledger::debit_locked(&mut account, price)?;
        let remaining = Catalog::reserve_locked(&mut stock, 1)?;

        let order = Order::new(user_id, dish_id, dish.name, meal_type, payment_type, price);

        self.journal
            .commit(
                order.id,
                Some(user_id),
                vec![
                    CatalogEvent::Reserved {
                        dish_id,
                        quantity: 1,
                        remaining,
                    }
                    .into(),
                    LedgerEvent::Debited {
                        user_id,
                        amount: price,
                        balance_after,
                    }
                    .into(),
                    OrderEvent::Placed {
                        order_id: order.id,
                        user_id,
                        dish_id,
                        price_charged: price,
                    }
                    .into(),
                ],
            )
            .await;

        self.orders
            .write()
            .await
            .insert(order.id, Arc::new(Mutex::new(order.clone())));
        drop(account);
        drop(stock);

        info!(
            order_id = %order.id,
            %user_id,
            %dish_id,
            price_charged = price,
            "order placed"
        );
        Ok(order)
    }

    /// Pending -> Served by a cook. `InvalidTransition` if already served.
    pub async fn mark_served(&self, order_id: Uuid, cook_id: Uuid) -> CoreResult<Order> {
        let handle = self
            .orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "order",
                id: order_id,
            })?;

        let mut order = timeout(self.lock_timeout, handle.lock_owned())
            .await
            .map_err(|_| {
                CoreError::Conflict(format!("timed out waiting for order lock {order_id}"))
            })?;

        order.mark_served(cook_id, Utc::now())?;

        self.journal
            .commit(
                order.id,
                Some(cook_id),
                vec![OrderEvent::Served { order_id, cook_id }.into()],
            )
            .await;

        info!(%order_id, %cook_id, "order served");
        Ok(order.clone())
    }

    pub async fn order(&self, order_id: Uuid) -> CoreResult<Order> {
        let handle = self
            .orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "order",
                id: order_id,
            })?;
        let order = handle.lock().await.clone();
        Ok(order)
    }

    async fn collect<F>(&self, mut keep: F) -> Vec<Order>
    where
        F: FnMut(&Order) -> bool,
    {
        let handles: Vec<Arc<Mutex<Order>>> =
            self.orders.read().await.values().cloned().collect();

        let mut orders = Vec::new();
        for handle in handles {
            let order = handle.lock().await.clone();
            if keep(&order) {
                orders.push(order);
            }
        }
        orders
    }

    /// A user's own orders, newest first.
    pub async fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        let mut orders = self.collect(|o| o.user_id == user_id).await;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Every order, newest first.
    pub async fn all_orders(&self) -> Vec<Order> {
        let mut orders = self.collect(|_| true).await;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// The cook's queue: pending orders, oldest first.
    pub async fn pending_orders(&self) -> Vec<Order> {
        use crate::domain::order::OrderStatus;
        let mut orders = self.collect(|o| o.status == OrderStatus::Pending).await;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders
    }
}
