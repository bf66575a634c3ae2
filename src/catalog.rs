use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::domain::dish::{Dish, DishCategory};
use crate::error::{CoreError, CoreResult, DomainError, ValidationError};
use crate::history::Journal;

// ============================================================================
// Catalog - Per-Dish Stock
// ============================================================================
//
// Static dish data and stock live apart: dish records sit in a read-mostly
// map, stock counts each get their own mutex so a reservation on one dish
// never blocks another. Same-dish operations are serialized; stock is u32 so
// it cannot go negative and reserve fails on insufficient quantity.
//
// ============================================================================

/// Where a restock came from, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id")]
pub enum RestockSource {
    Manual,
    PurchaseRequest(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CatalogEvent {
    Reserved {
        dish_id: Uuid,
        quantity: u32,
        remaining: u32,
    },
    Restocked {
        dish_id: Uuid,
        quantity: u32,
        new_quantity: u32,
        source: RestockSource,
    },
    RatingRecorded {
        dish_id: Uuid,
        review_id: Uuid,
        rating: u8,
    },
}

impl CatalogEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::Reserved { .. } => "StockReserved",
            CatalogEvent::Restocked { .. } => "StockRestocked",
            CatalogEvent::RatingRecorded { .. } => "RatingRecorded",
        }
    }
}

/// A dish plus its stock level at snapshot time, as shown on the menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    pub dish: Dish,
    pub quantity: u32,
}

pub struct Catalog {
    dishes: RwLock<HashMap<Uuid, Dish>>,
    stock: RwLock<HashMap<Uuid, Arc<Mutex<u32>>>>,
    journal: Arc<Journal>,
    lock_timeout: Duration,
}

impl Catalog {
    pub fn new(journal: Arc<Journal>, config: &CoreConfig) -> Self {
        Self {
            dishes: RwLock::new(HashMap::new()),
            stock: RwLock::new(HashMap::new()),
            journal,
            lock_timeout: config.lock_timeout,
        }
    }

    pub async fn add_dish(&self, dish: Dish, initial_stock: u32) {
        let dish_id = dish.id;
        self.dishes.write().await.insert(dish_id, dish);
        self.stock
            .write()
            .await
            .insert(dish_id, Arc::new(Mutex::new(initial_stock)));
    }

    pub async fn get_dish(&self, dish_id: Uuid) -> CoreResult<Dish> {
        self.dishes
            .read()
            .await
            .get(&dish_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "dish",
                id: dish_id,
            })
    }

    pub async fn dishes_snapshot(&self) -> Vec<Dish> {
        self.dishes.read().await.values().cloned().collect()
    }

    /// Available dishes with their current stock, optionally filtered by
    /// category. Sorted by name for stable output.
    pub async fn menu(&self, category: Option<DishCategory>) -> Vec<MenuEntry> {
        let dishes: Vec<Dish> = self
            .dishes
            .read()
            .await
            .values()
            .filter(|d| d.is_available)
            .filter(|d| category.map_or(true, |c| d.category == c))
            .cloned()
            .collect();

        let mut entries = Vec::with_capacity(dishes.len());
        for dish in dishes {
            let quantity = match self.stock_handle(dish.id).await {
                Ok(stock) => *stock.lock().await,
                Err(_) => 0,
            };
            entries.push(MenuEntry { dish, quantity });
        }
        entries.sort_by(|a, b| a.dish.name.cmp(&b.dish.name));
        entries
    }

    async fn stock_handle(&self, dish_id: Uuid) -> CoreResult<Arc<Mutex<u32>>> {
        self.stock
            .read()
            .await
            .get(&dish_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "dish",
                id: dish_id,
            })
    }

    /// Bounded acquisition of the per-dish stock lock, shared with the Order
    /// Engine's composite commit.
    pub(crate) async fn lock_stock(&self, dish_id: Uuid) -> CoreResult<OwnedMutexGuard<u32>> {
        let stock = self.stock_handle(dish_id).await?;
        timeout(self.lock_timeout, stock.lock_owned())
            .await
            .map_err(|_| CoreError::Conflict(format!("timed out waiting for stock lock {dish_id}")))
    }

    /// Applies a reservation to already-locked stock.
    pub(crate) fn reserve_locked(stock: &mut u32, quantity: u32) -> Result<u32, DomainError> {
        let remaining = stock.checked_sub(quantity).ok_or(DomainError::OutOfStock)?;
        *stock = remaining;
        Ok(remaining)
    }

    pub async fn reserve(&self, dish_id: Uuid, quantity: u32) -> CoreResult<u32> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }

        let mut stock = self.lock_stock(dish_id).await?;
        let remaining = Self::reserve_locked(&mut stock, quantity)?;

        self.journal
            .commit(
                Uuid::new_v4(),
                None,
                vec![CatalogEvent::Reserved {
                    dish_id,
                    quantity,
                    remaining,
                }
                .into()],
            )
            .await;
        drop(stock);

        info!(%dish_id, quantity, remaining, "stock reserved");
        Ok(remaining)
    }

    pub async fn restock(
        &self,
        dish_id: Uuid,
        quantity: u32,
        source: RestockSource,
    ) -> CoreResult<u32> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }
        // Reject unknown dishes before touching stock.
        self.get_dish(dish_id).await?;

        let mut stock = self.lock_stock(dish_id).await?;
        let new_quantity = stock
            .checked_add(quantity)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("stock overflow")))?;
        *stock = new_quantity;

        self.journal
            .commit(
                Uuid::new_v4(),
                None,
                vec![CatalogEvent::Restocked {
                    dish_id,
                    quantity,
                    new_quantity,
                    source,
                }
                .into()],
            )
            .await;
        drop(stock);

        info!(%dish_id, quantity, new_quantity, ?source, "stock replenished");
        Ok(new_quantity)
    }

    pub async fn stock_of(&self, dish_id: Uuid) -> CoreResult<u32> {
        let stock = self.stock_handle(dish_id).await?;
        let quantity = *stock.lock().await;
        Ok(quantity)
    }

    /// Folds a review into the dish's rating aggregate.
    pub async fn record_rating(
        &self,
        dish_id: Uuid,
        review_id: Uuid,
        rating: u8,
    ) -> CoreResult<()> {
        {
            let mut dishes = self.dishes.write().await;
            let dish = dishes.get_mut(&dish_id).ok_or(CoreError::NotFound {
                entity: "dish",
                id: dish_id,
            })?;
            dish.rating.record(rating);
        }

        self.journal
            .commit(
                Uuid::new_v4(),
                None,
                vec![CatalogEvent::RatingRecorded {
                    dish_id,
                    review_id,
                    rating,
                }
                .into()],
            )
            .await;
        Ok(())
    }
}
