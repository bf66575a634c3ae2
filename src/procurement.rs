use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::catalog::{Catalog, RestockSource};
use crate::domain::purchase_request::{Decision, PurchaseRequest, RequestStatus};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::history::Journal;

// ============================================================================
// Purchase-Request Workflow
// ============================================================================
//
// Cook-initiated procurement requests, decided exactly once by an admin.
// decide() is optimistic: the expected-Pending status is verified at the
// commit point under the record lock, so a losing concurrent decider gets
// AlreadyDecided. Approval of a request that references a catalog dish
// restocks it before the status flips; if the restock fails the request
// stays Pending (all-or-nothing).
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProcurementEvent {
    Submitted {
        request_id: Uuid,
        cook_id: Uuid,
        product_name: String,
        quantity: u32,
    },
    Decided {
        request_id: Uuid,
        admin_id: Uuid,
        status: RequestStatus,
        /// Set when approval triggered an automatic restock.
        restocked_dish: Option<Uuid>,
    },
}

impl ProcurementEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProcurementEvent::Submitted { .. } => "PurchaseRequestSubmitted",
            ProcurementEvent::Decided { .. } => "PurchaseRequestDecided",
        }
    }
}

/// Seam between approval and the stock side effect, so the workflow can be
/// tested without a catalog and a manual-fulfillment policy could be swapped
/// in.
#[async_trait]
pub trait RestockFulfillment: Send + Sync {
    async fn fulfill(&self, dish_id: Uuid, quantity: u32, request_id: Uuid) -> CoreResult<u32>;
}

#[async_trait]
impl RestockFulfillment for Catalog {
    async fn fulfill(&self, dish_id: Uuid, quantity: u32, request_id: Uuid) -> CoreResult<u32> {
        self.restock(dish_id, quantity, RestockSource::PurchaseRequest(request_id))
            .await
    }
}

pub struct ProcurementWorkflow {
    requests: RwLock<HashMap<Uuid, Arc<Mutex<PurchaseRequest>>>>,
    fulfillment: Arc<dyn RestockFulfillment>,
    journal: Arc<Journal>,
}

impl ProcurementWorkflow {
    pub fn new(fulfillment: Arc<dyn RestockFulfillment>, journal: Arc<Journal>) -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            fulfillment,
            journal,
        }
    }

    pub async fn create(
        &self,
        cook_id: Uuid,
        product_name: &str,
        quantity: u32,
        unit: &str,
        reason: Option<String>,
        dish_id: Option<Uuid>,
    ) -> CoreResult<PurchaseRequest> {
        let product_name = product_name.trim();
        if product_name.is_empty() {
            return Err(ValidationError::EmptyProductName.into());
        }
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(ValidationError::EmptyUnit.into());
        }

        let request = PurchaseRequest::new(cook_id, product_name, quantity, unit, reason, dish_id);

        self.journal
            .commit(
                request.id,
                Some(cook_id),
                vec![ProcurementEvent::Submitted {
                    request_id: request.id,
                    cook_id,
                    product_name: request.product_name.clone(),
                    quantity,
                }
                .into()],
            )
            .await;

        self.requests
            .write()
            .await
            .insert(request.id, Arc::new(Mutex::new(request.clone())));

        info!(request_id = %request.id, %cook_id, product = %request.product_name, "purchase request submitted");
        Ok(request)
    }

    /// Decide a pending request, exactly once. Approval restocks the linked
    /// dish first; the status flips only after every side effect committed.
    pub async fn decide(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> CoreResult<PurchaseRequest> {
        let handle = self
            .requests
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "purchase request",
                id: request_id,
            })?;

        let mut request = handle.lock().await;

        // Early exit keeps the restock from running for a lost race; the
        // authoritative check is inside decide() at the commit point.
        if request.status != RequestStatus::Pending {
            return Err(crate::error::DomainError::AlreadyDecided(request.status).into());
        }

        let mut restocked_dish = None;
        if decision == Decision::Approve {
            if let Some(dish_id) = request.dish_id {
                self.fulfillment
                    .fulfill(dish_id, request.quantity, request.id)
                    .await?;
                restocked_dish = Some(dish_id);
            }
        }

        let status = request.decide(admin_id, decision, comment, Utc::now())?;

        self.journal
            .commit(
                request.id,
                Some(admin_id),
                vec![ProcurementEvent::Decided {
                    request_id,
                    admin_id,
                    status,
                    restocked_dish,
                }
                .into()],
            )
            .await;

        info!(%request_id, %admin_id, ?status, "purchase request decided");
        Ok(request.clone())
    }

    pub async fn request(&self, request_id: Uuid) -> CoreResult<PurchaseRequest> {
        let handle = self
            .requests
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "purchase request",
                id: request_id,
            })?;
        let request = handle.lock().await.clone();
        Ok(request)
    }

    async fn collect<F>(&self, mut keep: F) -> Vec<PurchaseRequest>
    where
        F: FnMut(&PurchaseRequest) -> bool,
    {
        let handles: Vec<Arc<Mutex<PurchaseRequest>>> =
            self.requests.read().await.values().cloned().collect();

        let mut requests = Vec::new();
        for handle in handles {
            let request = handle.lock().await.clone();
            if keep(&request) {
                requests.push(request);
            }
        }
        requests
    }

    /// Pending first, then newest first within each status group.
    fn sort_for_review(requests: &mut [PurchaseRequest]) {
        requests.sort_by(|a, b| {
            let rank = |s: RequestStatus| match s {
                RequestStatus::Pending => 0,
                RequestStatus::Approved => 1,
                RequestStatus::Rejected => 2,
            };
            rank(a.status)
                .cmp(&rank(b.status))
                .then(b.created_at.cmp(&a.created_at))
        });
    }

    pub async fn requests_for_cook(&self, cook_id: Uuid) -> Vec<PurchaseRequest> {
        let mut requests = self.collect(|r| r.cook_id == cook_id).await;
        Self::sort_for_review(&mut requests);
        requests
    }

    pub async fn all_requests(&self) -> Vec<PurchaseRequest> {
        let mut requests = self.collect(|_| true).await;
        Self::sort_for_review(&mut requests);
        requests
    }
}
