use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DomainError;

// ============================================================================
// Deduplication Window
// ============================================================================
//
// Retains recent order signatures `(user, dish)` so a retried client request
// is rejected instead of reprocessed. Check-and-claim happens under one lock,
// so two near-simultaneous identical commands cannot both pass. A claim is
// released when the command fails, letting a genuine retry after a business
// failure go through.
//
// ============================================================================

type Signature = (Uuid, Uuid);

pub struct DedupWindow {
    window: Duration,
    entries: Mutex<HashMap<Signature, Instant>>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically claim a signature. `DuplicateRequest` if an unexpired
    /// claim for the same signature exists. Expired entries are pruned on
    /// the way in.
    pub async fn claim(&self, user_id: Uuid, dish_id: Uuid) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, claimed_at| now.duration_since(*claimed_at) < self.window);

        match entries.get(&(user_id, dish_id)) {
            Some(_) => Err(DomainError::DuplicateRequest),
            None => {
                entries.insert((user_id, dish_id), now);
                Ok(())
            }
        }
    }

    /// Drop a claim so the command can be retried after a failure.
    pub async fn release(&self, user_id: Uuid, dish_id: Uuid) {
        self.entries.lock().await.remove(&(user_id, dish_id));
    }

    #[cfg(test)]
    async fn live_entries(&self) -> usize {
        self.entries.lock().await.len()
    }
}
