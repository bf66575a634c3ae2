use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::CatalogEvent;
use crate::ledger::LedgerEvent;
use crate::orders::OrderEvent;
use crate::procurement::ProcurementEvent;

// ============================================================================
// Journal - Committed History
// ============================================================================
//
// Append-only record of every committed mutation. A multi-effect command
// (order placement, approval with restock) commits its events as one batch
// under the write lock, so a snapshot reader may be stale but never observes
// a torn batch. Read-model projections recompute from snapshots.
//
// ============================================================================

/// Union of all subsystem events that reach the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CoreEvent {
    Ledger(LedgerEvent),
    Catalog(CatalogEvent),
    Order(OrderEvent),
    Procurement(ProcurementEvent),
}

impl CoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CoreEvent::Ledger(e) => e.event_type(),
            CoreEvent::Catalog(e) => e.event_type(),
            CoreEvent::Order(e) => e.event_type(),
            CoreEvent::Procurement(e) => e.event_type(),
        }
    }
}

impl From<LedgerEvent> for CoreEvent {
    fn from(event: LedgerEvent) -> Self {
        CoreEvent::Ledger(event)
    }
}

impl From<CatalogEvent> for CoreEvent {
    fn from(event: CatalogEvent) -> Self {
        CoreEvent::Catalog(event)
    }
}

impl From<OrderEvent> for CoreEvent {
    fn from(event: OrderEvent) -> Self {
        CoreEvent::Order(event)
    }
}

impl From<ProcurementEvent> for CoreEvent {
    fn from(event: ProcurementEvent) -> Self {
        CoreEvent::Procurement(event)
    }
}

/// Wraps a committed event with identity, ordering, and actor metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub sequence_number: i64,
    pub event_type: String,
    pub event_data: E,
    /// Groups the events committed by one command.
    pub correlation_id: Uuid,
    /// Who triggered the command, when known.
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

struct JournalInner {
    next_sequence: i64,
    events: Vec<EventEnvelope<CoreEvent>>,
}

pub struct Journal {
    inner: RwLock<JournalInner>,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(JournalInner {
                next_sequence: 1,
                events: Vec::new(),
            }),
        }
    }

    /// Append a batch of events atomically. Returns the sequence number of
    /// the last event committed.
    pub async fn commit(
        &self,
        correlation_id: Uuid,
        actor: Option<Uuid>,
        events: Vec<CoreEvent>,
    ) -> i64 {
        let mut inner = self.inner.write().await;
        let timestamp = Utc::now();

        for event in events {
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            inner.events.push(EventEnvelope {
                event_id: Uuid::new_v4(),
                sequence_number: sequence,
                event_type: event.event_type().to_string(),
                event_data: event,
                correlation_id,
                user_id: actor,
                timestamp,
            });
        }

        inner.next_sequence - 1
    }

    /// Clone the committed history. Possibly stale, never torn.
    pub async fn snapshot(&self) -> Vec<EventEnvelope<CoreEvent>> {
        self.inner.read().await.events.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerEvent;

    fn credited(user_id: Uuid, amount: u64) -> CoreEvent {
        LedgerEvent::Credited {
            user_id,
            amount,
            balance_after: amount,
        }
        .into()
    }

    #[tokio::test]
    async fn test_batch_commit_is_sequential() {
        let journal = Journal::new();
        let user = Uuid::new_v4();
        let correlation = Uuid::new_v4();

        let last = journal
            .commit(
                correlation,
                Some(user),
                vec![credited(user, 100), credited(user, 200)],
            )
            .await;
        assert_eq!(last, 2);

        let events = journal.snapshot().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence_number, 1);
        assert_eq!(events[1].sequence_number, 2);
        assert!(events.iter().all(|e| e.correlation_id == correlation));
        assert!(events.iter().all(|e| e.user_id == Some(user)));
    }

    #[tokio::test]
    async fn test_sequences_continue_across_commits() {
        let journal = Journal::new();
        let user = Uuid::new_v4();

        journal
            .commit(Uuid::new_v4(), None, vec![credited(user, 1)])
            .await;
        let last = journal
            .commit(Uuid::new_v4(), None, vec![credited(user, 2)])
            .await;

        assert_eq!(last, 2);
        assert_eq!(journal.len().await, 2);
    }

    #[tokio::test]
    async fn test_envelope_serialization() {
        let journal = Journal::new();
        let user = Uuid::new_v4();
        journal
            .commit(Uuid::new_v4(), Some(user), vec![credited(user, 500)])
            .await;

        let events = journal.snapshot().await;
        let json = serde_json::to_string(&events[0]).unwrap();
        let back: EventEnvelope<CoreEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, "BalanceCredited");
        assert_eq!(back.sequence_number, 1);
    }
}
