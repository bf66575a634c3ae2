use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, DomainError, ValidationError};
use crate::history::Journal;

// ============================================================================
// Ledger - Per-User Balance
// ============================================================================
//
// One mutex per account: operations on the same user are serialized,
// different users never contend. Lock acquisition is bounded by the
// configured timeout; a timeout aborts the command as a retryable conflict
// before any state is touched. Balances are u64 minor currency units, so
// balance >= 0 holds by construction and debits fail on checked_sub.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerEvent {
    Credited {
        user_id: Uuid,
        amount: u64,
        balance_after: u64,
    },
    Debited {
        user_id: Uuid,
        amount: u64,
        balance_after: u64,
    },
}

impl LedgerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Credited { .. } => "BalanceCredited",
            LedgerEvent::Debited { .. } => "BalanceDebited",
        }
    }
}

#[derive(Debug)]
pub(crate) struct Account {
    pub(crate) balance: u64,
}

pub struct Ledger {
    accounts: RwLock<HashMap<Uuid, Arc<Mutex<Account>>>>,
    journal: Arc<Journal>,
    lock_timeout: Duration,
}

impl Ledger {
    pub fn new(journal: Arc<Journal>, config: &CoreConfig) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            journal,
            lock_timeout: config.lock_timeout,
        }
    }

    /// Idempotent: re-opening an existing account keeps its balance.
    pub async fn open_account(&self, user_id: Uuid, initial_balance: u64) {
        self.accounts
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Account { balance: initial_balance })));
    }

    async fn account(&self, user_id: Uuid) -> CoreResult<Arc<Mutex<Account>>> {
        self.accounts
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "account",
                id: user_id,
            })
    }

    /// Bounded acquisition of the per-user lock. Used directly by the Order
    /// Engine so the debit can commit under the same guard as the stock
    /// reservation.
    pub(crate) async fn lock_account(
        &self,
        user_id: Uuid,
    ) -> CoreResult<OwnedMutexGuard<Account>> {
        let account = self.account(user_id).await?;
        timeout(self.lock_timeout, account.lock_owned())
            .await
            .map_err(|_| {
                CoreError::Conflict(format!("timed out waiting for account lock {user_id}"))
            })
    }

    /// Applies a debit to an already-locked account. Checked subtraction is
    /// what keeps the non-negative balance invariant.
    pub(crate) fn debit_locked(
        account: &mut Account,
        amount: u64,
    ) -> Result<u64, DomainError> {
        let balance_after = account
            .balance
            .checked_sub(amount)
            .ok_or(DomainError::InsufficientFunds {
                balance: account.balance,
                required: amount,
            })?;
        account.balance = balance_after;
        Ok(balance_after)
    }

    pub async fn credit(&self, user_id: Uuid, amount: u64) -> CoreResult<u64> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }

        let mut account = self.lock_account(user_id).await?;
        let balance_after = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("balance overflow")))?;
        account.balance = balance_after;

        self.journal
            .commit(
                Uuid::new_v4(),
                Some(user_id),
                vec![LedgerEvent::Credited {
                    user_id,
                    amount,
                    balance_after,
                }
                .into()],
            )
            .await;
        drop(account);

        info!(%user_id, amount, balance_after, "balance credited");
        Ok(balance_after)
    }

    pub async fn debit(&self, user_id: Uuid, amount: u64) -> CoreResult<u64> {
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }

        let mut account = self.lock_account(user_id).await?;
        let balance_after = Self::debit_locked(&mut account, amount)?;

        self.journal
            .commit(
                Uuid::new_v4(),
                Some(user_id),
                vec![LedgerEvent::Debited {
                    user_id,
                    amount,
                    balance_after,
                }
                .into()],
            )
            .await;
        drop(account);

        info!(%user_id, amount, balance_after, "balance debited");
        Ok(balance_after)
    }

    pub async fn balance(&self, user_id: Uuid) -> CoreResult<u64> {
        let account = self.account(user_id).await?;
        let balance = account.lock().await.balance;
        Ok(balance)
    }

    /// Point-in-time view of every balance, for the financial projection.
    pub async fn balances_snapshot(&self) -> Vec<(Uuid, u64)> {
        let accounts: Vec<(Uuid, Arc<Mutex<Account>>)> = self
            .accounts
            .read()
            .await
            .iter()
            .map(|(id, account)| (*id, Arc::clone(account)))
            .collect();

        let mut balances = Vec::with_capacity(accounts.len());
        for (id, account) in accounts {
            balances.push((id, account.lock().await.balance));
        }
        balances
    }
}
