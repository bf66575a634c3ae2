use std::{env, time::Duration};

use tracing::warn;

// ============================================================================
// Core Configuration
// ============================================================================

/// Tuning knobs for the transaction core. Both windows are deliberately
/// short: the dedup window only needs to cover client retries, and no lock
/// holder ever blocks on I/O.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// How long an order signature `(user, dish)` is remembered for
    /// duplicate-submission rejection.
    pub dedup_window: Duration,
    /// Upper bound on waiting for a per-user or per-dish lock before the
    /// command aborts with a retryable conflict.
    pub lock_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(3),
            lock_timeout: Duration::from_secs(2),
        }
    }
}

impl CoreConfig {
    /// Load from environment, falling back to defaults on missing or
    /// malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dedup_window: load_millis("CANTEEN_DEDUP_WINDOW_MS", defaults.dedup_window),
            lock_timeout: load_millis("CANTEEN_LOCK_TIMEOUT_MS", defaults.lock_timeout),
        }
    }
}

fn load_millis(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(e) => {
                warn!("Invalid {key} value {raw:?}: {e}, using default");
                default
            }
        },
        Err(_) => default,
    }
}
