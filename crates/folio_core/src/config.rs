//! Runtime configuration for the synchronization engine.
//!
//! # Invariants
//! - `flush_period` is never zero; setters clamp it to one millisecond.

use std::time::Duration;

/// Debounce period used when no override is configured.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(3);

const MIN_FLUSH_PERIOD: Duration = Duration::from_millis(1);

/// Tunables for [`crate::sync::SyncEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay between the last tracked mutation and the flush it triggers.
    /// Also the retry interval after a failed commit.
    pub flush_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_period: DEFAULT_FLUSH_PERIOD,
        }
    }
}

impl SyncConfig {
    pub fn with_flush_period(mut self, flush_period: Duration) -> Self {
        self.flush_period = flush_period.max(MIN_FLUSH_PERIOD);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncConfig, DEFAULT_FLUSH_PERIOD};
    use std::time::Duration;

    #[test]
    fn default_period_is_three_seconds() {
        assert_eq!(SyncConfig::default().flush_period, DEFAULT_FLUSH_PERIOD);
        assert_eq!(DEFAULT_FLUSH_PERIOD, Duration::from_secs(3));
    }

    #[test]
    fn zero_period_is_clamped() {
        let config = SyncConfig::default().with_flush_period(Duration::ZERO);
        assert_eq!(config.flush_period, Duration::from_millis(1));
    }
}
