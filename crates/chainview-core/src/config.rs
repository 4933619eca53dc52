//! Configuration for the session registry.

use std::time::Duration;

use crate::channel::EXPIRE_COUNT;

/// Configuration for [`SessionRegistry`](crate::registry::SessionRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Interval for the built-in GC ticker. `None` (the default) disables
    /// it; garbage collection then runs only on externally injected
    /// triggers.
    pub gc_interval: Option<Duration>,
    /// Default bounded wait served to long-poll clients. Exists so a poll
    /// is not held open indefinitely and channel liveness is periodically
    /// re-evaluated; it does not cancel pending notifications.
    pub poll_timeout: Duration,
    /// Unanswered liveness checks after which a poll channel expires.
    pub poll_expire_count: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            gc_interval: None,
            poll_timeout: Duration::from_secs(30),
            poll_expire_count: EXPIRE_COUNT,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_default() {
        let cfg = RegistryConfig::default();
        assert_eq!(cfg.gc_interval, None);
        assert_eq!(cfg.poll_timeout, Duration::from_secs(30));
        assert_eq!(cfg.poll_expire_count, 5);
    }
}
