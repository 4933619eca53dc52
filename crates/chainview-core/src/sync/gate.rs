//! One-shot readiness gate.
//!
//! A gate starts closed, opens exactly once, and never closes again.
//! Waiters block until it opens. Opening twice is a caller bug and fails
//! fast rather than being silently absorbed.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Error from gate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The gate was already opened.
    #[error("gate already opened")]
    AlreadyOpen,
}

/// One-shot settable gate with blocking and bounded waits.
///
/// Waiting without a timeout is acceptable here because the session layer
/// guarantees that either activation completes or the session is torn down;
/// callers outside that guarantee should use [`ReadyGate::wait_timeout`].
pub struct ReadyGate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl ReadyGate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Opens the gate, waking all waiters.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::AlreadyOpen`] on a second open.
    pub fn open(&self) -> Result<(), GateError> {
        let mut open = self.open.lock();
        if *open {
            return Err(GateError::AlreadyOpen);
        }
        *open = true;
        self.cond.notify_all();
        Ok(())
    }

    /// Blocks until the gate is open.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }

    /// Blocks up to `timeout`; returns whether the gate is open.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut open = self.open.lock();
        if *open {
            return true;
        }
        let _ = self.cond.wait_for(&mut open, timeout);
        *open
    }

    /// Whether the gate is open, without blocking.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_gate_open_once() {
        let gate = ReadyGate::new();
        assert!(!gate.is_open());
        gate.open().unwrap();
        assert!(gate.is_open());
        assert_eq!(gate.open(), Err(GateError::AlreadyOpen));
    }

    #[test]
    fn test_gate_wait_returns_immediately_when_open() {
        let gate = ReadyGate::new();
        gate.open().unwrap();
        gate.wait();
        assert!(gate.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_gate_wait_blocks_until_open() {
        let gate = Arc::new(ReadyGate::new());
        let waiter = Arc::clone(&gate);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            waiter.wait();
            start.elapsed()
        });

        thread::sleep(Duration::from_millis(50));
        gate.open().unwrap();

        let waited = handle.join().unwrap();
        assert!(waited >= Duration::from_millis(40));
    }

    #[test]
    fn test_gate_wait_timeout_expires_closed() {
        let gate = ReadyGate::new();
        let start = Instant::now();
        assert!(!gate.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_gate_open_wakes_all_waiters() {
        let gate = Arc::new(ReadyGate::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let waiter = Arc::clone(&gate);
            handles.push(thread::spawn(move || waiter.wait()));
        }

        thread::sleep(Duration::from_millis(30));
        gate.open().unwrap();

        for h in handles {
            h.join().unwrap();
        }
    }
}
