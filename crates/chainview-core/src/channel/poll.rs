//! Long-poll delivery channel.
//!
//! Buffers notifications in arrival order until the client issues a poll.
//! Liveness is inferred from polling activity: every garbage-collection
//! probe that does not coincide with an in-flight poll response bumps an
//! expiry counter, every completed response resets it, and once the counter
//! reaches the threshold the channel is dead for good.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::channel::DeliveryChannel;
use crate::notify::Notification;
use crate::sync::BlockingQueue;

/// Number of unanswered liveness checks after which a poll channel expires.
pub const EXPIRE_COUNT: u32 = 5;

// ---------------------------------------------------------------------------
// PollResponse
// ---------------------------------------------------------------------------

/// Result of one long-poll request.
#[derive(Debug, Clone)]
pub struct PollResponse {
    /// Drained notifications, in arrival order. Empty on timeout or
    /// termination.
    pub batch: Vec<Notification>,
    /// Whether the channel is shut down; a terminal response tells the
    /// client to stop polling and re-register if it still cares.
    pub terminal: bool,
}

impl PollResponse {
    fn terminal() -> Self {
        Self {
            batch: Vec::new(),
            terminal: true,
        }
    }

    fn batch(batch: Vec<Notification>) -> Self {
        Self {
            batch,
            terminal: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PollChannel
// ---------------------------------------------------------------------------

/// Buffering delivery channel drained by client-initiated long polls.
///
/// `respond` and `is_live` are mutually exclusive through the response
/// mutex: a probe that finds the mutex held has caught a response in
/// flight, which counts as recent activity and leaves the expiry counter
/// untouched.
pub struct PollChannel {
    queue: BlockingQueue<Notification>,
    /// Unanswered liveness checks since the last completed response.
    count: AtomicU32,
    /// Set once `count` reaches the threshold; never cleared.
    expired: AtomicBool,
    /// Held for the duration of every `respond`.
    responding: Mutex<()>,
    /// Owner-supplied predicate letting a poll observe shutdown-in-progress.
    alive: Box<dyn Fn() -> bool + Send + Sync>,
    expire_count: u32,
}

impl PollChannel {
    /// Creates a channel with the default expiry threshold.
    ///
    /// `alive` is supplied by the owner; a poll request re-evaluates it and
    /// returns a terminal response as soon as it turns false.
    pub fn new(alive: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::with_expire_count(alive, EXPIRE_COUNT)
    }

    /// Creates a channel with a custom expiry threshold.
    pub fn with_expire_count(
        alive: impl Fn() -> bool + Send + Sync + 'static,
        expire_count: u32,
    ) -> Self {
        Self {
            queue: BlockingQueue::new(),
            count: AtomicU32::new(0),
            expired: AtomicBool::new(false),
            responding: Mutex::new(()),
            alive: Box::new(alive),
            expire_count,
        }
    }

    /// Serves one long-poll request.
    ///
    /// Blocks until at least one notification is queued, the owner signals
    /// shutdown-in-progress, or `timeout` elapses. With data: drains the
    /// whole buffer in arrival order and resets the expiry counter. On
    /// timeout: an empty non-terminal response (the completed round trip
    /// still proves the client alive, so the counter resets). On
    /// termination: an empty terminal response, as will be every response
    /// after it.
    pub fn respond(&self, timeout: Duration) -> PollResponse {
        let _in_flight = self.responding.lock();

        if !(self.alive)() {
            return PollResponse::terminal();
        }

        match self.queue.drain_wait(timeout) {
            Ok(batch) => {
                self.count.store(0, Ordering::Relaxed);
                trace!(drained = batch.len(), "poll response completed");
                PollResponse::batch(batch)
            }
            Err(_) => PollResponse::terminal(),
        }
    }

    /// Current expiry counter value.
    #[must_use]
    pub fn expiry_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl DeliveryChannel for PollChannel {
    fn deliver(&self, notification: Notification) {
        // Rejected pushes after shutdown are expected and dropped.
        let _ = self.queue.push(notification);
    }

    fn is_live(&self) -> bool {
        if self.expired.load(Ordering::Relaxed) {
            return false;
        }

        // A held response mutex means a responder is in flight right now;
        // that is recent activity, so the counter is left alone.
        match self.responding.try_lock() {
            None => true,
            Some(_guard) => {
                let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
                if count >= self.expire_count {
                    self.expired.store(true, Ordering::Relaxed);
                    debug!(count, "poll channel expired");
                    return false;
                }
                true
            }
        }
    }

    fn shutdown(&self) {
        // Terminate first so a blocked responder wakes with a terminal
        // result, then take the response mutex: once it is acquired no
        // in-flight responder can still be touching session state.
        self.queue.terminate();
        drop(self.responding.lock());
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

    fn block(height: u32) -> Notification {
        Notification::NewBlock { height }
    }

    // --- Delivery and respond ---

    #[test]
    fn test_poll_respond_drains_in_order() {
        let ch = PollChannel::new(|| true);
        ch.deliver(block(1));
        ch.deliver(block(2));
        ch.deliver(block(3));

        let response = ch.respond(Duration::from_millis(10));
        assert!(!response.terminal);
        assert_eq!(response.batch.len(), 3);
        let heights: Vec<u32> = response
            .batch
            .iter()
            .map(|n| match n {
                Notification::NewBlock { height } => *height,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(heights, vec![1, 2, 3]);
    }

    #[test]
    fn test_poll_respond_blocks_until_delivery() {
        let ch = Arc::new(PollChannel::new(|| true));
        let producer = Arc::clone(&ch);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.deliver(block(9));
        });

        let start = Instant::now();
        let response = ch.respond(Duration::from_secs(5));
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(response.batch.len(), 1);
        assert!(!response.terminal);
        handle.join().unwrap();
    }

    #[test]
    fn test_poll_respond_timeout_is_empty_not_terminal() {
        let ch = PollChannel::new(|| true);
        let response = ch.respond(Duration::from_millis(20));
        assert!(response.batch.is_empty());
        assert!(!response.terminal);
    }

    #[test]
    fn test_poll_respond_terminal_when_owner_dead() {
        let ch = PollChannel::new(|| false);
        ch.deliver(block(1));
        let response = ch.respond(Duration::from_millis(10));
        assert!(response.terminal);
        assert!(response.batch.is_empty());
    }

    #[test]
    fn test_poll_notifications_survive_timeout_boundary() {
        // A timeout does not cancel pending notifications; they stay queued
        // for the next poll.
        let ch = PollChannel::new(|| true);
        let empty = ch.respond(Duration::from_millis(10));
        assert!(empty.batch.is_empty());

        ch.deliver(block(4));
        let next = ch.respond(Duration::from_millis(10));
        assert_eq!(next.batch.len(), 1);
    }

    // --- Expiry counter ---

    #[test]
    fn test_poll_expiry_counter_increments() {
        let ch = PollChannel::new(|| true);
        assert!(ch.is_live());
        assert!(ch.is_live());
        assert_eq!(ch.expiry_count(), 2);
    }

    #[test]
    fn test_poll_expires_at_threshold_not_before() {
        let ch = PollChannel::new(|| true);
        for probe in 1..EXPIRE_COUNT {
            assert!(ch.is_live(), "must still be live at probe {probe}");
        }
        assert!(!ch.is_live(), "must expire on probe {EXPIRE_COUNT}");
    }

    #[test]
    fn test_poll_expiry_is_permanent() {
        let ch = PollChannel::new(|| true);
        for _ in 0..EXPIRE_COUNT {
            let _ = ch.is_live();
        }
        assert!(!ch.is_live());

        // A late response no longer resurrects the channel.
        ch.deliver(block(1));
        let _ = ch.respond(Duration::from_millis(10));
        assert!(!ch.is_live());
    }

    #[test]
    fn test_poll_custom_expire_count() {
        let ch = PollChannel::with_expire_count(|| true, 2);
        assert!(ch.is_live());
        assert!(!ch.is_live());
    }

    #[test]
    fn test_poll_completed_response_resets_counter() {
        let ch = PollChannel::new(|| true);
        let _ = ch.is_live();
        let _ = ch.is_live();
        assert_eq!(ch.expiry_count(), 2);

        ch.deliver(block(1));
        let _ = ch.respond(Duration::from_millis(10));
        assert_eq!(ch.expiry_count(), 0);

        // Counter starts over, so the channel survives another full run-up.
        for probe in 1..EXPIRE_COUNT {
            assert!(ch.is_live(), "must still be live at probe {probe}");
        }
    }

    #[test]
    fn test_poll_probe_during_response_does_not_count() {
        let ch = Arc::new(PollChannel::new(|| true));
        let responder = Arc::clone(&ch);

        // Park a responder in its bounded wait.
        let handle = thread::spawn(move || responder.respond(Duration::from_millis(200)));
        thread::sleep(Duration::from_millis(50));

        // Probes while the response is in flight report live and leave the
        // counter untouched.
        assert!(ch.is_live());
        assert!(ch.is_live());
        assert_eq!(ch.expiry_count(), 0);

        handle.join().unwrap();
    }

    // --- Shutdown ---

    #[test]
    fn test_poll_shutdown_unblocks_responder_with_terminal() {
        let ch = Arc::new(PollChannel::new(|| true));
        let responder = Arc::clone(&ch);

        let handle = thread::spawn(move || responder.respond(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(50));

        ch.shutdown();

        let response = handle.join().unwrap();
        assert!(response.terminal);

        // Every later poll is terminal too.
        let again = ch.respond(Duration::from_millis(10));
        assert!(again.terminal);
    }

    #[test]
    fn test_poll_shutdown_idempotent() {
        let ch = PollChannel::new(|| true);
        ch.shutdown();
        ch.shutdown();
        assert!(ch.respond(Duration::from_millis(1)).terminal);
    }

    #[test]
    fn test_poll_shutdown_waits_for_in_flight_response() {
        let ch = Arc::new(PollChannel::new(|| true));
        let responder = Arc::clone(&ch);

        let handle = thread::spawn(move || responder.respond(Duration::from_millis(150)));
        thread::sleep(Duration::from_millis(30));

        let start = Instant::now();
        ch.shutdown();
        // shutdown cannot return before the responder released the mutex,
        // which the termination wakeup makes prompt.
        assert!(start.elapsed() < Duration::from_millis(150));
        let response = handle.join().unwrap();
        assert!(response.terminal);
    }

    #[test]
    fn test_poll_deliver_after_shutdown_is_dropped() {
        let ch = PollChannel::new(|| true);
        ch.shutdown();
        ch.deliver(block(1));
        assert!(ch.respond(Duration::from_millis(1)).terminal);
    }
}
