//! Unbounded, blocking, terminable FIFO queue.
//!
//! The hand-off primitive between pipeline stages: producers never block,
//! consumers block on empty, and `terminate` wakes every blocked consumer
//! with a terminal result. Termination is one-way — once terminated, all
//! later pushes are rejected and all pops fail fast.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

// ---------------------------------------------------------------------------
// QueueError
// ---------------------------------------------------------------------------

/// Error from queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue has been terminated; no further items will flow.
    #[error("queue terminated")]
    Terminated,
}

// ---------------------------------------------------------------------------
// BlockingQueue
// ---------------------------------------------------------------------------

struct Inner<T> {
    items: VecDeque<T>,
    terminated: bool,
}

/// Unbounded FIFO queue with blocking pop and cooperative termination.
///
/// Unbounded growth is deliberate: the dispatch pipeline is the system's
/// buffering point against bursty chain activity, and back-pressure is an
/// explicit non-goal.
pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                terminated: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Terminated`] if the queue has been terminated;
    /// the item is dropped.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        if inner.terminated {
            return Err(QueueError::Terminated);
        }
        inner.items.push_back(item);
        self.available.notify_one();
        Ok(())
    }

    /// Removes the front item, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Terminated`] once the queue is terminated and
    /// drained.
    pub fn pop(&self) -> Result<T, QueueError> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Ok(item);
            }
            if inner.terminated {
                return Err(QueueError::Terminated);
            }
            self.available.wait(&mut inner);
        }
    }

    /// Drains every queued item, blocking up to `timeout` for the first one.
    ///
    /// Returns an empty vector if the timeout elapses with nothing queued —
    /// a normal long-poll timeout, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Terminated`] once the queue is terminated and
    /// drained.
    pub fn drain_wait(&self, timeout: Duration) -> Result<Vec<T>, QueueError> {
        let mut inner = self.inner.lock();
        loop {
            if !inner.items.is_empty() {
                return Ok(inner.items.drain(..).collect());
            }
            if inner.terminated {
                return Err(QueueError::Terminated);
            }
            if self.available.wait_for(&mut inner, timeout).timed_out() {
                return Ok(Vec::new());
            }
        }
    }

    /// Terminates the queue, waking every blocked consumer.
    ///
    /// Queued items are discarded; later pushes are rejected. Idempotent.
    pub fn terminate(&self) {
        let mut inner = self.inner.lock();
        inner.terminated = true;
        inner.items.clear();
        self.available.notify_all();
    }

    /// Whether the queue has been terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.lock().terminated
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
