//! Concurrency primitives backing the dispatch pipeline.
//!
//! Three small pieces, each with a single job:
//!
//! - [`BlockingQueue`] — unbounded, terminable FIFO; every background loop
//!   and every poll channel blocks on one of these.
//! - [`SnapshotMap`] — copy-on-write versioned map; the registry's session
//!   table, iterable without blocking point operations.
//! - [`ReadyGate`] — one-shot settable gate; a session's readiness signal.

mod gate;
mod queue;
mod snapshot;

pub use gate::{GateError, ReadyGate};
pub use queue::{BlockingQueue, QueueError};
pub use snapshot::SnapshotMap;
