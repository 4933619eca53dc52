//! # `chainview` Core
//!
//! The session and notification-fanout engine of the chainview blockchain
//! indexing server.
//!
//! This crate provides:
//! - **Session registry**: concurrent table of client views with snapshot
//!   iteration, backed by three background threads (fan-out, delivery, GC)
//! - **Sessions**: per-client watch-sets with deferred registration, a
//!   one-shot readiness gate, and a dedicated worker thread
//! - **Delivery channels**: long-poll buffering with liveness-based expiry,
//!   and push-over-persistent-connection
//! - **Mempool bridge**: the zero-conf engine's view into session interest
//!
//! ## Design Principles
//!
//! 1. **Single-writer sessions** - all session-internal notification
//!    processing is serialized onto one worker thread
//! 2. **Snapshot reads** - the session table is copy-on-write; readers
//!    never block writers and never observe torn state
//! 3. **Loss-free, backpressure-free queues** - unbounded terminable FIFOs
//!    are the only cross-thread hand-off
//! 4. **Two-phase shutdown** - terminate every queue, then join every
//!    thread; the in-flight responder always finishes first
//!
//! ## Example
//!
//! ```rust,ignore
//! use chainview_core::{RegistryConfig, SessionRegistry};
//!
//! let registry = SessionRegistry::new(engine, RegistryConfig::default());
//! registry.start();
//!
//! // Transport-facing surface
//! let session = registry.register(id, channel)?;
//! session.activate()?;
//! registry.dispatch(notification);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod config;
pub mod mempool;
pub mod notify;
pub mod registry;
pub mod session;
pub mod source;
pub mod sync;
pub mod types;

// Re-export key types
pub use config::RegistryConfig;
pub use mempool::MempoolBridge;
pub use registry::{Request, SessionRegistry};
pub use session::Session;

/// Result type for chainview-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chainview-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry-level errors
    #[error("Registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    /// Session-scoped errors
    #[error("Session error: {0}")]
    Session(#[from] session::SessionError),

    /// Chain-engine errors
    #[error("Source error: {0}")]
    Source(#[from] source::SourceError),

    /// Queue errors
    #[error("Queue error: {0}")]
    Queue(#[from] sync::QueueError),

    /// Readiness-gate errors
    #[error("Gate error: {0}")]
    Gate(#[from] sync::GateError),
}
