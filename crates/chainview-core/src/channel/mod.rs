//! Notification delivery channels.
//!
//! A [`DeliveryChannel`] is the one-way path from the dispatch pipeline to a
//! single client session. Two disciplines exist:
//!
//! - [`PollChannel`] — buffers notifications until the client issues a
//!   long-poll request; expires after repeated unanswered liveness checks.
//! - [`PushChannel`] — hands each notification straight to an already-open
//!   transport; always reports live.
//!
//! The registry's GC loop only ever sees the uniform [`DeliveryChannel`]
//! surface — liveness is part of the trait precisely so reclamation never
//! needs to know which variant it is probing.

mod poll;
mod push;

pub use poll::{PollChannel, PollResponse, EXPIRE_COUNT};
pub use push::{PushChannel, PushTransport};

use crate::notify::Notification;

/// One-way notification delivery to a single session.
///
/// Exactly one channel instance exists per session for its lifetime; a
/// dead channel is replaced only by re-registration.
pub trait DeliveryChannel: Send + Sync {
    /// Delivers a notification. Never blocks and never fails; loss past
    /// this point is the transport's concern.
    fn deliver(&self, notification: Notification);

    /// Whether the channel is still considered reachable. A `false` return
    /// makes the owning session eligible for garbage collection.
    fn is_live(&self) -> bool;

    /// Shuts the channel down, releasing any waiter. Must be idempotent,
    /// and must not return while a delivery or poll response is in flight.
    fn shutdown(&self);
}
