//! Push delivery channel for persistent-connection transports.
//!
//! The transport keeps the connection open and owns its lifetime; this
//! channel only hands each notification over. Delivery is fire-and-forget —
//! a failed send is the transport's problem to report, never retried here.

use std::fmt;

use crate::channel::DeliveryChannel;
use crate::notify::Notification;
use crate::types::SessionId;

// ---------------------------------------------------------------------------
// PushTransport
// ---------------------------------------------------------------------------

/// Send half of an open persistent connection.
pub trait PushTransport: Send + Sync + 'static {
    /// Hands one notification to the connection.
    fn send(&self, notification: Notification);
}

/// Adapter that wraps a closure into a [`PushTransport`].
struct FnTransport<F>(F);

impl<F: Fn(Notification) + Send + Sync + 'static> PushTransport for FnTransport<F> {
    fn send(&self, notification: Notification) {
        (self.0)(notification);
    }
}

// ---------------------------------------------------------------------------
// PushChannel
// ---------------------------------------------------------------------------

/// Delivery channel over an already-open transport.
///
/// Stateless beyond the session identity: always live, shutdown is a no-op
/// (the transport's lifetime is owned elsewhere).
pub struct PushChannel {
    session: SessionId,
    transport: Box<dyn PushTransport>,
}

impl PushChannel {
    /// Creates a channel over the given transport.
    pub fn new(session: SessionId, transport: impl PushTransport) -> Self {
        Self {
            session,
            transport: Box::new(transport),
        }
    }

    /// Creates a channel from a plain send function.
    pub fn from_fn(
        session: SessionId,
        send: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Self {
        Self::new(session, FnTransport(send))
    }

    /// The session this channel belongs to.
    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.session
    }
}

impl DeliveryChannel for PushChannel {
    fn deliver(&self, notification: Notification) {
        self.transport.send(notification);
    }

    fn is_live(&self) -> bool {
        true
    }

    fn shutdown(&self) {}
}

impl fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushChannel")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
