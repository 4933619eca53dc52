//! Notification types flowing through the dispatch pipeline.
//!
//! A [`Notification`] is produced by the chain engine or the mempool bridge,
//! pushed into the registry's raw-event queue, fanned out into per-session
//! [`NotificationPacket`]s, and finally handed to each session's delivery
//! channel. Notifications are immutable once constructed and move along the
//! pipeline; they are cloned only at the per-session packet boundary.

use bytes::Bytes;

use crate::types::{EntityId, SessionId};

// ---------------------------------------------------------------------------
// RefreshKind
// ---------------------------------------------------------------------------

/// Reason attached to a refresh notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// The entity's ledger view must be rebuilt from scratch.
    Rescan,
    /// The entity's watch definition changed (new addresses in scope).
    WatchChanged,
}

// ---------------------------------------------------------------------------
// ZeroConfPacket
// ---------------------------------------------------------------------------

/// Unconfirmed-transaction packet produced by the mempool engine.
///
/// `scripts` lists the output scripts the transaction touches and drives
/// relevance matching; `payload` is the opaque serialized notification body
/// owned by the wire codec.
#[derive(Debug, Clone)]
pub struct ZeroConfPacket {
    /// Transaction identifier.
    pub txid: Bytes,
    /// Opaque serialized notification body.
    pub payload: Bytes,
    /// Output scripts touched by the transaction.
    pub scripts: Vec<Bytes>,
}

impl ZeroConfPacket {
    /// Creates a packet.
    pub fn new(txid: Bytes, payload: Bytes, scripts: Vec<Bytes>) -> Self {
        Self {
            txid,
            payload,
            scripts,
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A state-change event delivered to interested sessions.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A watched entity's ledger view went stale and must be re-read.
    Refresh {
        /// Why the refresh happened.
        kind: RefreshKind,
        /// The affected entity.
        entity: EntityId,
    },
    /// A new block was connected to the chain tip.
    NewBlock {
        /// Height of the new tip.
        height: u32,
    },
    /// An unconfirmed transaction touched watched scripts.
    ZeroConf(ZeroConfPacket),
    /// A mempool-reported error scoped to a single session.
    WatchError {
        /// The session the error is addressed to.
        session: SessionId,
        /// Human-readable error text.
        message: String,
        /// The offending transaction, if any.
        txid: Option<Bytes>,
    },
}

impl Notification {
    /// Short tag for logging.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Refresh { .. } => "refresh",
            Self::NewBlock { .. } => "new-block",
            Self::ZeroConf(_) => "zero-conf",
            Self::WatchError { .. } => "watch-error",
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationPacket
// ---------------------------------------------------------------------------

/// A notification targeted at one session, produced by the fan-out loop.
#[derive(Debug, Clone)]
pub struct NotificationPacket {
    /// Target session.
    pub session: SessionId,
    /// The notification to deliver.
    pub notification: Notification,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_tag() {
        let n = Notification::NewBlock { height: 7 };
        assert_eq!(n.tag(), "new-block");

        let n = Notification::Refresh {
            kind: RefreshKind::Rescan,
            entity: EntityId::new("w1"),
        };
        assert_eq!(n.tag(), "refresh");

        let n = Notification::ZeroConf(ZeroConfPacket::new(
            Bytes::from_static(b"tx"),
            Bytes::new(),
            vec![],
        ));
        assert_eq!(n.tag(), "zero-conf");

        let n = Notification::WatchError {
            session: SessionId::new("s1"),
            message: "broadcast failed".into(),
            txid: None,
        };
        assert_eq!(n.tag(), "watch-error");
    }

    #[test]
    fn test_packet_carries_target() {
        let packet = NotificationPacket {
            session: SessionId::new("s1"),
            notification: Notification::NewBlock { height: 1 },
        };
        assert_eq!(packet.session.as_str(), "s1");
    }
}
