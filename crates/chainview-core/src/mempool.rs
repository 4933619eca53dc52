//! Adapter between the mempool/zero-conf engine and the session registry.
//!
//! The mempool engine knows transactions and scripts, not sessions. This
//! bridge answers its one question — which sessions watch this script — and
//! forwards its notifications into the dispatch pipeline without exposing
//! any session state.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;

use crate::notify::{Notification, ZeroConfPacket};
use crate::registry::SessionRegistry;
use crate::types::SessionId;

/// The registry as seen by the mempool engine.
#[derive(Clone)]
pub struct MempoolBridge {
    registry: Arc<SessionRegistry>,
}

impl MempoolBridge {
    /// Creates a bridge over the registry.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Sessions whose watch-set covers the given output script.
    ///
    /// Queries a table snapshot; the answer can be stale by the time the
    /// mempool engine acts on it, which is fine — a departed session's
    /// packets are dropped downstream.
    #[must_use]
    pub fn interested_sessions(&self, script: &[u8]) -> BTreeSet<SessionId> {
        self.registry
            .snapshot()
            .iter()
            .filter(|(_, session)| session.covers_script(script))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Pushes a zero-conf packet into the dispatch pipeline.
    pub fn push_notification(&self, packet: ZeroConfPacket) {
        self.registry.dispatch(Notification::ZeroConf(packet));
    }

    /// Reports a per-transaction error to the named session.
    ///
    /// Delivered as a dedicated error notification if the session is still
    /// registered; silently dropped otherwise.
    pub fn report_error(&self, session: &SessionId, message: &str, txid: Option<Bytes>) {
        self.registry.dispatch(Notification::WatchError {
            session: session.clone(),
            message: message.to_owned(),
            txid,
        });
    }
}

// ===========================================================================
// Tests
// ===========================================================================
