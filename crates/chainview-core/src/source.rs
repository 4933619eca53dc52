//! Interface to the external chain-state engine.
//!
//! The storage/scanning engine that resolves ledger entries and balances is
//! an external collaborator. The session layer only needs two things from
//! it: turning a watch registration into a resolved [`LedgerHandle`], and
//! executing opaque ledger queries on behalf of a session.

use bytes::Bytes;
use fxhash::FxHashSet;

use crate::types::{EntityId, SessionId, WatchKind};

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Errors surfaced by the chain-state engine.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The entity is unknown to chain state.
    #[error("entity `{0}` not found in chain state")]
    UnknownEntity(EntityId),

    /// A ledger query failed.
    #[error("ledger query failed: {0}")]
    Query(String),
}

// ---------------------------------------------------------------------------
// LedgerHandle
// ---------------------------------------------------------------------------

/// A resolved view over one watched entity.
///
/// Produced by [`ChainSource::resolve_watch`]. Carries the set of output
/// scripts the entity controls, which drives zero-conf relevance matching.
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    entity: EntityId,
    kind: WatchKind,
    scripts: FxHashSet<Bytes>,
}

impl LedgerHandle {
    /// Creates a handle over the given entity and script set.
    pub fn new(entity: EntityId, kind: WatchKind, scripts: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            entity,
            kind,
            scripts: scripts.into_iter().collect(),
        }
    }

    /// The watched entity.
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// The watch kind.
    #[must_use]
    pub fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Whether this entity controls the given output script.
    #[must_use]
    pub fn covers(&self, script: &[u8]) -> bool {
        self.scripts.contains(script)
    }

    /// Number of scripts in scope.
    #[must_use]
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }
}

// ---------------------------------------------------------------------------
// ChainSource
// ---------------------------------------------------------------------------

/// The chain-state engine as seen by the session layer.
///
/// Implementations must be shareable across the fan-out, delivery, and
/// per-session worker threads.
pub trait ChainSource: Send + Sync {
    /// Resolves a watch registration into a live [`LedgerHandle`].
    ///
    /// `payload` is the opaque registration body from the wire codec
    /// (address lists, filters); its schema is owned by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownEntity`] if the entity cannot be
    /// resolved against chain state.
    fn resolve_watch(
        &self,
        entity: &EntityId,
        kind: WatchKind,
        payload: &Bytes,
    ) -> Result<LedgerHandle, SourceError>;

    /// Executes an opaque ledger query for a session.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Query`] if the engine rejects the query.
    fn query(
        &self,
        session: &SessionId,
        entity: Option<&EntityId>,
        payload: &Bytes,
    ) -> Result<Bytes, SourceError>;
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_handle_covers() {
        let handle = LedgerHandle::new(
            EntityId::new("w1"),
            WatchKind::Wallet,
            vec![Bytes::from_static(b"script-a"), Bytes::from_static(b"script-b")],
        );
        assert!(handle.covers(b"script-a"));
        assert!(handle.covers(b"script-b"));
        assert!(!handle.covers(b"script-c"));
        assert_eq!(handle.script_count(), 2);
        assert_eq!(handle.kind(), WatchKind::Wallet);
        assert_eq!(handle.entity().as_str(), "w1");
    }

    #[test]
    fn test_source_error_display() {
        let e = SourceError::UnknownEntity(EntityId::new("w9"));
        assert_eq!(format!("{e}"), "entity `w9` not found in chain state");

        let e = SourceError::Query("bad filter".into());
        assert_eq!(format!("{e}"), "ledger query failed: bad filter");
    }
}
