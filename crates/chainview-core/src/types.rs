//! Identity types shared across the session layer.

use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Unique client-session identifier.
///
/// Assigned at registration and immutable thereafter. The registry holds at
/// most one session per id. Cheap to clone (shared storage) — ids travel with
/// every per-session notification packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// Creates a session id from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().into())
    }

    /// Renders a server-assigned id from a monotonic sequence number.
    #[must_use]
    pub fn generate(seq: u64) -> Self {
        Self(format!("cv-{seq}").into())
    }

    /// Returns the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Identifier of a watched entity (a wallet or lockbox).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Creates an entity id from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().into())
    }

    /// Returns the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// WatchKind
// ---------------------------------------------------------------------------

/// Kind of a watched entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// A regular wallet.
    Wallet,
    /// A multi-signature lockbox.
    Lockbox,
}

impl fmt::Display for WatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wallet => f.write_str("wallet"),
            Self::Lockbox => f.write_str("lockbox"),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new("abc123");
        assert_eq!(format!("{id}"), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_session_id_generate() {
        assert_eq!(SessionId::generate(42).as_str(), "cv-42");
        assert_ne!(SessionId::generate(1), SessionId::generate(2));
    }

    #[test]
    fn test_entity_id_eq_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(EntityId::new("wallet-1"));
        set.insert(EntityId::new("wallet-1"));
        set.insert(EntityId::new("wallet-2"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_watch_kind_display() {
        assert_eq!(format!("{}", WatchKind::Wallet), "wallet");
        assert_eq!(format!("{}", WatchKind::Lockbox), "lockbox");
    }
}
