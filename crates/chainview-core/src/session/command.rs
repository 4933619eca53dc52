//! Session-scoped command surface.
//!
//! Command payloads are opaque to this layer — the wire codec owns their
//! schema, the chain engine interprets them. The session layer only routes.

use bytes::Bytes;

use crate::types::{EntityId, WatchKind};

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command addressed to one session.
#[derive(Debug, Clone)]
pub enum Command {
    /// Register interest in a wallet.
    RegisterWallet {
        /// Wallet entity id.
        entity: EntityId,
        /// Opaque registration body (address lists, filters).
        payload: Bytes,
    },
    /// Register interest in a lockbox.
    RegisterLockbox {
        /// Lockbox entity id.
        entity: EntityId,
        /// Opaque registration body.
        payload: Bytes,
    },
    /// A ledger/state query, executed by the chain engine.
    Query {
        /// Entity the query is scoped to, if any.
        entity: Option<EntityId>,
        /// Opaque query body.
        payload: Bytes,
    },
    /// A command kind this layer does not recognize.
    Other {
        /// The unrecognized command name, echoed in the error.
        name: String,
    },
}

impl Command {
    /// Command name for logging and error text.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::RegisterWallet { .. } => "register-wallet",
            Self::RegisterLockbox { .. } => "register-lockbox",
            Self::Query { .. } => "query",
            Self::Other { name } => name,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingWatch
// ---------------------------------------------------------------------------

/// A watch registration buffered before the session is ready.
#[derive(Debug, Clone)]
pub struct PendingWatch {
    /// Watch kind.
    pub kind: WatchKind,
    /// Opaque registration body, replayed to the engine at activation.
    pub payload: Bytes,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        let c = Command::RegisterWallet {
            entity: EntityId::new("w1"),
            payload: Bytes::new(),
        };
        assert_eq!(c.name(), "register-wallet");

        let c = Command::Query {
            entity: None,
            payload: Bytes::new(),
        };
        assert_eq!(c.name(), "query");

        let c = Command::Other {
            name: "estimate-fee".into(),
        };
        assert_eq!(c.name(), "estimate-fee");
    }
}
