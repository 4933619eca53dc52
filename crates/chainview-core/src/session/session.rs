//! Session lifecycle and per-session notification processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::channel::DeliveryChannel;
use crate::notify::Notification;
use crate::session::command::{Command, PendingWatch};
use crate::source::{ChainSource, LedgerHandle, SourceError};
use crate::sync::{BlockingQueue, ReadyGate};
use crate::types::{EntityId, SessionId, WatchKind};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Errors from session-scoped operations.
///
/// All of these recover at the command boundary — they become typed error
/// responses to the client and never abort the registry's background loops.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The command references an entity this session never registered.
    #[error("unknown entity `{0}`")]
    UnknownEntity(EntityId),

    /// The command kind is not recognized.
    #[error("unsupported command `{0}`")]
    UnsupportedCommand(String),

    /// `activate` was called on an already-activated session. A programming
    /// fault, fatal to the session, never expected in correct operation.
    #[error("session already activated")]
    ActivationMisuse,

    /// The session is torn down; its channel no longer delivers.
    #[error("delivery channel terminated")]
    ChannelTerminated,

    /// The chain engine rejected a ledger query.
    #[error("ledger query failed: {0}")]
    Query(String),
}

impl From<SourceError> for SessionError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::UnknownEntity(entity) => Self::UnknownEntity(entity),
            SourceError::Query(msg) => Self::Query(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client's registered view into chain state.
///
/// The registry is the sole owner; every other component sees a borrowed
/// reference valid only within a bounded scope. The watch-set, the pending
/// buffer, and the delivery channel each have their own exclusion so a slow
/// delivery never blocks a registration and vice versa.
pub struct Session {
    id: SessionId,
    channel: Arc<dyn DeliveryChannel>,
    source: Arc<dyn ChainSource>,
    /// Resolved watches, keyed by entity.
    watches: RwLock<FxHashMap<EntityId, LedgerHandle>>,
    /// Registrations buffered before activation; last write wins per entity.
    pending: Mutex<FxHashMap<EntityId, PendingWatch>>,
    /// One-shot readiness gate; opened by `activate`.
    gate: ReadyGate,
    /// Worker inbox. All session-internal notification processing is
    /// serialized onto the worker thread draining this queue.
    inbox: BlockingQueue<Notification>,
    worker: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
    /// Self-reference handed to the worker thread at activation.
    weak: Weak<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates an unactivated session owning `channel`.
    pub(crate) fn new(
        id: SessionId,
        channel: Arc<dyn DeliveryChannel>,
        source: Arc<dyn ChainSource>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id,
            channel,
            source,
            watches: RwLock::new(FxHashMap::default()),
            pending: Mutex::new(FxHashMap::default()),
            gate: ReadyGate::new(),
            inbox: BlockingQueue::new(),
            worker: Mutex::new(None),
            torn_down: AtomicBool::new(false),
            weak: weak.clone(),
        })
    }

    /// The session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether the session has been activated and not torn down.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gate.is_open() && !self.torn_down.load(Ordering::SeqCst)
    }

    /// Registers interest in an entity.
    ///
    /// Before activation the registration is buffered (overwriting any
    /// earlier registration for the same entity); after activation it is
    /// resolved against the chain engine immediately.
    ///
    /// # Errors
    ///
    /// Post-activation only: resolution failures from the chain engine.
    pub fn register_watch(
        &self,
        entity: EntityId,
        kind: WatchKind,
        payload: Bytes,
    ) -> Result<(), SessionError> {
        let mut pending = self.pending.lock();
        if self.gate.is_open() {
            // Activation already drained the buffer; resolve in place. The
            // pending lock is released first so the engine call cannot
            // stall other registrations.
            drop(pending);
            let handle = self.source.resolve_watch(&entity, kind, &payload)?;
            self.watches.write().insert(entity, handle);
        } else {
            pending.insert(entity, PendingWatch { kind, payload });
        }
        Ok(())
    }

    /// Activates the session: drains the pending buffer, resolves every
    /// buffered registration, opens the readiness gate, and starts the
    /// session worker thread.
    ///
    /// All buffered registrations are resolved strictly before the gate
    /// opens and before any post-activation registration is processed.
    ///
    /// # Errors
    ///
    /// [`SessionError::ActivationMisuse`] on a second activation.
    pub fn activate(&self) -> Result<(), SessionError> {
        // The pending lock is held through the gate flip: a registration
        // racing with activation either lands in the drained buffer or
        // observes the open gate, never neither.
        let mut pending = self.pending.lock();
        if self.gate.is_open() {
            return Err(SessionError::ActivationMisuse);
        }

        let buffered: Vec<(EntityId, PendingWatch)> = pending.drain().collect();
        let mut resolved = 0usize;
        {
            let mut watches = self.watches.write();
            for (entity, watch) in buffered {
                match self.source.resolve_watch(&entity, watch.kind, &watch.payload) {
                    Ok(handle) => {
                        watches.insert(entity, handle);
                        resolved += 1;
                    }
                    Err(e) => {
                        warn!(session = %self.id, entity = %entity, error = %e,
                            "dropping unresolvable watch registration");
                    }
                }
            }
        }

        self.gate.open().map_err(|_| SessionError::ActivationMisuse)?;

        if let Some(worker) = self.weak.upgrade() {
            *self.worker.lock() = Some(thread::spawn(move || worker.run()));
        }

        debug!(session = %self.id, watches = resolved, "session activated");
        Ok(())
    }

    /// Executes one session-scoped command.
    ///
    /// Registration commands are accepted pre-activation (buffered); query
    /// commands wait on the readiness gate first.
    ///
    /// # Errors
    ///
    /// See [`SessionError`]; every variant except `ActivationMisuse` can
    /// surface here.
    pub fn submit(&self, command: Command) -> Result<Bytes, SessionError> {
        match command {
            Command::RegisterWallet { entity, payload } => {
                self.register_watch(entity, WatchKind::Wallet, payload)?;
                Ok(Bytes::new())
            }
            Command::RegisterLockbox { entity, payload } => {
                self.register_watch(entity, WatchKind::Lockbox, payload)?;
                Ok(Bytes::new())
            }
            Command::Query { entity, payload } => {
                self.gate.wait();
                if self.torn_down.load(Ordering::SeqCst) {
                    return Err(SessionError::ChannelTerminated);
                }
                if let Some(entity) = &entity {
                    if !self.watches.read().contains_key(entity) {
                        return Err(SessionError::UnknownEntity(entity.clone()));
                    }
                }
                Ok(self.source.query(&self.id, entity.as_ref(), &payload)?)
            }
            Command::Other { name } => Err(SessionError::UnsupportedCommand(name)),
        }
    }

    /// Hands a notification to the session worker.
    ///
    /// Never blocks; enqueued after teardown it is silently dropped.
    pub fn process_notification(&self, notification: Notification) {
        let _ = self.inbox.push(notification);
    }

    /// Whether this session's watch-set makes the notification relevant.
    pub(crate) fn is_interested(&self, notification: &Notification) -> bool {
        match notification {
            Notification::NewBlock { .. } => true,
            Notification::Refresh { entity, .. } => self.watches.read().contains_key(entity),
            Notification::ZeroConf(packet) => {
                let watches = self.watches.read();
                packet
                    .scripts
                    .iter()
                    .any(|script| watches.values().any(|h| h.covers(script)))
            }
            Notification::WatchError { session, .. } => *session == self.id,
        }
    }

    /// Whether any resolved watch covers the given output script.
    #[must_use]
    pub fn covers_script(&self, script: &[u8]) -> bool {
        self.watches.read().values().any(|h| h.covers(script))
    }

    /// Whether the entity is in the resolved watch-set.
    #[must_use]
    pub fn has_watch(&self, entity: &EntityId) -> bool {
        self.watches.read().contains_key(entity)
    }

    /// Number of resolved watches.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.watches.read().len()
    }

    /// Liveness of the owned delivery channel, probed by the GC loop.
    pub(crate) fn channel_live(&self) -> bool {
        self.channel.is_live()
    }

    /// Tears the session down: terminates the worker inbox, joins the
    /// worker (it may be mid-delivery), then shuts the channel down.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wake command submitters parked on the readiness gate; they
        // observe the teardown flag on wakeup.
        let _ = self.gate.open();
        self.inbox.terminate();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
        self.channel.shutdown();
        debug!(session = %self.id, "session torn down");
    }

    /// Worker loop: drains the inbox, filters, forwards through the
    /// channel. Exits when the inbox is terminated.
    fn run(&self) {
        while let Ok(notification) = self.inbox.pop() {
            if self.is_interested(&notification) {
                trace!(session = %self.id, kind = notification.tag(), "delivering");
                self.channel.deliver(notification);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
