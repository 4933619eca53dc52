//! Session registry and the notification-dispatch pipeline.
//!
//! The registry owns every session and three background threads:
//!
//! 1. **Fan-out** — pops raw chain-state events and matches each against a
//!    snapshot of the session table, producing per-session packets.
//! 2. **Delivery** — pops packets and hands each to its target session's
//!    worker (dropping packets whose session was unregistered in between).
//! 3. **GC** — blocks on a trigger queue; each trigger sweeps a snapshot
//!    and unregisters every session whose channel reports dead. This is
//!    the sole mechanism reclaiming abandoned long-poll clients.
//!
//! ```text
//! chain engine / mempool bridge
//!         │ dispatch()
//!         ▼
//!   raw-event queue ──fan-out──► packet queue ──delivery──► Session worker
//!                                                               │
//!   GC triggers ──GC sweep──► unregister(dead)                  ▼
//!                                                       DeliveryChannel
//! ```
//!
//! Shutdown is two-phase: clear the run flag and terminate every queue
//! (waking all loops), then join. Sessions are torn down after the loops
//! stop, and the external shutdown hook runs exactly once at the end.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use fxhash::FxHashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::channel::DeliveryChannel;
use crate::config::RegistryConfig;
use crate::notify::{Notification, NotificationPacket};
use crate::session::{Command, Session, SessionError};
use crate::source::ChainSource;
use crate::sync::{BlockingQueue, SnapshotMap};
use crate::types::SessionId;

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A session with this id is already registered. Nothing changed.
    #[error("session `{0}` already registered")]
    DuplicateSession(SessionId),

    /// No session with this id. Not fatal to the registry.
    #[error("unknown session `{0}`")]
    UnknownSession(SessionId),

    /// A session-scoped command failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One inbound request from a transport, routed by
/// [`SessionRegistry::handle_request`].
///
/// Both transports share this single entry point; the wire codec has
/// already decoded the frame and, for registration, constructed the
/// delivery channel matching its own discipline.
pub enum Request {
    /// Register a new session owning `channel`.
    RegisterSession {
        /// The new session's id.
        id: SessionId,
        /// The delivery channel the transport built for it.
        channel: Arc<dyn DeliveryChannel>,
    },
    /// Unregister and tear down a session.
    UnregisterSession {
        /// Target session.
        id: SessionId,
    },
    /// A session-scoped command.
    Session {
        /// Target session.
        id: SessionId,
        /// The command to execute.
        command: Command,
    },
    /// Shut the whole registry down.
    Shutdown,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterSession { id, .. } => {
                f.debug_struct("RegisterSession").field("id", id).finish_non_exhaustive()
            }
            Self::UnregisterSession { id } => {
                f.debug_struct("UnregisterSession").field("id", id).finish()
            }
            Self::Session { id, command } => f
                .debug_struct("Session")
                .field("id", id)
                .field("command", &command.name())
                .finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Owner of all sessions and the dispatch pipeline.
///
/// Construct with [`SessionRegistry::new`], call [`start`](Self::start) to
/// spawn the background threads, and [`shutdown_all`](Self::shutdown_all)
/// to stop everything in order.
pub struct SessionRegistry {
    sessions: SnapshotMap<SessionId, Arc<Session>>,
    /// Raw chain-state events, fed by `dispatch`. The system's only
    /// buffering point against bursty chain activity.
    raw_events: BlockingQueue<Notification>,
    /// Per-session packets produced by the fan-out loop.
    packets: BlockingQueue<NotificationPacket>,
    /// GC trigger signals, injected externally or by the ticker.
    gc_triggers: BlockingQueue<()>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    ticker: Mutex<Option<GcTicker>>,
    shutdown_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    source: Arc<dyn ChainSource>,
    config: RegistryConfig,
    /// Self-reference handed to the background threads at start.
    weak: Weak<SessionRegistry>,
}

impl SessionRegistry {
    /// Creates a registry over the given chain engine. Background threads
    /// are not started until [`start`](Self::start).
    pub fn new(source: Arc<dyn ChainSource>, config: RegistryConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            sessions: SnapshotMap::new(),
            raw_events: BlockingQueue::new(),
            packets: BlockingQueue::new(),
            gc_triggers: BlockingQueue::new(),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
            ticker: Mutex::new(None),
            shutdown_hook: Mutex::new(None),
            source,
            config,
            weak: weak.clone(),
        })
    }

    /// Installs the hook invoked exactly once at the end of
    /// [`shutdown_all`](Self::shutdown_all).
    pub fn set_shutdown_hook(&self, hook: impl FnOnce() + Send + 'static) {
        *self.shutdown_hook.lock() = Some(Box::new(hook));
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether the background threads are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared handle to the run flag, for wiring poll-channel liveness
    /// predicates to registry shutdown.
    #[must_use]
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Spawns the fan-out, delivery, and GC threads (plus the GC ticker if
    /// configured). Idempotent while running.
    pub fn start(&self) {
        let Some(registry) = self.weak.upgrade() else { return };
        let mut threads = self.threads.lock();
        if !threads.is_empty() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let fanout = Arc::clone(&registry);
        threads.push(thread::spawn(move || fanout.fanout_loop()));
        let delivery = Arc::clone(&registry);
        threads.push(thread::spawn(move || delivery.delivery_loop()));
        let gc = Arc::clone(&registry);
        threads.push(thread::spawn(move || gc.gc_loop()));

        if let Some(interval) = self.config.gc_interval {
            *self.ticker.lock() = Some(GcTicker::spawn(self.weak.clone(), interval));
        }

        info!("session registry started");
    }

    // --- Session table ---

    /// Registers a new session owning `channel`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateSession`] if the id is taken; no state
    /// changes in that case.
    pub fn register(
        &self,
        id: SessionId,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Result<Arc<Session>, RegistryError> {
        let session = Session::new(id.clone(), channel, Arc::clone(&self.source));
        if !self.sessions.try_insert(id.clone(), Arc::clone(&session)) {
            return Err(RegistryError::DuplicateSession(id));
        }
        debug!(session = %id, "session registered");
        Ok(session)
    }

    /// Point lookup.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id)
    }

    /// Removes a session from the table and tears it down.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] if absent. The map removal is
    /// atomic, so a concurrent caller cannot tear the same session down
    /// twice.
    pub fn unregister(&self, id: &SessionId) -> Result<(), RegistryError> {
        match self.sessions.remove(id) {
            Some(session) => {
                session.shutdown();
                debug!(session = %id, "session unregistered");
                Ok(())
            }
            None => Err(RegistryError::UnknownSession(id.clone())),
        }
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Current session-table snapshot, for relevance queries.
    pub(crate) fn snapshot(&self) -> Arc<FxHashMap<SessionId, Arc<Session>>> {
        self.sessions.snapshot()
    }

    // --- Dispatch surface ---

    /// Pushes a raw chain-state event into the pipeline. Never blocks the
    /// caller.
    pub fn dispatch(&self, notification: Notification) {
        trace!(kind = notification.tag(), "dispatching raw event");
        let _ = self.raw_events.push(notification);
    }

    /// Injects one GC trigger. Callable from an admin surface or an
    /// external ticker.
    pub fn trigger_gc(&self) {
        let _ = self.gc_triggers.push(());
    }

    /// Routes one inbound transport request.
    ///
    /// Responses are opaque payloads owned by the wire codec; errors are
    /// returned as typed values for the codec to encode.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub fn handle_request(&self, request: Request) -> Result<Bytes, RegistryError> {
        match request {
            Request::RegisterSession { id, channel } => {
                let session = self.register(id, channel)?;
                Ok(Bytes::copy_from_slice(session.id().as_str().as_bytes()))
            }
            Request::UnregisterSession { id } => {
                self.unregister(&id)?;
                Ok(Bytes::new())
            }
            Request::Session { id, command } => {
                let session = self
                    .get(&id)
                    .ok_or(RegistryError::UnknownSession(id))?;
                Ok(session.submit(command)?)
            }
            Request::Shutdown => {
                self.shutdown_all();
                Ok(Bytes::new())
            }
        }
    }

    // --- Shutdown ---

    /// Stops everything, in order: run flag cleared, queues terminated
    /// (waking every loop), background threads joined, remaining sessions
    /// torn down one by one, shutdown hook invoked. Idempotent; the hook
    /// runs exactly once.
    pub fn shutdown_all(&self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(mut ticker) = self.ticker.lock().take() {
            ticker.stop();
        }

        self.raw_events.terminate();
        self.packets.terminate();
        self.gc_triggers.terminate();

        let threads: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let _ = handle.join();
        }

        for (_, session) in self.sessions.drain() {
            session.shutdown();
        }

        if let Some(hook) = self.shutdown_hook.lock().take() {
            hook();
        }
        info!("session registry stopped");
    }

    // --- Background loops ---

    fn fanout_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            let Ok(event) = self.raw_events.pop() else { break };
            let sessions = self.sessions.snapshot();

            // Targeted errors skip the interest scan.
            if let Notification::WatchError { session, .. } = &event {
                let target = session.clone();
                if sessions.contains_key(&target) {
                    let _ = self.packets.push(NotificationPacket {
                        session: target,
                        notification: event,
                    });
                }
                continue;
            }

            for (id, session) in sessions.iter() {
                if session.is_interested(&event) {
                    let _ = self.packets.push(NotificationPacket {
                        session: id.clone(),
                        notification: event.clone(),
                    });
                }
            }
        }
    }

    fn delivery_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            let Ok(packet) = self.packets.pop() else { break };
            // The target may have been unregistered since fan-out; the
            // packet is dropped, not an error.
            match self.sessions.get(&packet.session) {
                Some(session) => session.process_notification(packet.notification),
                None => {
                    trace!(session = %packet.session, "dropping packet for departed session");
                }
            }
        }
    }

    fn gc_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            let Ok(()) = self.gc_triggers.pop() else { break };
            let sessions = self.sessions.snapshot();
            let mut reclaimed = 0usize;
            for (id, session) in sessions.iter() {
                if !session.channel_live() && self.unregister(id).is_ok() {
                    reclaimed += 1;
                }
            }
            if reclaimed > 0 {
                warn!(reclaimed, "reclaimed sessions with dead channels");
            }
        }
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// GcTicker
// ---------------------------------------------------------------------------

/// Timer thread feeding the registry's GC trigger queue.
///
/// Holds only a weak registry reference and stops on its own once the
/// registry is gone. Stopping is prompt: the tick wait is interruptible.
pub struct GcTicker {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl GcTicker {
    /// Spawns a ticker pushing one GC trigger every `interval`.
    #[must_use]
    pub fn spawn(registry: Weak<SessionRegistry>, interval: Duration) -> Self {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);
        let handle = thread::spawn(move || loop {
            {
                let (flag, cond) = &*signal;
                let mut stopped = flag.lock();
                if !*stopped {
                    let _ = cond.wait_for(&mut stopped, interval);
                }
                if *stopped {
                    break;
                }
            }
            let Some(registry) = registry.upgrade() else { break };
            registry.trigger_gc();
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stops and joins the ticker thread. Idempotent.
    pub fn stop(&mut self) {
        {
            let (flag, cond) = &*self.stop;
            *flag.lock() = true;
            cond.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GcTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
