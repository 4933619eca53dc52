//! Client sessions — registered views into chain state.
//!
//! A session owns one delivery channel, a watch-set of wallet/lockbox
//! entities, and a one-shot readiness gate. Watch registrations submitted
//! before activation are buffered; `activate` resolves them against the
//! chain engine in one pass, opens the gate, and starts the session worker
//! thread that owns all subsequent notification processing.

mod command;
#[allow(clippy::module_inception)]
mod session;

pub use command::{Command, PendingWatch};
pub use session::{Session, SessionError};
