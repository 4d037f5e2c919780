//! Keeping the served snapshot in step with the catalog.
//!
//! - [`RefreshController`] owns the rebuild algorithm and is the only
//!   writer of the published snapshot.
//! - [`RefreshState`] is the single-flight marker plus last-run history.
//! - [`RefreshScheduler`] calls the controller on a timer.
//! - [`RefreshBroadcaster`] fans refresh progress out to subscribers.

mod controller;
mod notifications;
mod scheduler;
mod state;

pub use controller::{EncodeOutcome, RefreshController, RefreshOutcome, encode_records};
pub use notifications::{RefreshBroadcaster, RefreshEvent};
pub use scheduler::RefreshScheduler;
pub use state::{RefreshState, RefreshStatus, RunningGuard};
