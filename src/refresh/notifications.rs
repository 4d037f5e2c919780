//! Refresh progress broadcasting
//!
//! Collaborators subscribe to observe refreshes without polling `status()`.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RefreshEvent {
    Started,
    Published { entries: usize, skipped: usize },
    /// A trigger arrived while a refresh was already running
    Skipped,
    Failed { reason: String },
}

/// Fan-out of refresh events to any number of subscribers
#[derive(Debug, Clone)]
pub struct RefreshBroadcaster {
    sender: broadcast::Sender<RefreshEvent>,
}

impl RefreshBroadcaster {
    /// Create a new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: RefreshEvent) {
        match self.sender.send(event) {
            Ok(count) => debug!(subscribers = count, "broadcast refresh event"),
            // No receivers, this is fine
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "no subscribers for refresh event");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.sender.subscribe()
    }
}

impl Default for RefreshBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
