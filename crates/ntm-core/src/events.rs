//! Application-wide events published by the API client.

use tokio::sync::broadcast;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 16;

/// Events the transport layer publishes for the application shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A response came back 401. The session has already been cleared;
    /// subscribers discard whatever in-memory state they hold.
    Unauthorized { method: String, path: String },
}

pub type EventSender = broadcast::Sender<ClientEvent>;
pub type EventReceiver = broadcast::Receiver<ClientEvent>;

pub fn create_event_channel() -> EventSender {
    let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
    tx
}
