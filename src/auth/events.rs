// Session event broadcast

use tokio::sync::broadcast;

use super::types::SessionEvent;

/// Non-replaying broadcast of session events.
///
/// Subscribers only see events sent after they subscribed. The channel holds a
/// single slot; a subscriber that falls behind skips to the newest event.
#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish an expiry without waiting on any subscriber
    pub fn session_expired(&self) {
        match self.tx.send(SessionEvent::Expired) {
            Ok(receivers) => {
                tracing::info!(receivers, "Broadcast session-expired event");
            }
            Err(_) => {
                tracing::debug!("Session expired with no active subscribers");
            }
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
