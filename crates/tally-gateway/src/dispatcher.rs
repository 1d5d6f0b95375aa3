use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::error;

use tally_types::events::{GatewayEvent, Table};

/// Broadcast channel depth before slow receivers start lagging.
const BROADCAST_CAPACITY: usize = 1024;

/// An event serialized once for every receiver.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub table: Option<Table>,
    pub json: Arc<str>,
}

/// Manages all connected clients and broadcasts change events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All connected clients receive all events and filter by table
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
            }),
        }
    }

    /// Subscribe to change events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        // No receivers just means nobody is connected.
        let _ = self.inner.broadcast_tx.send(BroadcastMessage {
            table: event.table(),
            json: json.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::GameState;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.broadcast(GatewayEvent::GameStateChanged { state: GameState::default() });

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.table, Some(Table::GameState));
        let event: GatewayEvent = serde_json::from_str(&msg.json).unwrap();
        assert!(matches!(event, GatewayEvent::GameStateChanged { .. }));
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::Reset { state: GameState::default() });
    }
}
