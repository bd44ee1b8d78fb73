use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::trace;

use huddle_types::events::{ChangeEvent, ChangeNotifier};

/// Fans committed changes out to every gateway connection. Each connection
/// filters by the workspaces it is subscribed to.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<ChangeEvent>,
    connections: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to change events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast a change to all connected clients. Best-effort: with no
    /// connections the event is dropped.
    pub fn broadcast(&self, event: ChangeEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn connection_opened(&self) -> usize {
        self.inner.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed) - 1
    }
}

impl ChangeNotifier for Dispatcher {
    fn publish(&self, event: ChangeEvent) {
        trace!("Publishing {:?}", event);
        self.broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::events::ChangeScope;
    use uuid::Uuid;

    #[tokio::test]
    async fn published_changes_reach_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let event = ChangeEvent::new(Uuid::new_v4(), ChangeScope::Channels);
        dispatcher.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let dispatcher = Dispatcher::new();
        dispatcher.publish(ChangeEvent::new(Uuid::new_v4(), ChangeScope::Members));
        assert_eq!(dispatcher.connection_opened(), 1);
        assert_eq!(dispatcher.connection_closed(), 0);
    }
}
