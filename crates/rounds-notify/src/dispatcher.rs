use tokio::sync::broadcast;

use rounds_types::events::Invalidation;

/// Fan-out hub for invalidation events. Mutations publish here after their
/// transaction commits; every connected event-stream client gets a copy.
/// Send errors are ignored on purpose: no subscribers is a valid state.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<Invalidation>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    /// Subscribe to invalidation events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.broadcast_tx.subscribe()
    }

    /// Publish an invalidation to all connected clients.
    pub fn broadcast(&self, event: Invalidation) {
        let _ = self.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
