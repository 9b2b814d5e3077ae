use std::collections::HashMap;

use {
    tokio::sync::mpsc::{self, error::TrySendError},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

/// Depth of the hub's own intake channels.
const HUB_CHANNEL_DEPTH: usize = 32;

/// The hub's view of one connected websocket client: its id and the bounded
/// queue drained by the client's write pump. Dropping the handle closes the
/// queue, which the write pump takes as "send a close frame and stop".
pub struct ClientHandle {
    pub conn_id: String,
    pub sender: mpsc::Sender<String>,
}

/// Registry of active websocket clients.
///
/// All client-set mutation happens on the hub task; the rest of the system
/// talks to it through a [`HubHandle`]. A client whose queue is full at
/// broadcast time is unresponsive and gets dropped rather than slowing the
/// other clients down.
pub struct Hub {
    clients: HashMap<String, ClientHandle>,
    register_rx: mpsc::Receiver<ClientHandle>,
    unregister_rx: mpsc::Receiver<String>,
    broadcast_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

/// Cloneable intake for the hub task.
#[derive(Clone)]
pub struct HubHandle {
    register: mpsc::Sender<ClientHandle>,
    unregister: mpsc::Sender<String>,
    broadcast: mpsc::Sender<String>,
}

impl Hub {
    #[must_use]
    pub fn new(cancel: CancellationToken) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(HUB_CHANNEL_DEPTH);
        let (unregister_tx, unregister_rx) = mpsc::channel(HUB_CHANNEL_DEPTH);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(HUB_CHANNEL_DEPTH);
        (
            Self {
                clients: HashMap::new(),
                register_rx,
                unregister_rx,
                broadcast_rx,
                cancel,
            },
            HubHandle {
                register: register_tx,
                unregister: unregister_tx,
                broadcast: broadcast_tx,
            },
        )
    }

    /// Run until cancelled. Dropping the hub closes every client queue,
    /// letting the write pumps finish cleanly.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(client) = self.register_rx.recv() => {
                    debug!(conn_id = %client.conn_id, "client registered");
                    self.clients.insert(client.conn_id.clone(), client);
                },
                Some(conn_id) = self.unregister_rx.recv() => {
                    if self.clients.remove(&conn_id).is_some() {
                        debug!(conn_id = %conn_id, "client unregistered");
                    }
                },
                Some(frame) = self.broadcast_rx.recv() => {
                    self.clients.retain(|conn_id, client| {
                        match client.sender.try_send(frame.clone()) {
                            Ok(()) => true,
                            Err(TrySendError::Full(_)) => {
                                warn!(conn_id = %conn_id, "client unresponsive, dropping");
                                false
                            },
                            Err(TrySendError::Closed(_)) => false,
                        }
                    });
                },
                else => break,
            }
        }
        debug!(clients = self.clients.len(), "hub stopped");
    }
}

impl HubHandle {
    pub async fn register(&self, client: ClientHandle) {
        if self.register.send(client).await.is_err() {
            warn!("hub gone, register dropped");
        }
    }

    pub async fn unregister(&self, conn_id: &str) {
        if self.unregister.send(conn_id.to_string()).await.is_err() {
            warn!("hub gone, unregister dropped");
        }
    }

    /// Queue one serialized envelope for every connected client.
    pub async fn broadcast(&self, frame: String) {
        if self.broadcast.send(frame).await.is_err() {
            warn!("hub gone, broadcast dropped");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: &str, depth: usize) -> (ClientHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(depth);
        (
            ClientHandle {
                conn_id: id.into(),
                sender: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client_in_order() {
        let cancel = CancellationToken::new();
        let (hub, handle) = Hub::new(cancel.clone());
        tokio::spawn(hub.run());

        let (a, mut a_rx) = client("a", 8);
        let (b, mut b_rx) = client("b", 8);
        handle.register(a).await;
        handle.register(b).await;

        handle.broadcast("one".into()).await;
        handle.broadcast("two".into()).await;

        assert_eq!(a_rx.recv().await.unwrap(), "one");
        assert_eq!(a_rx.recv().await.unwrap(), "two");
        assert_eq!(b_rx.recv().await.unwrap(), "one");
        assert_eq!(b_rx.recv().await.unwrap(), "two");
        cancel.cancel();
    }

    #[tokio::test]
    async fn stuck_client_is_dropped_while_others_deliver() {
        let cancel = CancellationToken::new();
        let (hub, handle) = Hub::new(cancel.clone());
        tokio::spawn(hub.run());

        let (stuck, mut stuck_rx) = client("stuck", 1);
        let (healthy, mut healthy_rx) = client("healthy", 8);
        handle.register(stuck).await;
        handle.register(healthy).await;

        // First frame fills the stuck client's queue; the second overflows it.
        handle.broadcast("one".into()).await;
        handle.broadcast("two".into()).await;
        handle.broadcast("three".into()).await;

        assert_eq!(healthy_rx.recv().await.unwrap(), "one");
        assert_eq!(healthy_rx.recv().await.unwrap(), "two");
        assert_eq!(healthy_rx.recv().await.unwrap(), "three");

        // The stuck client got the one queued frame, then its queue closed.
        assert_eq!(stuck_rx.recv().await.unwrap(), "one");
        assert!(stuck_rx.recv().await.is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn unregister_closes_the_client_queue() {
        let cancel = CancellationToken::new();
        let (hub, handle) = Hub::new(cancel.clone());
        tokio::spawn(hub.run());

        let (c, mut rx) = client("c", 8);
        handle.register(c).await;
        handle.unregister("c").await;

        assert!(rx.recv().await.is_none());

        // A later broadcast must not resurrect it.
        handle.broadcast("after".into()).await;
        cancel.cancel();
    }
}
