use std::sync::Arc;

use overlay_core::{NodeId, OverlayError, Packet, Result};
use tokio::sync::RwLock;
use tracing::{trace, warn};

use crate::{Arena, Connection, ConnectionId, PacketSink};

/// A mesh participant: a stable identity plus the set of connections
/// incident on it (spec §4.1).
///
/// Adjacency is the only mutable state here and it is meant to be mutated
/// solely through the owning `Manager` (spec §3's "adjacency is mutable
/// only through the manager") — `add_connection`/`remove_connection` are
/// crate-visible for exactly that reason.
pub struct Node {
    id: NodeId,
    connections: RwLock<Vec<Arc<Connection>>>,
    sink: RwLock<Option<Arc<dyn PacketSink>>>,
}

impl Node {
    pub fn new(sink: Option<Arc<dyn PacketSink>>) -> Self {
        Self {
            id: NodeId::new(),
            connections: RwLock::new(Vec::new()),
            sink: RwLock::new(sink),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Wires the sink after construction — needed because the owner (a
    /// `RoomHub` or `Device`) is itself built from the `Arc<Node>` it owns,
    /// so it cannot exist yet at `Node::new` time.
    pub async fn set_sink(&self, sink: Arc<dyn PacketSink>) {
        *self.sink.write().await = Some(sink);
    }

    pub async fn add_connection(&self, connection: Arc<Connection>) {
        self.connections.write().await.push(connection);
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        self.connections.write().await.retain(|c| c.id() != id);
    }

    /// Snapshot of currently incident connections, in adjacency order.
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.clone()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Decrements `packet.ttl` once, then either unicasts to the first
    /// connection bearing `recipient`, or floods to every incident
    /// connection when `recipient` is `None` (spec §4.1).
    ///
    /// A packet with `ttl == 0` is dropped silently — this is not an error.
    pub async fn send(&self, recipient: Option<NodeId>, mut packet: Packet, arena: &dyn Arena) -> Result<()> {
        if packet.ttl == 0 {
            trace!(sender = %self.id, "dropping packet with exhausted ttl");
            return Ok(());
        }
        packet.ttl -= 1;

        let connections = self.connections().await;

        match recipient {
            Some(target) => {
                for connection in &connections {
                    if connection.has_node(target) {
                        return connection.transfer(self.id, packet, arena).await;
                    }
                }
                Err(OverlayError::NoRoute(target))
            }
            None => {
                for connection in &connections {
                    if let Err(err) = connection.transfer(self.id, packet.clone(), arena).await {
                        warn!(%err, "flood transfer failed on one connection, continuing");
                    }
                }
                Ok(())
            }
        }
    }

    /// Dispatches to the owner's sink, if any; otherwise the packet is
    /// dropped.
    pub async fn receive(&self, packet: Packet, arena: &dyn Arena) {
        let sink = self.sink.read().await.clone();
        if let Some(sink) = sink {
            sink.receive(packet, arena).await;
        } else {
            trace!(node = %self.id, "packet dropped: no sink registered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use overlay_core::ActionType;

    use super::*;

    struct RecordingSink {
        received: Mutex<Vec<Packet>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self { received: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl PacketSink for RecordingSink {
        async fn receive(&self, packet: Packet, _arena: &dyn Arena) {
            self.received.lock().unwrap().push(packet);
        }
    }

    struct TestArena {
        nodes: Vec<Arc<Node>>,
        transfers: Mutex<Vec<(NodeId, NodeId)>>,
    }

    #[async_trait]
    impl Arena for TestArena {
        async fn node(&self, id: NodeId) -> Option<Arc<Node>> {
            self.nodes.iter().find(|n| n.id() == id).cloned()
        }

        async fn notify_transfer(&self, source: NodeId, target: NodeId, _packet: &Packet) {
            self.transfers.lock().unwrap().push((source, target));
        }
        async fn connect_nodes(&self, _a: NodeId, _b: NodeId) -> Result<()> {
            Ok(())
        }
        async fn disconnect_nodes(&self, _a: NodeId, _b: NodeId) -> Result<()> {
            Ok(())
        }
        async fn notify_device_moved(&self, _device: NodeId, _hub: Option<NodeId>) {}
        async fn notify_streaming_changed(&self, _device: NodeId, _is_streaming: bool) {}
    }

    #[tokio::test]
    async fn send_with_exhausted_ttl_is_silently_dropped() {
        let a = Arc::new(Node::new(None));
        let arena = TestArena { nodes: vec![a.clone()], transfers: Mutex::new(vec![]) };
        let packet = Packet::new(ActionType::Talk, a.id()).with_ttl(0);
        assert!(a.send(None, packet, &arena).await.is_ok());
        assert!(arena.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unicast_decrements_ttl_once_and_delivers_to_peer() {
        let sink = RecordingSink::new();
        let a = Arc::new(Node::new(None));
        let b = Arc::new(Node::new(Some(sink.clone())));
        let conn = Arc::new(Connection::try_new(a.id(), b.id()).unwrap());
        a.add_connection(conn.clone()).await;
        b.add_connection(conn).await;

        let arena = TestArena { nodes: vec![a.clone(), b.clone()], transfers: Mutex::new(vec![]) };
        let packet = Packet::new(ActionType::Talk, a.id()).with_recipient(b.id());
        a.send(Some(b.id()), packet, &arena).await.unwrap();

        let received = sink.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].ttl, 127);
    }

    #[tokio::test]
    async fn unicast_without_route_fails() {
        let a = Arc::new(Node::new(None));
        let arena = TestArena { nodes: vec![a.clone()], transfers: Mutex::new(vec![]) };
        let stranger = NodeId::new();
        let packet = Packet::new(ActionType::Talk, a.id()).with_recipient(stranger);
        let err = a.send(Some(stranger), packet, &arena).await.unwrap_err();
        assert!(matches!(err, OverlayError::NoRoute(_)));
    }

    #[tokio::test]
    async fn flood_reaches_every_neighbour() {
        let sink_b = RecordingSink::new();
        let sink_c = RecordingSink::new();
        let a = Arc::new(Node::new(None));
        let b = Arc::new(Node::new(Some(sink_b.clone())));
        let c = Arc::new(Node::new(Some(sink_c.clone())));
        let ab = Arc::new(Connection::try_new(a.id(), b.id()).unwrap());
        let ac = Arc::new(Connection::try_new(a.id(), c.id()).unwrap());
        a.add_connection(ab.clone()).await;
        b.add_connection(ab).await;
        a.add_connection(ac.clone()).await;
        c.add_connection(ac).await;

        let arena = TestArena { nodes: vec![a.clone(), b.clone(), c.clone()], transfers: Mutex::new(vec![]) };
        let packet = Packet::new(ActionType::Ping, a.id());
        a.send(None, packet, &arena).await.unwrap();

        assert_eq!(sink_b.received.lock().unwrap().len(), 1);
        assert_eq!(sink_c.received.lock().unwrap().len(), 1);
    }
}
