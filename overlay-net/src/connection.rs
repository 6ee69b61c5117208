use std::fmt;
use std::str::FromStr;

use overlay_core::{NodeId, OverlayError, Packet, Result};
use tracing::debug;
use uuid::Uuid;

use crate::Arena;

/// Identity of a `Connection`, distinct from `NodeId` even though it is
/// generated the same (time-ordered) way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// An undirected edge between two distinct nodes (spec §4.2).
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    node1: NodeId,
    node2: NodeId,
}

impl Connection {
    /// Fails with `SelfLoop` if `node1 == node2` — a connection is always
    /// between two distinct nodes.
    pub fn try_new(node1: NodeId, node2: NodeId) -> Result<Self> {
        if node1 == node2 {
            return Err(OverlayError::SelfLoop);
        }
        Ok(Self {
            id: ConnectionId::new(),
            node1,
            node2,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.node1 == id || self.node2 == id
    }

    /// The identity on the other end from `id`.
    pub fn peer_of(&self, id: NodeId) -> Result<NodeId> {
        if id == self.node1 {
            Ok(self.node2)
        } else if id == self.node2 {
            Ok(self.node1)
        } else {
            Err(OverlayError::NotOnConnection(id))
        }
    }

    /// Deep-copy the packet, hand it to the peer, and report the transfer
    /// to the arena's observer. Observation failures never block delivery —
    /// `notify_transfer` cannot fail by construction (it has no `Result`).
    pub async fn transfer(&self, sender: NodeId, packet: Packet, arena: &dyn Arena) -> Result<()> {
        let peer_id = self.peer_of(sender)?;
        let copy = packet.clone();

        arena.notify_transfer(sender, peer_id, &copy).await;

        match arena.node(peer_id).await {
            Some(peer) => {
                peer.receive(copy, arena).await;
                Ok(())
            }
            None => {
                debug!(%peer_id, "connection peer vanished from the arena mid-transfer");
                Err(OverlayError::NodeNotFound(peer_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_loop() {
        let n = NodeId::new();
        assert!(matches!(Connection::try_new(n, n), Err(OverlayError::SelfLoop)));
    }

    #[test]
    fn peer_of_resolves_either_end() {
        let a = NodeId::new();
        let b = NodeId::new();
        let conn = Connection::try_new(a, b).unwrap();
        assert_eq!(conn.peer_of(a).unwrap(), b);
        assert_eq!(conn.peer_of(b).unwrap(), a);
    }

    #[test]
    fn peer_of_rejects_unrelated_node() {
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();
        let conn = Connection::try_new(a, b).unwrap();
        assert!(matches!(conn.peer_of(c), Err(OverlayError::NotOnConnection(_))));
    }

    #[test]
    fn connection_ids_round_trip_through_display() {
        let conn = Connection::try_new(NodeId::new(), NodeId::new()).unwrap();
        let parsed: ConnectionId = conn.id().to_string().parse().unwrap();
        assert_eq!(parsed, conn.id());
    }
}
