use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::{NodeId, Packet, Result};

use crate::Node;

/// Everything `Node::send`/`Connection::transfer`/`Device` need from the
/// owner that holds the canonical node/connection registry, without any of
/// them storing a back-reference to it.
///
/// Per the cyclic-graph design note: the manager is the arena; nodes,
/// connections, hubs and devices receive it as a parameter at the point of
/// use instead of holding onto it. `notify_transfer` is the sole hook
/// through which packet transfers become observable; `connect_nodes` /
/// `disconnect_nodes` / `notify_device_moved` are the hooks a `Device`
/// needs to join, leave and move between hubs without ever touching the
/// manager's collections directly. A `RoomHub` only ever uses `node` and
/// `notify_transfer` — its membership lists are mutated by the manager
/// directly, since the manager already holds `Arc<RoomHub>`.
#[async_trait]
pub trait Arena: Send + Sync {
    async fn node(&self, id: NodeId) -> Option<Arc<Node>>;

    async fn notify_transfer(&self, source: NodeId, target: NodeId, packet: &Packet);

    /// Create a connection between two already-registered nodes.
    async fn connect_nodes(&self, a: NodeId, b: NodeId) -> Result<()>;

    /// Remove every connection between two nodes.
    async fn disconnect_nodes(&self, a: NodeId, b: NodeId) -> Result<()>;

    /// Report a device's hub membership change (spec §6 `device.moved`).
    async fn notify_device_moved(&self, device: NodeId, hub: Option<NodeId>);

    /// Report a device entering or leaving an oracle streaming turn (spec
    /// §6 `device.streaming`).
    async fn notify_streaming_changed(&self, device: NodeId, is_streaming: bool);
}
