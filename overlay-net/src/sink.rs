use async_trait::async_trait;
use overlay_core::Packet;

use crate::Arena;

/// Whatever owns a `Node` (a `RoomHub` or a `Device`) implements this to
/// receive packets delivered to it. The sink gets the same `Arena` the
/// triggering `Connection::transfer` was called with, so it can turn around
/// and call `Node::send` itself (forwarding, auto-replies) without storing
/// a back-reference to the manager.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn receive(&self, packet: Packet, arena: &dyn Arena);
}
