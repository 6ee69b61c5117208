use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::{NodeId, Packet};
use tokio::sync::RwLock;

/// The closed set of membership/lifecycle changes the manager publishes
/// (spec §6): hub and device lifecycle, hub adjacency, device hub
/// membership and device streaming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeEvent {
    HubCreated(NodeId),
    HubDeleted(NodeId),
    DeviceCreated(NodeId),
    DeviceDeleted(NodeId),
    HubsConnected(NodeId, NodeId),
    HubsDisconnected(NodeId, NodeId),
    DeviceMoved { device: NodeId, hub: Option<NodeId> },
    DeviceStreaming { device: NodeId, is_streaming: bool },
}

pub type StateListenerId = u64;

#[async_trait]
pub trait StateChangeListener: Send + Sync {
    async fn on_state_change(&self, event: StateChangeEvent);
}

/// Registration-ordered, snapshot-iterated listener list — the same shape
/// `overlay_hub::listener::ListenerRegistry` and
/// `overlay_device`'s device-event registry use, duplicated here rather
/// than shared since this crate's vocabulary (manager-wide lifecycle) is
/// unrelated to either of theirs (spec §9's "per owner kind" listener
/// design).
pub(crate) struct StateChangeRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(StateListenerId, Arc<dyn StateChangeListener>)>>,
}

impl StateChangeRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn register(&self, listener: Arc<dyn StateChangeListener>) -> StateListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push((id, listener));
        id
    }

    pub(crate) async fn unregister(&self, id: StateListenerId) {
        self.listeners.write().await.retain(|(existing, _)| *existing != id);
    }

    pub(crate) async fn notify_all(&self, event: StateChangeEvent) {
        let snapshot = self.listeners.read().await.clone();
        for (_, listener) in snapshot {
            listener.on_state_change(event).await;
        }
    }
}

pub type TransferListenerId = u64;

/// Observes every packet transfer across the whole mesh — distinct from a
/// single `RoomHub`'s local `PacketListener`, which only sees packets that
/// hub itself forwards (spec §4.5's `registerPacketTransferListener`).
#[async_trait]
pub trait PacketTransferListener: Send + Sync {
    async fn on_transfer(&self, source: NodeId, target: NodeId, packet: &Packet);
}

pub(crate) struct TransferListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(TransferListenerId, Arc<dyn PacketTransferListener>)>>,
}

impl TransferListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn register(&self, listener: Arc<dyn PacketTransferListener>) -> TransferListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push((id, listener));
        id
    }

    pub(crate) async fn unregister(&self, id: TransferListenerId) {
        self.listeners.write().await.retain(|(existing, _)| *existing != id);
    }

    pub(crate) async fn notify_all(&self, source: NodeId, target: NodeId, packet: &Packet) {
        let snapshot = self.listeners.read().await.clone();
        for (_, listener) in snapshot {
            listener.on_transfer(source, target, packet).await;
        }
    }
}
