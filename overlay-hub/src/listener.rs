use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::Packet;
use tokio::sync::RwLock;

pub type ListenerId = u64;

/// Observes every packet a hub receives, before per-type dispatch (spec
/// §4.3's "First, publish `p` to all local packet listeners").
#[async_trait]
pub trait PacketListener: Send + Sync {
    async fn on_packet(&self, packet: Packet);
}

/// Registration-ordered, snapshot-iterated listener list. A handle-based
/// registry rather than `Arc::ptr_eq` comparisons, so deregistration during
/// dispatch is always safe (spec §4.5: "deregistration during dispatch must
/// be safe — iterate over a snapshot").
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn PacketListener>)>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn register(&self, listener: Arc<dyn PacketListener>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push((id, listener));
        id
    }

    pub(crate) async fn unregister(&self, id: ListenerId) {
        self.listeners.write().await.retain(|(existing, _)| *existing != id);
    }

    pub(crate) async fn notify_all(&self, packet: &Packet) {
        let snapshot = self.listeners.read().await.clone();
        for (_, listener) in snapshot {
            listener.on_packet(packet.clone()).await;
        }
    }
}
