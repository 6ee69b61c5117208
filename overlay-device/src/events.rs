use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::NodeId;
use overlay_oracle::ToolCall;
use tokio::sync::RwLock;

/// One step of the reasoning loop, surfaced for observability (spec §4.4
/// step (g)). `Transcript` is the supplemented "mirror the rolling log"
/// feature (§11 of SPEC_FULL) — an observable substitute for the original's
/// `logs/{uuid}.json` file write, keeping the core free of filesystem I/O.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    UserMessage(String),
    AssistantDelta(String),
    AssistantMessage(String),
    AssistantToolCall(ToolCall),
    ToolResult { tool_call_id: String, result: String },
    AssistantInterrupted,
    ContactsDirectory(Vec<(String, NodeId)>),
    Transcript(Vec<String>),
}

pub type DeviceListenerId = u64;

#[async_trait]
pub trait DeviceEventListener: Send + Sync {
    async fn on_event(&self, device: NodeId, event: DeviceEvent);
}

/// Registration-ordered, snapshot-iterated listener list — the same shape
/// as `overlay_hub::listener::ListenerRegistry`, kept as its own small copy
/// here since a device's event vocabulary is unrelated to a hub's packet
/// listeners (spec §9: "a small event bus component with typed events
/// rather than scattered callback lists", applied per owner kind).
pub(crate) struct DeviceListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(DeviceListenerId, Arc<dyn DeviceEventListener>)>>,
}

impl DeviceListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn register(&self, listener: Arc<dyn DeviceEventListener>) -> DeviceListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push((id, listener));
        id
    }

    pub(crate) async fn unregister(&self, id: DeviceListenerId) {
        self.listeners.write().await.retain(|(existing, _)| *existing != id);
    }

    pub(crate) async fn notify_all(&self, device: NodeId, event: DeviceEvent) {
        let snapshot = self.listeners.read().await.clone();
        for (_, listener) in snapshot {
            listener.on_event(device, event.clone()).await;
        }
    }
}
