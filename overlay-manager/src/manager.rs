use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::{NodeId, OverlayError, Packet, Result};
use overlay_device::{Device, DeviceSettings};
use overlay_hub::RoomHub;
use overlay_net::{Arena, Connection, Node};
use tokio::sync::RwLock;
use tracing::info;

use crate::events::{
    PacketTransferListener, StateChangeEvent, StateChangeListener, StateChangeRegistry,
    StateListenerId, TransferListenerId, TransferListenerRegistry,
};

/// What kind of participant an identity names, returned by
/// [`Manager::resolve_node_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Hub,
    Device,
}

/// Owns every hub and device in the mesh and is the sole implementor of
/// [`Arena`] — the seam through which nodes, connections, hubs and devices
/// reach the registry without holding a reference back to it (spec §9's
/// cyclic-graph design note, grounded in `original_source`'s `Manager`).
pub struct Manager {
    hubs: RwLock<HashMap<NodeId, Arc<RoomHub>>>,
    devices: RwLock<HashMap<NodeId, Arc<Device>>>,
    state_listeners: StateChangeRegistry,
    transfer_listeners: TransferListenerRegistry,
}

impl Manager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hubs: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            state_listeners: StateChangeRegistry::new(),
            transfer_listeners: TransferListenerRegistry::new(),
        })
    }

    pub async fn create_room_hub(&self, name: impl Into<String>) -> Arc<RoomHub> {
        let node = Arc::new(Node::new(None));
        let hub = RoomHub::new(name, node.clone());
        node.set_sink(hub.clone()).await;
        self.hubs.write().await.insert(hub.id(), hub.clone());
        info!(hub = %hub.id(), "room hub created");
        self.state_listeners.notify_all(StateChangeEvent::HubCreated(hub.id())).await;
        hub
    }

    pub async fn create_device(&self, name: impl Into<String>, settings: DeviceSettings) -> Arc<Device> {
        let node = Arc::new(Node::new(None));
        let device = Device::new(name, settings, node.clone());
        node.set_sink(device.clone()).await;
        self.devices.write().await.insert(device.id(), device.clone());
        info!(device = %device.id(), "device created");
        self.state_listeners.notify_all(StateChangeEvent::DeviceCreated(device.id())).await;
        device
    }

    pub async fn room_hub(&self, id: NodeId) -> Option<Arc<RoomHub>> {
        self.hubs.read().await.get(&id).cloned()
    }

    pub async fn device(&self, id: NodeId) -> Option<Arc<Device>> {
        self.devices.read().await.get(&id).cloned()
    }

    /// Resolves any known identity to its display name and kind — the
    /// supplemented identity-resolution feature (SPEC_FULL §11), grounded in
    /// `original_source`'s `resolveNodeInfo`.
    pub async fn resolve_node_info(&self, id: NodeId) -> Option<(String, NodeKind)> {
        if let Some(hub) = self.hubs.read().await.get(&id).cloned() {
            return Some((hub.name().await, NodeKind::Hub));
        }
        if let Some(device) = self.devices.read().await.get(&id).cloned() {
            return Some((device.name().await, NodeKind::Device));
        }
        None
    }

    async fn hub_pair(&self, a: NodeId, b: NodeId) -> Result<(Arc<RoomHub>, Arc<RoomHub>)> {
        let hubs = self.hubs.read().await;
        let hub_a = hubs.get(&a).cloned().ok_or(OverlayError::HubNotFound(a))?;
        let hub_b = hubs.get(&b).cloned().ok_or(OverlayError::HubNotFound(b))?;
        Ok((hub_a, hub_b))
    }

    pub async fn connect_room_hubs(&self, a: NodeId, b: NodeId) -> Result<()> {
        let (hub_a, hub_b) = self.hub_pair(a, b).await?;
        if hub_a.is_hub_connected(b).await {
            return Err(OverlayError::AlreadyConnected(a, b));
        }
        self.connect_nodes(a, b).await?;
        hub_a.add_connected_hub(b).await;
        hub_b.add_connected_hub(a).await;
        self.state_listeners.notify_all(StateChangeEvent::HubsConnected(a, b)).await;
        Ok(())
    }

    pub async fn disconnect_room_hubs(&self, a: NodeId, b: NodeId) -> Result<()> {
        let (hub_a, hub_b) = self.hub_pair(a, b).await?;
        if !hub_a.is_hub_connected(b).await {
            return Err(OverlayError::NotConnected(a, b));
        }
        self.disconnect_nodes(a, b).await?;
        hub_a.remove_connected_hub(b).await;
        hub_b.remove_connected_hub(a).await;
        hub_a.remove_routes_for(b).await;
        hub_b.remove_routes_for(a).await;
        self.state_listeners.notify_all(StateChangeEvent::HubsDisconnected(a, b)).await;
        Ok(())
    }

    /// No-op if `device` is already in `hub`; otherwise leaves the current
    /// hub (if any) before joining the new one (grounded in
    /// `original_source`'s `setDeviceHub`).
    pub async fn set_device_hub(&self, device_id: NodeId, hub: NodeId) -> Result<()> {
        let device = self.device(device_id).await.ok_or(OverlayError::DeviceNotFound(device_id))?;
        if device.hub().await == Some(hub) {
            return Ok(());
        }
        if device.hub().await.is_some() {
            device.leave_hub(self).await?;
        }
        device.join_hub(hub, self).await
    }

    pub async fn delete_device(&self, device_id: NodeId) -> Result<()> {
        let device = self.device(device_id).await.ok_or(OverlayError::DeviceNotFound(device_id))?;
        if device.hub().await.is_some() {
            device.leave_hub(self).await?;
        }
        self.devices.write().await.remove(&device_id);
        self.state_listeners.notify_all(StateChangeEvent::DeviceDeleted(device_id)).await;
        Ok(())
    }

    /// Disconnects every peer hub, walks every connected device out first,
    /// then purges any route on a surviving hub that still names this one
    /// (grounded in `original_source`'s `deleteRoomHub`).
    pub async fn delete_room_hub(&self, hub_id: NodeId) -> Result<()> {
        let hub = self.room_hub(hub_id).await.ok_or(OverlayError::HubNotFound(hub_id))?;

        for peer in hub.connected_hubs().await {
            self.disconnect_room_hubs(hub_id, peer).await?;
        }
        for device_id in hub.connected_devices().await {
            if let Some(device) = self.device(device_id).await {
                device.leave_hub(self).await?;
            }
        }

        self.hubs.write().await.remove(&hub_id);
        for other in self.hubs.read().await.values() {
            other.remove_routes_for(hub_id).await;
        }

        self.state_listeners.notify_all(StateChangeEvent::HubDeleted(hub_id)).await;
        Ok(())
    }

    pub async fn register_state_change_listener(&self, listener: Arc<dyn StateChangeListener>) -> StateListenerId {
        self.state_listeners.register(listener).await
    }

    pub async fn unregister_state_change_listener(&self, id: StateListenerId) {
        self.state_listeners.unregister(id).await;
    }

    pub async fn register_packet_transfer_listener(&self, listener: Arc<dyn PacketTransferListener>) -> TransferListenerId {
        self.transfer_listeners.register(listener).await
    }

    pub async fn unregister_packet_transfer_listener(&self, id: TransferListenerId) {
        self.transfer_listeners.unregister(id).await;
    }
}

#[async_trait]
impl Arena for Manager {
    async fn node(&self, id: NodeId) -> Option<Arc<Node>> {
        if let Some(hub) = self.hubs.read().await.get(&id) {
            return Some(hub.node());
        }
        if let Some(device) = self.devices.read().await.get(&id) {
            return Some(device.node());
        }
        None
    }

    async fn notify_transfer(&self, source: NodeId, target: NodeId, packet: &Packet) {
        self.transfer_listeners.notify_all(source, target, packet).await;
    }

    async fn connect_nodes(&self, a: NodeId, b: NodeId) -> Result<()> {
        let node_a = self.node(a).await.ok_or(OverlayError::NodeNotFound(a))?;
        let node_b = self.node(b).await.ok_or(OverlayError::NodeNotFound(b))?;
        let connection = Arc::new(Connection::try_new(a, b)?);
        node_a.add_connection(connection.clone()).await;
        node_b.add_connection(connection).await;
        Ok(())
    }

    async fn disconnect_nodes(&self, a: NodeId, b: NodeId) -> Result<()> {
        let node_a = self.node(a).await.ok_or(OverlayError::NodeNotFound(a))?;
        let node_b = self.node(b).await.ok_or(OverlayError::NodeNotFound(b))?;
        let mut found = false;
        for conn in node_a.connections().await {
            if conn.has_node(b) {
                node_a.remove_connection(conn.id()).await;
                node_b.remove_connection(conn.id()).await;
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(OverlayError::ConnectionNotFound(a, b))
        }
    }

    /// Removes `device` from every hub's membership list, then adds it back
    /// to `hub` if given. Scanning every hub rather than taking the
    /// previous hub as a parameter (unlike `original_source`'s
    /// `onDeviceJoinedHub`/`onDeviceLeftHub`, called with an explicit hub
    /// id) keeps `Arena::notify_device_moved`'s single `Option<NodeId>`
    /// signature sufficient for both join and leave.
    async fn notify_device_moved(&self, device: NodeId, hub: Option<NodeId>) {
        let hubs: Vec<Arc<RoomHub>> = self.hubs.read().await.values().cloned().collect();
        for h in &hubs {
            h.remove_connected_device(device).await;
        }
        if let Some(hub_id) = hub {
            if let Some(h) = hubs.iter().find(|h| h.id() == hub_id) {
                h.add_connected_device(device).await;
            }
        }
        self.state_listeners.notify_all(StateChangeEvent::DeviceMoved { device, hub }).await;
    }

    async fn notify_streaming_changed(&self, device: NodeId, is_streaming: bool) {
        self.state_listeners
            .notify_all(StateChangeEvent::DeviceStreaming { device, is_streaming })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<StateChangeEvent>>,
    }

    #[async_trait]
    impl StateChangeListener for Recorder {
        async fn on_state_change(&self, event: StateChangeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn creating_a_room_hub_emits_hub_created() {
        let manager = Manager::new();
        let recorder = Arc::new(Recorder::default());
        manager.register_state_change_listener(recorder.clone()).await;

        let hub = manager.create_room_hub("lobby").await;

        let events = recorder.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, StateChangeEvent::HubCreated(id) if *id == hub.id())));
    }

    #[tokio::test]
    async fn connecting_hubs_updates_adjacency_both_ways_and_rejects_duplicates() {
        let manager = Manager::new();
        let a = manager.create_room_hub("a").await;
        let b = manager.create_room_hub("b").await;

        manager.connect_room_hubs(a.id(), b.id()).await.unwrap();
        assert!(a.is_hub_connected(b.id()).await);
        assert!(b.is_hub_connected(a.id()).await);

        let err = manager.connect_room_hubs(a.id(), b.id()).await.unwrap_err();
        assert!(matches!(err, OverlayError::AlreadyConnected(_, _)));

        manager.disconnect_room_hubs(a.id(), b.id()).await.unwrap();
        assert!(!a.is_hub_connected(b.id()).await);
        assert!(!b.is_hub_connected(a.id()).await);
    }

    #[tokio::test]
    async fn set_device_hub_moves_a_device_between_hubs() {
        let manager = Manager::new();
        let hub_a = manager.create_room_hub("a").await;
        let hub_b = manager.create_room_hub("b").await;
        let device = manager.create_device("alice", DeviceSettings::default()).await;

        manager.set_device_hub(device.id(), hub_a.id()).await.unwrap();
        assert_eq!(device.hub().await, Some(hub_a.id()));
        assert!(hub_a.is_device_connected(device.id()).await);

        manager.set_device_hub(device.id(), hub_b.id()).await.unwrap();
        assert_eq!(device.hub().await, Some(hub_b.id()));
        assert!(!hub_a.is_device_connected(device.id()).await);
        assert!(hub_b.is_device_connected(device.id()).await);

        manager.set_device_hub(device.id(), hub_b.id()).await.unwrap();
        assert_eq!(device.hub().await, Some(hub_b.id()), "re-setting the same hub is a no-op");
    }

    #[tokio::test]
    async fn deleting_a_hub_moves_its_devices_out_first() {
        let manager = Manager::new();
        let hub = manager.create_room_hub("lobby").await;
        let device = manager.create_device("alice", DeviceSettings::default()).await;
        manager.set_device_hub(device.id(), hub.id()).await.unwrap();

        manager.delete_room_hub(hub.id()).await.unwrap();

        assert_eq!(device.hub().await, None);
        assert!(manager.room_hub(hub.id()).await.is_none());
    }

    #[tokio::test]
    async fn resolves_identity_name_and_kind() {
        let manager = Manager::new();
        let hub = manager.create_room_hub("lobby").await;

        let (name, kind) = manager.resolve_node_info(hub.id()).await.unwrap();
        assert_eq!(name, "lobby");
        assert_eq!(kind, NodeKind::Hub);
        assert!(manager.resolve_node_info(NodeId::new()).await.is_none());
    }
}
