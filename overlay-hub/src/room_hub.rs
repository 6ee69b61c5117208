use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use overlay_core::{ActionType, NodeId, Packet};
use overlay_net::{Arena, Node, PacketSink};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::listener::{ListenerId, ListenerRegistry, PacketListener};
use crate::route_table::{RouteTableItem, StoredRoute};

/// The forwarding engine, route table and discovery state machine for one
/// room (spec §4.3). Owns a `Node`; all mutable state here is guarded by
/// per-field locks rather than one giant mutex, matching the concurrency
/// model's "per-hub lock" guidance while keeping the lock scope narrow
/// enough that a `send -> transfer -> receive -> re-send` chain through this
/// same hub never needs to re-enter a lock it already holds (every lock is
/// released before `Node::send` is awaited).
pub struct RoomHub {
    node: Arc<Node>,
    name: RwLock<String>,
    connected_hubs: RwLock<Vec<NodeId>>,
    connected_devices: RwLock<Vec<NodeId>>,
    route_table: RwLock<Vec<StoredRoute>>,
    /// Packet awaiting a resolved route, keyed by destination. Stands in
    /// for the spec's generic `onRouteFound` callback: in this system the
    /// only caller of `find_route` is TEXT forwarding, so the "callback" is
    /// simply "send this packet once the route appears" (spec §4.3.2,
    /// §4.3.4). Registering a new one for the same destination overwrites
    /// the previous, per spec.
    pending_routes: RwLock<HashMap<NodeId, Packet>>,
    listeners: ListenerRegistry,
}

impl RoomHub {
    /// Two-phase construction: the caller creates the underlying `Node`
    /// (via the manager/arena), builds the hub around it, then wires the
    /// node's sink back to the hub with `Node::set_sink` — see
    /// `overlay-manager` for the wiring.
    pub fn new(name: impl Into<String>, node: Arc<Node>) -> Arc<Self> {
        Arc::new(Self {
            node,
            name: RwLock::new(name.into()),
            connected_hubs: RwLock::new(Vec::new()),
            connected_devices: RwLock::new(Vec::new()),
            route_table: RwLock::new(Vec::new()),
            pending_routes: RwLock::new(HashMap::new()),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn node(&self) -> Arc<Node> {
        self.node.clone()
    }

    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    pub async fn connected_hubs(&self) -> Vec<NodeId> {
        self.connected_hubs.read().await.clone()
    }

    pub async fn connected_devices(&self) -> Vec<NodeId> {
        self.connected_devices.read().await.clone()
    }

    pub async fn is_hub_connected(&self, hub: NodeId) -> bool {
        self.connected_hubs.read().await.contains(&hub)
    }

    pub async fn is_device_connected(&self, device: NodeId) -> bool {
        self.connected_devices.read().await.contains(&device)
    }

    /// Mirrored symmetrically by the manager on both hubs when connecting.
    pub async fn add_connected_hub(&self, hub: NodeId) {
        let mut hubs = self.connected_hubs.write().await;
        if !hubs.contains(&hub) {
            hubs.push(hub);
        }
    }

    pub async fn remove_connected_hub(&self, hub: NodeId) {
        self.connected_hubs.write().await.retain(|h| *h != hub);
    }

    pub async fn add_connected_device(&self, device: NodeId) {
        let mut devices = self.connected_devices.write().await;
        if !devices.contains(&device) {
            devices.push(device);
        }
    }

    pub async fn remove_connected_device(&self, device: NodeId) {
        self.connected_devices.write().await.retain(|d| *d != device);
    }

    pub async fn register_packet_listener(&self, listener: Arc<dyn PacketListener>) -> ListenerId {
        self.listeners.register(listener).await
    }

    pub async fn unregister_packet_listener(&self, id: ListenerId) {
        self.listeners.unregister(id).await
    }

    /// Synthetic direct-adjacency route: cost 1, next hop is the
    /// destination itself (spec §4.3's hub/connectedDevices invariant).
    async fn synthetic_route(&self, destination: NodeId) -> Option<RouteTableItem> {
        if self.connected_hubs.read().await.contains(&destination)
            || self.connected_devices.read().await.contains(&destination)
        {
            return Some(RouteTableItem {
                destination,
                next_hop: destination,
                cost: 1,
            });
        }
        None
    }

    async fn stored_route(&self, destination: NodeId) -> Option<RouteTableItem> {
        let now = Instant::now();
        self.route_table
            .read()
            .await
            .iter()
            .find(|r| r.destination == destination && r.is_live(now))
            .map(StoredRoute::as_item)
    }

    /// Precedence: connected hub, then connected device, then the first
    /// non-expired route-table entry (spec §4.3.1).
    pub async fn lookup_route(&self, destination: NodeId) -> Option<RouteTableItem> {
        if let Some(route) = self.synthetic_route(destination).await {
            return Some(route);
        }
        self.stored_route(destination).await
    }

    /// Directly-adjacent destinations are never persisted — a synthetic
    /// match means this call is a no-op (spec §4.3.3).
    async fn add_route(&self, destination: NodeId, next_hop: NodeId, cost: u32) {
        if self.synthetic_route(destination).await.is_some() {
            return;
        }
        let mut table = self.route_table.write().await;
        if let Some(existing) = table.iter_mut().find(|r| r.destination == destination) {
            if cost < existing.cost {
                existing.next_hop = next_hop;
                existing.cost = cost;
                existing.expires = Instant::now() + crate::route_table::ROUTE_TTL;
            }
        } else {
            table.push(StoredRoute::fresh(destination, next_hop, cost));
        }
    }

    /// Purges every entry touching `target` and any pending route request
    /// waiting on it (spec §4.3.4).
    pub async fn remove_routes_for(&self, target: NodeId) {
        self.route_table
            .write()
            .await
            .retain(|r| r.destination != target && r.next_hop != target);
        self.pending_routes.write().await.remove(&target);
    }

    /// If a route is already known, forwards `packet` to `destination`
    /// immediately. Otherwise defers `packet` until a `DISCOVERY_RESPONSE`
    /// resolves it, and floods a `DISCOVERY_REQUEST` to every neighbour
    /// (spec §4.3.2). A `destination` equal to this hub is a no-op.
    async fn find_route(&self, destination: NodeId, packet: Packet, arena: &dyn Arena) {
        if destination == self.id() {
            return;
        }
        if let Some(route) = self.lookup_route(destination).await {
            if let Err(err) = self.node.send(Some(route.next_hop), packet, arena).await {
                warn!(%err, %destination, "failed to forward packet on known route");
            }
            return;
        }
        self.pending_routes.write().await.insert(destination, packet);
        let request = Packet::new(ActionType::DiscoveryRequest, self.id())
            .with_recipient(destination)
            .with_context(self.id().to_string());
        if let Err(err) = self.node.send(None, request, arena).await {
            warn!(%err, %destination, "failed to flood discovery request");
        }
    }

    pub async fn on_packet_received(&self, packet: Packet, arena: &dyn Arena) {
        trace!(hub = %self.name().await, kind = ?packet.kind, "hub received packet");
        self.listeners.notify_all(&packet).await;

        match packet.kind {
            ActionType::DiscoveryRequest => self.handle_discovery_request(packet, arena).await,
            ActionType::DiscoveryResponse => self.handle_discovery_response(packet, arena).await,
            ActionType::ConnectCheckRequest => self.handle_connect_check_request(packet, arena).await,
            ActionType::ConnectCheckResponse => {}
            ActionType::AdjacentHubsRequest => self.handle_adjacent_hubs_request(packet, arena).await,
            ActionType::AdjacentHubsResponse => {}
            ActionType::HubNameRequest => self.handle_hub_name_request(packet, arena).await,
            ActionType::HubNameResponse => {}
            ActionType::Ping => self.handle_ping(packet, arena).await,
            ActionType::Text => self.handle_text(packet, arena).await,
            _ => self.handle_default_broadcast(packet, arena).await,
        }
    }

    async fn handle_discovery_request(&self, packet: Packet, arena: &dyn Arena) {
        let Some(recipient) = packet.recipient else { return };
        let Some(last_hop) = packet.context_as_node_id() else {
            debug!("dropping DISCOVERY_REQUEST with unparseable context");
            return;
        };
        self.add_route(packet.sender, last_hop, packet.cost()).await;

        if let Some(route) = self.lookup_route(recipient).await {
            let response = Packet::new(ActionType::DiscoveryResponse, recipient)
                .with_recipient(packet.sender)
                .with_context(self.id().to_string())
                .with_ttl(packet.original_ttl.saturating_sub(route.cost));
            if let Err(err) = self.node.send(Some(last_hop), response, arena).await {
                warn!(%err, "failed to answer DISCOVERY_REQUEST directly");
            }
        } else {
            let mut relayed = packet.clone();
            relayed.context = Some(self.id().to_string());
            for hub in self.connected_hubs.read().await.iter().copied() {
                if hub == last_hop {
                    continue;
                }
                if let Err(err) = self.node.send(Some(hub), relayed.clone(), arena).await {
                    warn!(%err, %hub, "failed to relay DISCOVERY_REQUEST");
                }
            }
        }
    }

    async fn handle_discovery_response(&self, mut packet: Packet, arena: &dyn Arena) {
        let Some(recipient) = packet.recipient else { return };
        let Some(last_hop) = packet.context_as_node_id() else {
            debug!("dropping DISCOVERY_RESPONSE with unparseable context");
            return;
        };
        self.add_route(packet.sender, last_hop, packet.cost()).await;

        if let Some(route) = self.lookup_route(recipient).await {
            packet.context = Some(self.id().to_string());
            if let Err(err) = self.node.send(Some(route.next_hop), packet.clone(), arena).await {
                warn!(%err, "failed to relay DISCOVERY_RESPONSE");
            }
        }

        if let Some(pending) = self.pending_routes.write().await.remove(&packet.sender) {
            if let Err(err) = self.node.send(Some(last_hop), pending, arena).await {
                warn!(%err, "failed to forward packet once route resolved");
            }
        }
    }

    async fn handle_connect_check_request(&self, packet: Packet, arena: &dyn Arena) {
        let Some(recipient) = packet.recipient else { return };
        let known = self.is_device_connected(recipient).await || self.is_hub_connected(recipient).await;
        let response = Packet::new(ActionType::ConnectCheckResponse, recipient)
            .with_recipient(packet.sender)
            .with_context(if known { "OK" } else { "NOT_OK" });
        if let Err(err) = self.node.send(Some(packet.sender), response, arena).await {
            warn!(%err, "failed to answer CONNECT_CHECK_REQUEST");
        }
    }

    async fn handle_adjacent_hubs_request(&self, packet: Packet, arena: &dyn Arena) {
        let hubs: Vec<String> = self.connected_hubs.read().await.iter().map(NodeId::to_string).collect();
        let response = Packet::new(ActionType::AdjacentHubsResponse, self.id())
            .with_recipient(packet.sender)
            .with_context(json!({ "hubs": hubs }).to_string());
        if let Err(err) = self.node.send(Some(packet.sender), response, arena).await {
            warn!(%err, "failed to answer ADJACENT_HUBS_REQUEST");
        }
    }

    async fn handle_hub_name_request(&self, packet: Packet, arena: &dyn Arena) {
        let response = Packet::new(ActionType::HubNameResponse, self.id())
            .with_recipient(packet.sender)
            .with_context(self.name().await);
        if let Err(err) = self.node.send(Some(packet.sender), response, arena).await {
            warn!(%err, "failed to answer HUB_NAME_REQUEST");
        }
    }

    async fn handle_ping(&self, packet: Packet, arena: &dyn Arena) {
        match packet.recipient {
            None => {
                for device in self.connected_devices.read().await.iter().copied() {
                    if let Err(err) = self.node.send(Some(device), packet.clone(), arena).await {
                        warn!(%err, %device, "failed to relay PING");
                    }
                }
            }
            Some(recipient) if self.is_device_connected(recipient).await => {
                if let Err(err) = self.node.send(Some(recipient), packet.clone(), arena).await {
                    warn!(%err, "failed to relay directed PING");
                }
            }
            Some(_) => {}
        }
    }

    async fn handle_text(&self, packet: Packet, arena: &dyn Arena) {
        let Some(recipient) = packet.recipient else { return };
        self.find_route(recipient, packet.clone(), arena).await;

        if self.is_device_connected(packet.sender).await {
            let mut redacted = packet.clone();
            redacted.recipient = None;
            redacted.context = None;
            for device in self.connected_devices.read().await.iter().copied() {
                if device == packet.sender {
                    continue;
                }
                if let Err(err) = self.node.send(Some(device), redacted.clone(), arena).await {
                    warn!(%err, %device, "failed to broadcast text visibility notice");
                }
            }
        }
    }

    async fn handle_default_broadcast(&self, packet: Packet, arena: &dyn Arena) {
        if !self.is_device_connected(packet.sender).await {
            if packet.kind == ActionType::Join {
                self.add_connected_device(packet.sender).await;
            } else {
                return;
            }
        }

        if let Some(recipient) = packet.recipient {
            if self.is_device_connected(recipient).await {
                if let Err(err) = self.node.send(Some(recipient), packet.clone(), arena).await {
                    warn!(%err, "failed to deliver packet to recipient");
                }
            }
        }

        let mut broadcast = packet.clone();
        if packet.kind == ActionType::Whisper {
            broadcast.context = None;
        } else if packet.kind == ActionType::Leave {
            self.remove_connected_device(packet.sender).await;
        }

        for device in self.connected_devices.read().await.iter().copied() {
            if Some(device) == packet.recipient || device == packet.sender {
                continue;
            }
            if let Err(err) = self.node.send(Some(device), broadcast.clone(), arena).await {
                warn!(%err, %device, "failed to broadcast packet");
            }
        }
    }
}

#[async_trait]
impl PacketSink for RoomHub {
    async fn receive(&self, packet: Packet, arena: &dyn Arena) {
        self.on_packet_received(packet, arena).await;
    }
}
