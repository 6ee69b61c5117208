//! End-to-end scenarios driving `Manager` + `overlay-device` + `overlay-hub`
//! together, the way `overlay-bin` wires them for real but with scripted
//! oracles and direct assertions instead of a terminal (spec §8).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use overlay_core::{ActionType, NodeId, Packet};
use overlay_device::DeviceSettings;
use overlay_manager::{Manager, PacketTransferListener, StateChangeEvent, StateChangeListener};
use overlay_net::{Arena, PacketSink};
use overlay_oracle::{MockOracle, StreamEvent, ToolCall};
use tokio::sync::Mutex;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<StateChangeEvent>>,
}

#[async_trait]
impl StateChangeListener for Recorder {
    async fn on_state_change(&self, event: StateChangeEvent) {
        self.events.lock().await.push(event);
    }
}

#[derive(Default)]
struct HopRecorder {
    hops: Mutex<Vec<(NodeId, NodeId, Packet)>>,
}

#[async_trait]
impl PacketTransferListener for HopRecorder {
    async fn on_transfer(&self, source: NodeId, target: NodeId, packet: &Packet) {
        self.hops.lock().await.push((source, target, packet.clone()));
    }
}

/// Connecting two hubs and moving a device between them emits the expected
/// lifecycle events in order, and a disconnect tears adjacency back down.
#[tokio::test]
async fn hub_topology_changes_emit_ordered_events() {
    let manager = Manager::new();
    let recorder = Arc::new(Recorder::default());
    manager.register_state_change_listener(recorder.clone()).await;

    let lobby = manager.create_room_hub("lobby").await;
    let annex = manager.create_room_hub("annex").await;
    manager.connect_room_hubs(lobby.id(), annex.id()).await.unwrap();

    let device = manager.create_device("alice", DeviceSettings { run_ai: false, ..Default::default() }).await;
    manager.set_device_hub(device.id(), lobby.id()).await.unwrap();
    manager.set_device_hub(device.id(), annex.id()).await.unwrap();
    manager.disconnect_room_hubs(lobby.id(), annex.id()).await.unwrap();

    let events = recorder.events.lock().await.clone();
    assert!(matches!(events[0], StateChangeEvent::HubCreated(id) if id == lobby.id()));
    assert!(matches!(events[1], StateChangeEvent::HubCreated(id) if id == annex.id()));
    assert!(matches!(events[2], StateChangeEvent::HubsConnected(a, b) if a == lobby.id() && b == annex.id()));
    assert!(matches!(events[3], StateChangeEvent::DeviceCreated(id) if id == device.id()));
    assert!(matches!(
        events[4],
        StateChangeEvent::DeviceMoved { device: d, hub: Some(h) } if d == device.id() && h == lobby.id()
    ));
    assert!(matches!(
        events[5],
        StateChangeEvent::DeviceMoved { device: d, hub: Some(h) } if d == device.id() && h == annex.id()
    ));
    assert!(matches!(events[6], StateChangeEvent::HubsDisconnected(a, b) if a == lobby.id() && b == annex.id()));

    assert!(!lobby.is_hub_connected(annex.id()).await);
    assert!(annex.is_device_connected(device.id()).await);
}

/// A TEXT sent across a two-hop hub chain (lobby -- hallway -- annex)
/// resolves through discovery and lands at the far device, and the route
/// it discovers survives a second send without re-flooding.
#[tokio::test]
async fn text_discovers_a_route_across_two_hops() {
    let manager = Manager::new();
    let lobby = manager.create_room_hub("lobby").await;
    let hallway = manager.create_room_hub("hallway").await;
    let annex = manager.create_room_hub("annex").await;
    manager.connect_room_hubs(lobby.id(), hallway.id()).await.unwrap();
    manager.connect_room_hubs(hallway.id(), annex.id()).await.unwrap();

    let alice = manager.create_device("alice", DeviceSettings { run_ai: false, ..Default::default() }).await;
    let bob = manager.create_device("bob", DeviceSettings { run_ai: false, ..Default::default() }).await;
    manager.set_device_hub(alice.id(), lobby.id()).await.unwrap();
    manager.set_device_hub(bob.id(), annex.id()).await.unwrap();

    let hops = Arc::new(HopRecorder::default());
    manager.register_packet_transfer_listener(hops.clone()).await;

    let arena: Arc<dyn Arena> = manager.clone();
    alice.register_contact("bob", bob.id()).await.unwrap();

    let packet = Packet::new(ActionType::Text, alice.id()).with_recipient(bob.id()).with_context("hello from the lobby");
    alice.send_packet(packet, arena.as_ref()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let recorded = hops.hops.lock().await.clone();
    assert!(
        recorded.iter().any(|(_, target, _)| *target == bob.id()),
        "the text packet must eventually hop onto bob's node: {recorded:?}"
    );
    assert!(hallway.lookup_route(annex.id()).await.is_some(), "hallway should have learned a route to annex via discovery");

    let hops_before = hops.hops.lock().await.len();
    let packet = Packet::new(ActionType::Text, alice.id()).with_recipient(bob.id()).with_context("second message, route already known");
    alice.send_packet(packet, arena.as_ref()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(hops.hops.lock().await.len() > hops_before, "a second send over the now-known route must still deliver");
}

/// A WHISPER between two devices in the same room is not visible to a
/// third device sharing that room: only the addressed device sees the
/// context, everyone else only sees that a whisper happened.
#[tokio::test]
async fn whisper_is_redacted_for_bystanders() {
    let manager = Manager::new();
    let lobby = manager.create_room_hub("lobby").await;

    let alice = manager.create_device("alice", DeviceSettings { run_ai: false, ..Default::default() }).await;
    let bob = manager.create_device("bob", DeviceSettings { run_ai: false, ..Default::default() }).await;
    let carol = manager.create_device("carol", DeviceSettings { run_ai: false, ..Default::default() }).await;
    manager.set_device_hub(alice.id(), lobby.id()).await.unwrap();
    manager.set_device_hub(bob.id(), lobby.id()).await.unwrap();
    manager.set_device_hub(carol.id(), lobby.id()).await.unwrap();

    alice.register_contact("bob", bob.id()).await.unwrap();

    let hops = Arc::new(HopRecorder::default());
    manager.register_packet_transfer_listener(hops.clone()).await;

    let arena: Arc<dyn Arena> = manager.clone();
    let whisper = Packet::new(ActionType::Whisper, alice.id()).with_recipient(bob.id()).with_context("a secret");
    alice.send_packet(whisper, arena.as_ref()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let recorded = hops.hops.lock().await.clone();
    let to_bob = recorded.iter().find(|(_, target, p)| *target == bob.id() && p.kind == ActionType::Whisper);
    let to_carol = recorded.iter().find(|(_, target, p)| *target == carol.id() && p.kind == ActionType::Whisper);

    assert_eq!(to_bob.expect("bob must receive the addressed whisper").2.context.as_deref(), Some("a secret"));
    assert_eq!(to_carol.expect("carol must still see that a whisper happened").2.context, None);
}

/// `moveToRoom` followed by an `OK` connect-check completes the move and
/// the device ends up a member of the new room only.
#[tokio::test]
async fn move_to_room_ok_relocates_the_device() {
    let manager = Manager::new();
    let lobby = manager.create_room_hub("lobby").await;
    let annex = manager.create_room_hub("annex").await;
    manager.connect_room_hubs(lobby.id(), annex.id()).await.unwrap();

    let alice = manager.create_device("alice", DeviceSettings { run_ai: false, ..Default::default() }).await;
    manager.set_device_hub(alice.id(), lobby.id()).await.unwrap();

    let arena: Arc<dyn Arena> = manager.clone();
    alice.move_hub(annex.id(), arena.as_ref()).await.unwrap();

    let response = Packet::new(ActionType::ConnectCheckResponse, annex.id()).with_context("OK");
    alice.receive(response, arena.as_ref()).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(alice.hub().await, Some(annex.id()));
    assert!(!lobby.is_device_connected(alice.id()).await);
    assert!(annex.is_device_connected(alice.id()).await);
}

/// `moveToRoom` against a hub that rejects the connect check leaves the
/// device exactly where it was.
#[tokio::test]
async fn move_to_room_not_ok_leaves_the_device_put() {
    let manager = Manager::new();
    let lobby = manager.create_room_hub("lobby").await;
    let annex = manager.create_room_hub("annex").await;
    manager.connect_room_hubs(lobby.id(), annex.id()).await.unwrap();

    let alice = manager.create_device("alice", DeviceSettings { run_ai: false, ..Default::default() }).await;
    manager.set_device_hub(alice.id(), lobby.id()).await.unwrap();

    let arena: Arc<dyn Arena> = manager.clone();
    alice.move_hub(annex.id(), arena.as_ref()).await.unwrap();

    let response = Packet::new(ActionType::ConnectCheckResponse, annex.id()).with_context("NOT_OK");
    alice.receive(response, arena.as_ref()).await;

    assert_eq!(alice.hub().await, Some(lobby.id()));
    assert!(lobby.is_device_connected(alice.id()).await);
    assert!(!annex.is_device_connected(alice.id()).await);
}

/// A scripted reasoning device joined to a room dispatches a `talk` tool
/// call the oracle hands it, driven through the real manager/hub stack
/// rather than the bare `NullArena` double `overlay-device`'s own tests use.
#[tokio::test]
async fn reasoning_device_talks_through_a_real_hub() {
    let manager = Manager::new();
    let lobby = manager.create_room_hub("lobby").await;
    let alice = manager
        .create_device("alice", DeviceSettings { time_out: Duration::from_millis(200), ..Default::default() })
        .await;
    manager.set_device_hub(alice.id(), lobby.id()).await.unwrap();

    let oracle = Arc::new(MockOracle::new(vec![vec![
        StreamEvent::ToolCallFinished(ToolCall {
            id: "call-1".into(),
            name: "talk".into(),
            arguments: r#"{"context":"hello room"}"#.into(),
        }),
        StreamEvent::Done,
    ]]));
    let arena: Arc<dyn Arena> = manager.clone();

    let handle = alice.spawn_reasoning_loop(oracle.clone(), arena, "an empty lobby");
    tokio::time::sleep(Duration::from_millis(350)).await;
    handle.abort();

    let calls = oracle.recorded_calls().await;
    assert!(!calls.is_empty(), "the oracle must have been asked for a completion at least once");
}
