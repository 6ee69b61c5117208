use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use overlay_core::{ActionType, NodeId, OverlayError, Packet, Result};
use overlay_net::{Arena, Node, PacketSink};
use overlay_oracle::{ChatMessage, ChatOracle, StreamEvent, ToolCall};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::contacts::ContactDirectory;
use crate::events::{DeviceEvent, DeviceEventListener, DeviceListenerId, DeviceListenerRegistry};
use crate::gate::{ReasoningGate, THINKING_REQUIRED_REMINDER};
use crate::interrupt::should_interrupt;
use crate::prompt::system_prompt;
use crate::settings::DeviceSettings;
use crate::tools::catalogue;
use crate::transcript::{age_out, render_inbox, render_transcript, TimestampedMessage};

/// Wraps a tool-result string in the `{"message": "..."}` envelope the
/// oracle actually receives as a tool result (spec §6; `original_source`'s
/// `ai_device.py` wraps every `replyMessage` the same way before handing it
/// back as the tool-call response).
fn tool_reply(message: impl Into<String>) -> String {
    json!({ "message": message.into() }).to_string()
}

/// A reasoning participant: a node plus the state the reasoning loop needs
/// between ticks — its current hub, its inbound packet queue, its contact
/// book and its in-flight `moveHub` bookkeeping (spec §4.4).
pub struct Device {
    node: Arc<Node>,
    name: RwLock<String>,
    settings: DeviceSettings,
    hub: RwLock<Option<NodeId>>,
    inbox: RwLock<VecDeque<Packet>>,
    contacts: RwLock<ContactDirectory>,
    /// Target hub uuids a `CONNECT_CHECK_REQUEST` is outstanding for,
    /// keyed the same way the matching `CONNECT_CHECK_RESPONSE.sender`
    /// will arrive (spec §4.4's `moveHub`).
    pending_connect_checks: RwLock<HashSet<NodeId>>,
    move_hub_result: RwLock<Option<bool>>,
    streaming: AtomicBool,
    listeners: DeviceListenerRegistry,
}

impl Device {
    /// Two-phase construction, same convention as `RoomHub::new` — wire the
    /// node's sink back with `Node::set_sink` once this `Arc` exists.
    pub fn new(name: impl Into<String>, settings: DeviceSettings, node: Arc<Node>) -> Arc<Self> {
        Arc::new(Self {
            node,
            name: RwLock::new(name.into()),
            settings,
            hub: RwLock::new(None),
            inbox: RwLock::new(VecDeque::new()),
            contacts: RwLock::new(ContactDirectory::new()),
            pending_connect_checks: RwLock::new(HashSet::new()),
            move_hub_result: RwLock::new(None),
            streaming: AtomicBool::new(false),
            listeners: DeviceListenerRegistry::new(),
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

    pub async fn hub(&self) -> Option<NodeId> {
        *self.hub.read().await
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub async fn register_event_listener(self: &Arc<Self>, listener: Arc<dyn DeviceEventListener>) -> DeviceListenerId {
        self.listeners.register(listener).await
    }

    pub async fn unregister_event_listener(&self, id: DeviceListenerId) {
        self.listeners.unregister(id).await;
    }

    pub async fn register_contact(&self, name: impl Into<String>, id: NodeId) -> std::result::Result<(), ()> {
        self.contacts.write().await.register(name, id)?;
        let snapshot = self.contacts.read().await.snapshot();
        self.emit_event(DeviceEvent::ContactsDirectory(snapshot)).await;
        Ok(())
    }

    pub async fn resolve_contact(&self, text: &str) -> Option<NodeId> {
        self.contacts.read().await.resolve(text)
    }

    /// Creates the device-to-hub connection, joins it and mirrors the JOIN
    /// packet into the device's own inbox so the reasoning loop sees its
    /// own arrival (spec §3, §4.4 — grounded in `original_source`'s
    /// `joinHub`).
    pub async fn join_hub(&self, hub: NodeId, arena: &dyn Arena) -> Result<()> {
        if self.hub.read().await.is_some() {
            return Err(OverlayError::AlreadyInHub(self.id()));
        }
        arena.connect_nodes(self.id(), hub).await?;
        *self.hub.write().await = Some(hub);

        let packet = Packet::new(ActionType::Join, self.id()).with_context(hub.to_string());
        self.send_packet(packet.clone(), arena).await?;
        self.inbox.write().await.push_back(packet);

        arena.notify_device_moved(self.id(), Some(hub)).await;
        Ok(())
    }

    /// Sends LEAVE, mirrors it into the inbox, then drops the connection to
    /// the current hub — spec §3's "a leave removes it", which diverges
    /// from `original_source`'s `leaveHub` (which never tears the
    /// connection down, relying on the caller to overwrite it on the next
    /// join; kept here as an explicit teardown since the invariant in the
    /// spec is unambiguous about exactly one connection existing only while
    /// `hubUuid` is set).
    pub async fn leave_hub(&self, arena: &dyn Arena) -> Result<()> {
        let hub = self.hub.read().await.ok_or(OverlayError::NotInAnyHub(self.id()))?;

        let packet = Packet::new(ActionType::Leave, self.id()).with_context(hub.to_string());
        self.send_packet(packet.clone(), arena).await?;
        self.inbox.write().await.push_back(packet);

        arena.disconnect_nodes(self.id(), hub).await?;
        *self.hub.write().await = None;

        arena.notify_device_moved(self.id(), None).await;
        Ok(())
    }

    /// Fire-and-forget: sends a `CONNECT_CHECK_REQUEST` for `new_hub` via
    /// the current hub and records the pending check. The actual leave and
    /// join happen later, in `receive`, when the correlated
    /// `CONNECT_CHECK_RESPONSE` arrives (grounded in `original_source`'s
    /// `moveHub`, which resolves the same way through a registered
    /// callback rather than a blocking round trip).
    pub async fn move_hub(&self, new_hub: NodeId, arena: &dyn Arena) -> Result<()> {
        if self.hub.read().await.is_none() {
            return Err(OverlayError::NotInAnyHub(self.id()));
        }
        *self.move_hub_result.write().await = None;
        self.pending_connect_checks.write().await.insert(new_hub);

        let packet = Packet::new(ActionType::ConnectCheckRequest, self.id()).with_recipient(new_hub);
        self.send_packet(packet, arena).await
    }

    /// Routes a packet out through the current hub connection. The
    /// packet's own `recipient` field is whatever the caller set (or
    /// `None` for a broadcast); the hub is always the only physical next
    /// hop a device's node has.
    pub async fn send_packet(&self, packet: Packet, arena: &dyn Arena) -> Result<()> {
        let hub = self.hub.read().await.ok_or(OverlayError::NotInAnyHub(self.id()))?;
        self.node.send(Some(hub), packet, arena).await
    }

    async fn set_streaming(&self, value: bool, arena: &dyn Arena) {
        let previous = self.streaming.swap(value, Ordering::AcqRel);
        if previous != value {
            arena.notify_streaming_changed(self.id(), value).await;
        }
    }

    async fn emit_event(&self, event: DeviceEvent) {
        self.listeners.notify_all(self.id(), event).await;
    }

    /// Runs every tool call the oracle asked for, in order, and returns the
    /// string to report back as the matching tool result (spec §6's ten
    /// tools, grounded in `original_source`'s `getTools`/dispatch switch).
    pub async fn dispatch_tool(&self, call: &ToolCall, arena: &dyn Arena) -> String {
        let args = match call.arguments_value() {
            Ok(Value::Object(map)) => map,
            _ => return tool_reply("error: invalid arguments"),
        };
        let arg_str = |key: &str| args.get(key).and_then(Value::as_str).map(str::to_string);

        match call.name.as_str() {
            "talk" => {
                let context = arg_str("context").unwrap_or_default();
                let packet = match arg_str("target") {
                    None => Packet::new(ActionType::Talk, self.id()).with_context(context),
                    Some(target) if target.eq_ignore_ascii_case("everyone") => {
                        Packet::new(ActionType::Talk, self.id()).with_context(context)
                    }
                    Some(target) => match self.resolve_contact(&target).await {
                        Some(id) => Packet::new(ActionType::Talk, self.id()).with_recipient(id).with_context(context),
                        None => return tool_reply(format!("error: Target {target} not found")),
                    },
                };
                self.send_and_report(packet, arena).await
            }
            "whisper" => self.directed_action(ActionType::Whisper, &args, arena).await,
            "text" => self.directed_action(ActionType::Text, &args, arena).await,
            "point" => {
                let Some(target) = arg_str("target") else {
                    return tool_reply("error: target is required");
                };
                match self.resolve_contact(&target).await {
                    Some(id) => self.send_and_report(Packet::new(ActionType::Point, self.id()).with_recipient(id), arena).await,
                    None => tool_reply(format!("error: Target {target} not found")),
                }
            }
            "raiseHand" => self.send_and_report(Packet::new(ActionType::RaiseHand, self.id()), arena).await,
            "registerContact" => {
                let (Some(name), Some(uuid)) = (arg_str("name"), arg_str("uuid")) else {
                    return tool_reply("error: name and uuid are required");
                };
                let Ok(id) = uuid.parse::<NodeId>() else {
                    return tool_reply(format!("error: Invalid UUID {uuid}"));
                };
                match self.register_contact(name.clone(), id).await {
                    Ok(()) => tool_reply("success"),
                    Err(()) => tool_reply(format!("error: Name {name} already exists")),
                }
            }
            "getAdjacentRooms" => {
                let Some(hub) = self.hub().await else {
                    return tool_reply("error: You don't seem to be in any room");
                };
                let packet = Packet::new(ActionType::AdjacentHubsRequest, self.id()).with_recipient(hub);
                self.send_and_report_as(packet, "ASYNC: Request sent. Please wait for the response", arena).await
            }
            "moveToRoom" => {
                let Some(room) = arg_str("roomUuid") else {
                    return tool_reply("error: roomUuid is required");
                };
                let Ok(room) = room.parse::<NodeId>() else {
                    return tool_reply(format!("error: Invalid UUID {room}"));
                };
                if self.hub().await.is_none() {
                    return tool_reply("error: You don't seem to be in any room");
                }
                match self.move_hub(room, arena).await {
                    Ok(()) => tool_reply("ASYNC: Request sent. Please wait for the response"),
                    Err(err) => tool_reply(format!("error: {err}")),
                }
            }
            "getCurrentRoomName" => {
                let Some(hub) = self.hub().await else {
                    return tool_reply("error: You don't seem to be in any room");
                };
                let packet = Packet::new(ActionType::HubNameRequest, self.id()).with_recipient(hub);
                self.send_and_report_as(packet, "ASYNC: Request sent. Please wait for the response", arena).await
            }
            "ping" => {
                self.send_and_report_as(
                    Packet::new(ActionType::Ping, self.id()),
                    "PING: pinged everyone in the room. Please wait for the response",
                    arena,
                )
                .await
            }
            other => tool_reply(format!("error: unknown tool {other}")),
        }
    }

    async fn directed_action(&self, kind: ActionType, args: &serde_json::Map<String, Value>, arena: &dyn Arena) -> String {
        let target = args.get("target").and_then(Value::as_str);
        let context = args.get("context").and_then(Value::as_str).unwrap_or_default();
        let Some(target) = target else {
            return tool_reply("error: target is required");
        };
        match self.resolve_contact(target).await {
            Some(id) => self.send_and_report(Packet::new(kind, self.id()).with_recipient(id).with_context(context), arena).await,
            None => tool_reply(format!("error: Target {target} not found")),
        }
    }

    async fn send_and_report(&self, packet: Packet, arena: &dyn Arena) -> String {
        self.send_and_report_as(packet, "success", arena).await
    }

    /// Like `send_and_report`, but with a caller-supplied success message —
    /// for the request/response tools (`getAdjacentRooms`, `moveToRoom`,
    /// `getCurrentRoomName`, `ping`) whose `original_source` counterpart
    /// reports something more specific than a bare "success" once the
    /// request goes out.
    async fn send_and_report_as(&self, packet: Packet, on_success: &str, arena: &dyn Arena) -> String {
        match self.send_packet(packet, arena).await {
            Ok(()) => tool_reply(on_success),
            Err(err) => tool_reply(format!("error: {err}")),
        }
    }

    /// Spawns the reasoning loop as a background task and returns its
    /// handle, so callers (tests included) can abort it on teardown.
    pub fn spawn_reasoning_loop(
        self: &Arc<Self>,
        oracle: Arc<dyn ChatOracle>,
        arena: Arc<dyn Arena>,
        situation: impl Into<String>,
    ) -> tokio::task::JoinHandle<()> {
        let device = self.clone();
        let situation = situation.into();
        tokio::spawn(async move { run_reasoning_loop(device, oracle, arena, situation).await })
    }
}

#[async_trait]
impl PacketSink for Device {
    async fn receive(&self, packet: Packet, arena: &dyn Arena) {
        if packet.kind == ActionType::Ping && packet.recipient.is_none() && packet.sender != self.id() {
            let pong = Packet::new(ActionType::Ping, self.id()).with_recipient(packet.sender);
            if let Err(err) = self.send_packet(pong, arena).await {
                warn!(%err, "failed to answer ping");
            }
            return;
        }

        if packet.kind == ActionType::ConnectCheckResponse {
            let matched = self.pending_connect_checks.write().await.remove(&packet.sender);
            if matched {
                let ok = packet.context.as_deref() == Some("OK");
                *self.move_hub_result.write().await = Some(ok);
                if ok {
                    if let Err(err) = self.leave_hub(arena).await {
                        warn!(%err, "leave_hub failed while completing moveHub");
                    }
                    if let Err(err) = self.join_hub(packet.sender, arena).await {
                        warn!(%err, "join_hub failed while completing moveHub");
                    }
                }
                return;
            }
        }

        self.inbox.write().await.push_back(packet);
    }
}

/// The reasoning loop proper (spec §4.4 steps (a)-(g)): wait for input,
/// render it into the conversation, solicit a completion, dispatch any
/// tool calls it asks for, and repeat. Runs until the task is aborted.
async fn run_reasoning_loop(device: Arc<Device>, oracle: Arc<dyn ChatOracle>, arena: Arc<dyn Arena>, situation: String) {
    if !device.settings.run_ai {
        return;
    }

    let name = device.name().await;
    let mut messages = vec![TimestampedMessage::system(ChatMessage::system(system_prompt(&name, &situation)), Instant::now())];
    let mut gate = ReasoningGate::default();
    let mut skip_check = false;

    loop {
        let now = Instant::now();
        age_out(&mut messages, now);

        if !skip_check {
            let wait_start = Instant::now();
            loop {
                if !device.inbox.read().await.is_empty() {
                    break;
                }
                if wait_start.elapsed() >= device.settings.time_out {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        let packets: Vec<Packet> = device.inbox.write().await.drain(..).collect();
        let move_result = device.move_hub_result.write().await.take();
        let had_timeout = packets.is_empty() && !skip_check;
        skip_check = false;

        let contacts = device.contacts.read().await;
        let mut user_message = render_inbox(&packets, &contacts, device.id(), device.settings.privacy_mode);
        drop(contacts);

        if move_result == Some(false) {
            user_message.push_str("ASYNC: Request failed. The target room is not adjacent to the current room.\n");
        }
        if had_timeout {
            user_message.push_str("NOTIFY: Nothing happened for a while.\nIt's up to you whether you take action or not.\n");
        }

        if !user_message.is_empty() {
            gate.needs_thinking = true;
            device.emit_event(DeviceEvent::UserMessage(user_message.clone())).await;
            messages.push(TimestampedMessage::new(ChatMessage::user(user_message), Instant::now()));
        } else if gate.needs_call_function {
            messages.push(TimestampedMessage::new(ChatMessage::user("SYSTEM: You can call functions now"), Instant::now()));
        }

        device.set_streaming(true, arena.as_ref()).await;
        let chat_messages: Vec<ChatMessage> = messages.iter().map(|m| m.message.clone()).collect();
        let mut stream = match oracle.stream(chat_messages, catalogue()).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "oracle stream failed to start");
                device.set_streaming(false, arena.as_ref()).await;
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
        };

        let completion_start = Instant::now();
        let mut text_buf = String::new();
        let mut calls: Vec<ToolCall> = Vec::new();
        let mut partial_args: HashMap<String, String> = HashMap::new();
        let mut current_partial: Option<String> = None;
        let mut interrupted = false;

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    warn!(%err, "oracle stream errored mid-turn");
                    break;
                }
            };
            match event {
                StreamEvent::TextDelta(delta) => {
                    text_buf.push_str(&delta);
                    device.emit_event(DeviceEvent::AssistantDelta(delta)).await;
                }
                StreamEvent::ToolCallDelta { id, arguments_fragment, .. } => {
                    partial_args.entry(id.clone()).or_default().push_str(&arguments_fragment);
                    current_partial = Some(id);
                }
                StreamEvent::ToolCallFinished(call) => {
                    partial_args.remove(&call.id);
                    if current_partial.as_deref() == Some(call.id.as_str()) {
                        current_partial = None;
                    }
                    device.emit_event(DeviceEvent::AssistantToolCall(call.clone())).await;
                    calls.push(call);
                }
                StreamEvent::Done => break,
            }

            let has_new_input = !device.inbox.read().await.is_empty();
            let in_flight = current_partial.as_ref().and_then(|id| partial_args.get(id)).map(String::as_str);
            if should_interrupt(has_new_input, completion_start.elapsed(), device.settings.cool_time, in_flight) {
                interrupted = true;
                break;
            }
        }

        device.set_streaming(false, arena.as_ref()).await;

        if interrupted {
            device.emit_event(DeviceEvent::AssistantInterrupted).await;
            continue;
        }

        device.emit_event(DeviceEvent::AssistantMessage(text_buf.clone())).await;
        messages.push(TimestampedMessage::new(ChatMessage::assistant_with_tool_calls(text_buf.clone(), calls.clone()), Instant::now()));

        let refusing = gate.needs_thinking && text_buf.is_empty();
        if refusing && !calls.is_empty() {
            gate.last_tried_functions = true;
        }
        if !text_buf.is_empty() {
            gate.needs_thinking = false;
            if gate.last_tried_functions {
                gate.last_tried_functions = false;
                gate.needs_call_function = true;
            }
        }

        for call in &calls {
            let result = if refusing {
                tool_reply(THINKING_REQUIRED_REMINDER)
            } else {
                device.dispatch_tool(call, arena.as_ref()).await
            };
            device.emit_event(DeviceEvent::ToolResult { tool_call_id: call.id.clone(), result: result.clone() }).await;
            messages.push(TimestampedMessage::new(ChatMessage::tool_result(call.id.clone(), result), Instant::now()));
        }

        if !calls.is_empty() {
            skip_check = true;
            gate.needs_call_function = false;
        }

        device.emit_event(DeviceEvent::Transcript(render_transcript(&messages))).await;
    }
}
