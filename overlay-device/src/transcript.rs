use std::time::{Duration, Instant};

use overlay_core::{ActionType, NodeId, Packet};
use overlay_oracle::ChatMessage;
use serde_json::Value;

use crate::contacts::ContactDirectory;

/// Detection threshold for the transcript-aging check (spec §9: "detection
/// at >=2h"). Once any non-system message crosses this age, everything at
/// or past [`RETENTION_THRESHOLD`] is dropped in the same pass — the exact
/// asymmetric pair the spec calls out.
pub const DETECTION_THRESHOLD: Duration = Duration::from_secs(7200);
pub const RETENTION_THRESHOLD: Duration = Duration::from_secs(3600);

/// One turn in the reasoning loop's rolling conversation.
#[derive(Debug, Clone)]
pub struct TimestampedMessage {
    pub message: ChatMessage,
    pub timestamp: Instant,
    pub is_system: bool,
}

impl TimestampedMessage {
    pub fn new(message: ChatMessage, timestamp: Instant) -> Self {
        Self { message, timestamp, is_system: false }
    }

    pub fn system(message: ChatMessage, timestamp: Instant) -> Self {
        Self { message, timestamp, is_system: true }
    }
}

/// Drops every non-system message at least [`RETENTION_THRESHOLD`] old,
/// but only once at least one non-system message has crossed
/// [`DETECTION_THRESHOLD`] — preserved verbatim from `original_source`
/// (spec §9).
pub fn age_out(messages: &mut Vec<TimestampedMessage>, now: Instant) {
    let triggered = messages
        .iter()
        .any(|m| !m.is_system && now.duration_since(m.timestamp) >= DETECTION_THRESHOLD);
    if !triggered {
        return;
    }
    messages.retain(|m| m.is_system || now.duration_since(m.timestamp) < RETENTION_THRESHOLD);
}

/// Renders one tick's worth of inbox packets into the textual transcript
/// line format the oracle sees, applying the same privacy-mode filter the
/// forwarding policy uses (spec §4.4 step (c)).
pub fn render_inbox(
    packets: &[Packet],
    contacts: &ContactDirectory,
    self_id: NodeId,
    privacy_mode: bool,
) -> String {
    let mut out = String::new();
    for packet in packets {
        let sender = contacts.name_for(packet.sender, self_id);
        let recipient = packet.recipient.map(|r| contacts.name_for(r, self_id));

        match packet.kind {
            ActionType::Talk => {
                if recipient.is_some() {
                    out.push_str(&format!("TALK: {sender} -> You: {}\n", ctx(packet)));
                } else {
                    out.push_str(&format!("TALK: {sender} -> Everyone: {}\n", ctx(packet)));
                }
            }
            ActionType::AdjacentHubsResponse => {
                let hubs = packet
                    .context
                    .as_deref()
                    .and_then(|c| serde_json::from_str::<Value>(c).ok())
                    .and_then(|v| v.get("hubs").cloned())
                    .unwrap_or(Value::Array(vec![]));
                out.push_str(&format!("ASYNC: Response arrived. Adjacent rooms: {hubs}\n"));
            }
            ActionType::HubNameResponse => {
                out.push_str(&format!("ASYNC: Response arrived. Current room name: {}\n", ctx(packet)));
            }
            _ => {}
        }

        let visible_to_self = !privacy_mode || packet.recipient == Some(self_id);
        if visible_to_self {
            match packet.kind {
                ActionType::Whisper => {
                    if recipient.is_some() {
                        out.push_str(&format!("WHISPER: {sender} -> You: {}\n", ctx(packet)));
                    } else {
                        out.push_str(&format!("WHISPER: {sender} is whispering to someone\n"));
                    }
                }
                ActionType::Text => {
                    if recipient.is_some() {
                        out.push_str(&format!("TEXT: {sender} -> You: {}\n", ctx(packet)));
                    } else {
                        out.push_str(&format!("TEXT: {sender} is sending a message to someone\n"));
                    }
                }
                _ => {}
            }
        }

        if !privacy_mode {
            match packet.kind {
                ActionType::Point => {
                    let recipient = recipient.unwrap_or_else(|| "someone".to_string());
                    out.push_str(&format!("POINT: {sender} -> {recipient}\n"));
                }
                ActionType::RaiseHand => {
                    out.push_str(&format!("RAISE_HAND: {sender} raised their hand\n"));
                }
                ActionType::Ping => {
                    if packet.recipient.is_some() {
                        out.push_str(&format!("PING: Ping response arrived from {sender}\n"));
                    } else if packet.sender != self_id {
                        out.push_str(&format!("PING: {sender} pinged everyone\n"));
                    }
                }
                ActionType::Join => {
                    out.push_str(&format!("JOIN: {sender} joined the room\n"));
                }
                ActionType::Leave => {
                    out.push_str(&format!("LEAVE: {sender} left the room\n"));
                }
                _ => {}
            }
        }
    }
    out
}

fn ctx(packet: &Packet) -> &str {
    packet.context.as_deref().unwrap_or("")
}

/// Renders the rolling conversation as `"role: content"` lines — the
/// supplemented transcript-mirroring feature (SPEC_FULL §11), standing in
/// for `original_source`'s `logs/{uuid}.json` dump without touching the
/// filesystem from inside the core.
pub fn render_transcript(messages: &[TimestampedMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            let role = match m.message.role {
                overlay_oracle::ChatRole::System => "system",
                overlay_oracle::ChatRole::User => "user",
                overlay_oracle::ChatRole::Assistant => "assistant",
                overlay_oracle::ChatRole::Tool => "tool",
            };
            format!("{role}: {}", m.message.content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_oracle::ChatRole;

    fn msg(role: ChatRole, at: Instant) -> TimestampedMessage {
        let message = match role {
            ChatRole::System => ChatMessage::system(""),
            ChatRole::User => ChatMessage::user(""),
            ChatRole::Assistant => ChatMessage::assistant(""),
            ChatRole::Tool => ChatMessage::tool_result("", ""),
        };
        TimestampedMessage::new(message, at)
    }

    #[test]
    fn does_not_age_out_until_detection_threshold() {
        let now = Instant::now();
        let mut messages = vec![msg(ChatRole::User, now - Duration::from_secs(3700))];
        age_out(&mut messages, now);
        assert_eq!(messages.len(), 1, "below the 2h detection threshold, nothing is removed");
    }

    #[test]
    fn ages_out_everything_past_retention_once_triggered() {
        let now = Instant::now();
        let mut messages = vec![
            TimestampedMessage::system(ChatMessage::system(""), now - Duration::from_secs(10_000)),
            msg(ChatRole::User, now - Duration::from_secs(7300)),
            msg(ChatRole::User, now - Duration::from_secs(3700)),
            msg(ChatRole::User, now - Duration::from_secs(1800)),
        ];
        age_out(&mut messages, now);
        assert_eq!(messages.len(), 2, "system message and the <1h message survive");
        assert!(messages[0].is_system);
    }

    #[test]
    fn talk_without_recipient_is_broadcast_to_everyone() {
        let contacts = ContactDirectory::new();
        let me = NodeId::new();
        let sender = NodeId::new();
        let packet = Packet::new(ActionType::Talk, sender).with_context("hi all");
        let rendered = render_inbox(&[packet], &contacts, me, false);
        assert!(rendered.contains("-> Everyone: hi all"));
    }

    #[test]
    fn whisper_to_someone_else_is_hidden_in_privacy_mode() {
        let contacts = ContactDirectory::new();
        let me = NodeId::new();
        let sender = NodeId::new();
        let other = NodeId::new();
        let packet = Packet::new(ActionType::Whisper, sender).with_recipient(other).with_context("shh");
        let rendered = render_inbox(&[packet], &contacts, me, true);
        assert!(rendered.is_empty());
    }

    #[test]
    fn point_is_suppressed_in_privacy_mode() {
        let contacts = ContactDirectory::new();
        let me = NodeId::new();
        let sender = NodeId::new();
        let packet = Packet::new(ActionType::Point, sender).with_recipient(me);
        let rendered = render_inbox(&[packet], &contacts, me, true);
        assert!(rendered.is_empty());
    }

    #[test]
    fn unaddressed_ping_from_self_is_not_echoed() {
        let contacts = ContactDirectory::new();
        let me = NodeId::new();
        let packet = Packet::new(ActionType::Ping, me);
        let rendered = render_inbox(&[packet], &contacts, me, false);
        assert!(rendered.is_empty());
    }
}
