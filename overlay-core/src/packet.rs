use serde::{Deserialize, Serialize};

use crate::{ActionType, NodeId};

/// The initial and maximum time-to-live every packet is born with (spec §3).
pub const DEFAULT_TTL: u32 = 128;

/// An action traveling through the mesh.
///
/// Cloning a `Packet` is always a deep copy — every field is owned, so the
/// `Connection::transfer` deep-copy requirement (spec §4.2) falls out of
/// `#[derive(Clone)]` for free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub sender: NodeId,
    pub recipient: Option<NodeId>,
    pub context: Option<String>,
    pub ttl: u32,
    #[serde(rename = "originalTtl")]
    pub original_ttl: u32,
}

impl Packet {
    /// Construct a packet with default TTL, no recipient and no context.
    pub fn new(kind: ActionType, sender: NodeId) -> Self {
        Self {
            kind,
            sender,
            recipient: None,
            context: None,
            ttl: DEFAULT_TTL,
            original_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_recipient(mut self, recipient: NodeId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of `send` operations this packet instance has undergone
    /// (spec §3: `originalTtl - ttl_on_arrival`).
    pub fn cost(&self) -> u32 {
        self.original_ttl.saturating_sub(self.ttl)
    }

    /// Parse `context` as a `NodeId`, the shape every discovery/ack packet
    /// uses to carry the previous hop (spec §4.3: DISCOVERY_REQUEST/RESPONSE).
    pub fn context_as_node_id(&self) -> Option<NodeId> {
        self.context.as_deref().and_then(|s| s.parse().ok())
    }
}
