use thiserror::Error;

use crate::NodeId;

/// The closed set of error kinds surfaced synchronously by mesh operations
/// (spec §7). `InvalidTTL` is intentionally absent: an exhausted-TTL send is
/// a silent drop, never an error.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("hub {0} not found")]
    HubNotFound(NodeId),

    #[error("device {0} not found")]
    DeviceNotFound(NodeId),

    #[error("no connection between {0} and {1}")]
    ConnectionNotFound(NodeId, NodeId),

    #[error("a hub cannot connect to itself")]
    SelfLoop,

    #[error("hubs {0} and {1} are already connected")]
    AlreadyConnected(NodeId, NodeId),

    #[error("hubs {0} and {1} are not connected")]
    NotConnected(NodeId, NodeId),

    #[error("device {0} is already in a hub")]
    AlreadyInHub(NodeId),

    #[error("device {0} is not in any hub")]
    NotInAnyHub(NodeId),

    #[error("no route to {0} from this node")]
    NoRoute(NodeId),

    #[error("{0} is not on this connection")]
    NotOnConnection(NodeId),

    #[error("could not parse identity from packet context")]
    IdentityParse,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
