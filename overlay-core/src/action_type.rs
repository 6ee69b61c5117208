use serde::{Deserialize, Serialize};

/// The closed set of packet kinds the mesh understands (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Talk,
    Whisper,
    Text,
    Point,
    RaiseHand,
    Leave,
    Join,
    DiscoveryRequest,
    DiscoveryResponse,
    ConnectCheckRequest,
    ConnectCheckResponse,
    AdjacentHubsRequest,
    AdjacentHubsResponse,
    HubNameRequest,
    HubNameResponse,
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_snake_case() {
        assert_eq!(serde_json::to_string(&ActionType::RaiseHand).unwrap(), "\"raise_hand\"");
        assert_eq!(serde_json::to_string(&ActionType::DiscoveryRequest).unwrap(), "\"discovery_request\"");
    }
}
