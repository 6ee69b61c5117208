use overlay_oracle::ToolSpec;
use serde_json::json;

/// The fixed tool catalogue handed to the oracle alongside every turn's
/// conversation (spec §6). Schemas mirror `original_source`'s
/// `getTools()` verbatim — parameter names, descriptions and required
/// lists unchanged.
pub fn catalogue() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "talk",
            "Talk to someone. Everyone can hear you",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "Target to talk to. If not specified, the target will be everyone. UUID or name can be used"
                    },
                    "context": {
                        "type": "string",
                        "description": "Context of the conversation"
                    }
                },
                "required": ["context"]
            }),
        ),
        ToolSpec::new(
            "whisper",
            "Whisper to someone. Only the target can hear the content, but everyone can see who is whispering to whom",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "The target person to whisper to. This field is required. UUID or name can be used"
                    },
                    "context": {
                        "type": "string",
                        "description": "The message content to whisper"
                    }
                },
                "required": ["target", "context"]
            }),
        ),
        ToolSpec::new(
            "text",
            "Send a text message. Everyone can see that you are sending a message, but the recipient and the content are hidden. You can also send messages to people who are not in the same room",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "The target person to send the text to. This field is required"
                    },
                    "context": {
                        "type": "string",
                        "description": "The content of the text message. This field is required"
                    }
                },
                "required": ["target", "context"]
            }),
        ),
        ToolSpec::new(
            "point",
            "Point at someone. Everyone can see who is being pointed at",
            json!({
                "type": "object",
                "properties": {
                    "target": {
                        "type": "string",
                        "description": "The target person to point at. This field is required. UUID or name can be used"
                    }
                },
                "required": ["target"]
            }),
        ),
        ToolSpec::new(
            "raiseHand",
            "Raise your hand. Everyone can see that you raised your hand",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolSpec::new(
            "registerContact",
            "Replace the displayed UUID of a contact with a custom name. Once registered, the custom name will be displayed instead of the UUID. To avoid confusion, it is recommended to ask the contact for their preferred name before registration",
            json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The custom name to replace and display instead of the UUID. It is recommended to use the name provided by the contact to avoid confusion. This field is required"
                    },
                    "uuid": {
                        "type": "string",
                        "description": "The UUID of the person to register"
                    }
                },
                "required": ["name", "uuid"]
            }),
        ),
        ToolSpec::new(
            "getAdjacentRooms",
            "Retrieve the UUIDs of rooms adjacent to the current room. No parameters are required as the command uses the current room context",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolSpec::new(
            "moveToRoom",
            "Move to a specific room by providing its UUID. The UUID must correspond to an adjacent room",
            json!({
                "type": "object",
                "properties": {
                    "roomUuid": {
                        "type": "string",
                        "description": "The UUID of the room to move to. Must be one of the adjacent room UUIDs"
                    }
                },
                "required": ["roomUuid"]
            }),
        ),
        ToolSpec::new(
            "getCurrentRoomName",
            "Retrieve the name of the room you are currently in",
            json!({ "type": "object", "properties": {} }),
        ),
        ToolSpec::new(
            "ping",
            "Send a ping to everyone in the same room. This allows you to check who is currently in the room",
            json!({ "type": "object", "properties": {} }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_ten_tools_with_unique_names() {
        let tools = catalogue();
        assert_eq!(tools.len(), 10);
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 10);
    }
}
