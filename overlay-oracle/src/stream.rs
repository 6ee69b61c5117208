use thiserror::Error;

use crate::tool::ToolCall;

/// One increment of a streamed completion (spec §4.4's `assistant.delta` /
/// `assistant.tool_call` events, before they are re-published as
/// observability events by the device).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant prose.
    TextDelta(String),
    /// A fragment of a tool call's argument buffer still being assembled.
    /// `id` identifies which call the fragment belongs to when a model
    /// interleaves multiple calls.
    ToolCallDelta { id: String, name: String, arguments_fragment: String },
    /// A tool call whose argument buffer is a complete JSON object.
    ToolCallFinished(ToolCall),
    /// The oracle has nothing further to say this turn.
    Done,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),
    #[error("oracle stream was cancelled")]
    Cancelled,
}
