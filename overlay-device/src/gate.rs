/// The reasoning loop's "thinking gate" (spec §4.4): a tool call that
/// arrives before the model has produced any prose this turn is refused
/// with a reminder instead of dispatched; once a later completion *does*
/// produce prose, the loop solicits one more completion even with empty
/// user input, so the model gets a chance to act on what it just reasoned
/// through.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReasoningGate {
    /// Set whenever new user input enters the conversation this turn;
    /// cleared the first time the model responds with non-empty prose.
    pub needs_thinking: bool,
    /// Set once prose has satisfied a previously-refused tool call; tells
    /// the loop to solicit another completion next tick even with nothing
    /// new in the inbox.
    pub needs_call_function: bool,
    /// Set when a tool call was refused this turn for lack of prose.
    pub last_tried_functions: bool,
}

/// The tool-result reminder sent back in place of actually dispatching a
/// tool call made without preceding prose. Wording matches
/// `original_source`'s reminder text; the `{"message": ...}` envelope
/// `original_source` wraps every reply in is applied by the caller
/// (`device::tool_reply`), not baked into this constant.
pub const THINKING_REQUIRED_REMINDER: &str =
    "error: Write down the reasons for your actions before you act. Then, please try again.";
