use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::message::ChatMessage;
use crate::stream::{OracleError, StreamEvent};
use crate::tool::ToolSpec;

/// The external reasoning boundary: hand over a conversation and a tool
/// catalogue, get back a stream of deltas. No concrete implementation lives
/// in this crate — a real one talks HTTP/SSE to a model provider, which is
/// explicitly out of scope here; this trait is only the seam a device's
/// reasoning loop programs against.
#[async_trait]
pub trait ChatOracle: Send + Sync {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolSpec>,
    ) -> Result<BoxStream<'static, Result<StreamEvent, OracleError>>, OracleError>;
}
