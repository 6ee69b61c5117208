mod message;
mod mock;
mod oracle;
mod stream;
mod tool;

pub use message::{ChatMessage, ChatRole};
pub use mock::MockOracle;
pub use oracle::ChatOracle;
pub use stream::{OracleError, StreamEvent};
pub use tool::{is_complete_json_object, ToolCall, ToolSpec};
