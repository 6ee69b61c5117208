//! Node and connection primitives: the send/receive/transfer substrate the
//! rest of the mesh is built on (spec §4.1, §4.2).

mod arena;
mod connection;
mod node;
mod sink;

pub use arena::Arena;
pub use connection::{Connection, ConnectionId};
pub use node::Node;
pub use sink::PacketSink;
