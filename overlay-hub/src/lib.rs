mod listener;
mod route_table;
mod room_hub;

pub use listener::{ListenerId, PacketListener};
pub use room_hub::RoomHub;
pub use route_table::RouteTableItem;
