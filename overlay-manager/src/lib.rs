//! The mesh's single source of truth: owns every hub and device, and is
//! the sole implementor of `Arena` (spec §4.5, §9).

mod events;
mod manager;

pub use events::{PacketTransferListener, StateChangeEvent, StateChangeListener, StateListenerId, TransferListenerId};
pub use manager::{Manager, NodeKind};
