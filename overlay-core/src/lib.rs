//! Shared vocabulary for the overlay mesh: packets, identities and errors.
//!
//! Everything here is plain data — no networking, no locking, no async.
//! `overlay-net`, `overlay-hub`, `overlay-device` and `overlay-manager`
//! build the live mesh on top of these types.

mod action_type;
mod error;
mod node_id;
mod packet;

pub use action_type::ActionType;
pub use error::{OverlayError, Result};
pub use node_id::NodeId;
pub use packet::{Packet, DEFAULT_TTL};
