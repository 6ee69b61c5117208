use std::time::{Duration, Instant};

use overlay_core::NodeId;

/// Route entries are advisory and expire after this long (spec §3/§4.3.3).
pub const ROUTE_TTL: Duration = Duration::from_secs(3);

/// A row in a hub's route table (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTableItem {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredRoute {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub cost: u32,
    pub expires: Instant,
}

impl StoredRoute {
    pub(crate) fn fresh(destination: NodeId, next_hop: NodeId, cost: u32) -> Self {
        Self {
            destination,
            next_hop,
            cost,
            expires: Instant::now() + ROUTE_TTL,
        }
    }

    pub(crate) fn is_live(&self, now: Instant) -> bool {
        self.expires > now
    }

    pub(crate) fn as_item(&self) -> RouteTableItem {
        RouteTableItem {
            destination: self.destination,
            next_hop: self.next_hop,
            cost: self.cost,
        }
    }
}
