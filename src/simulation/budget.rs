//! Road and bridge resource accounting
//!
//! The budget is the single gate the network consults before committing
//! any mutation; nothing else touches the counters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Road segments currently placed
    pub roads_used: u32,
    /// Road segment quota
    pub max_roads: u32,
    /// Bridge credits remaining (never negative)
    pub bridge_credits: u32,
}

impl ResourceBudget {
    pub fn new(max_roads: u32, bridge_credits: u32) -> Self {
        Self {
            roads_used: 0,
            max_roads,
            bridge_credits,
        }
    }

    pub fn roads_remaining(&self) -> u32 {
        self.max_roads.saturating_sub(self.roads_used)
    }

    /// Check a whole mutation plan before committing any of it
    pub fn can_afford(&self, roads: u32, bridges: u32) -> bool {
        roads <= self.roads_remaining() && bridges <= self.bridge_credits
    }

    pub fn try_consume_road(&mut self) -> bool {
        if self.roads_used < self.max_roads {
            self.roads_used += 1;
            true
        } else {
            false
        }
    }

    pub fn refund_road(&mut self) {
        self.roads_used = self.roads_used.saturating_sub(1);
    }

    pub fn try_consume_bridge(&mut self) -> bool {
        if self.bridge_credits > 0 {
            self.bridge_credits -= 1;
            true
        } else {
            false
        }
    }

    pub fn refund_bridge(&mut self) {
        self.bridge_credits += 1;
    }
}
