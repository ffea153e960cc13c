//! Trip endpoints: houses spawn demand, stores receive it
//!
//! Endpoints are created at setup and when new color pairs unlock; they
//! are never removed. Their network binding is weak: recomputed after
//! every topology mutation and absent whenever no node is in snap range.

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use super::network::RoadNetwork;
use super::types::{ColorId, EndpointId, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointKind {
    House,
    Store,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub kind: EndpointKind,
    pub color: ColorId,
    pub position: Position,
    /// Nearest network node within snap radius; not persisted, derived
    #[serde(skip)]
    pub binding: Option<NodeIndex>,
    /// Demand that failed to produce a vehicle
    pub backlog: u32,
    /// Countdown until the next spawn attempt (houses only)
    #[serde(skip)]
    pub spawn_timer: f32,
}

impl Endpoint {
    pub fn new(
        id: EndpointId,
        kind: EndpointKind,
        color: ColorId,
        position: Position,
        spawn_timer: f32,
    ) -> Self {
        Self {
            id,
            kind,
            color,
            position,
            binding: None,
            backlog: 0,
            spawn_timer,
        }
    }
}

/// All endpoints of a world, with color-pair lookups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointRegistry {
    pub endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    pub fn push(&mut self, endpoint: Endpoint) {
        self.endpoints.push(endpoint);
    }

    pub fn get(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EndpointId) -> Option<&mut Endpoint> {
        self.endpoints.iter_mut().find(|e| e.id == id)
    }

    pub fn houses(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| e.kind == EndpointKind::House)
    }

    pub fn house_count(&self) -> usize {
        self.houses().count()
    }

    /// The store paired with a color (exactly one per color)
    pub fn store_for_color(&self, color: ColorId) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.kind == EndpointKind::Store && e.color == color)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.endpoints.iter().map(|e| e.position).collect()
    }

    /// Recompute every weak binding against the current topology
    pub fn rebind_all(&mut self, net: &RoadNetwork, snap_radius: f32) {
        for endpoint in &mut self.endpoints {
            endpoint.binding = net.nearest_node_within(&endpoint.position, snap_radius);
        }
    }

    /// Highest ID in use, for resuming the ID source after a load
    pub fn max_raw_id(&self) -> usize {
        self.endpoints.iter().map(|e| e.id.0 .0).max().unwrap_or(0)
    }
}
