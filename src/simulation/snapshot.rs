//! Persistence format and the per-frame view for frontends
//!
//! A save captures durable state only. Vehicles, edge loads, endpoint
//! bindings and spawn timers are all derived or transient and rebuild
//! from scratch after a load; the graph serializes with its stable
//! handles so committed routes would stay meaningful within one session.

use petgraph::stable_graph::StableUnGraph;
use serde::{Deserialize, Serialize};

use super::budget::ResourceBudget;
use super::config::SimConfig;
use super::endpoint::{EndpointKind, EndpointRegistry};
use super::game_state::{CongestionTier, RunState, UpgradeLevels};
use super::network::{EdgeData, NodeData};
use super::types::{ColorId, Position, RiverSpan, TopologyMode};
use super::vehicle::TripPhase;

/// Durable world state, serialized as JSON
#[derive(Serialize, Deserialize)]
pub struct SaveState {
    pub config: SimConfig,
    pub mode: TopologyMode,
    pub river: Option<RiverSpan>,
    pub graph: StableUnGraph<NodeData, EdgeData>,
    pub endpoints: EndpointRegistry,
    pub budget: ResourceBudget,
    pub levels: UpgradeLevels,
    pub day: u32,
    pub week: u32,
    pub elapsed: f32,
    pub score: u64,
    pub congestion: f32,
}

/// Read-only view of one frame, shaped for rendering
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
    pub endpoints: Vec<EndpointView>,
    pub vehicles: Vec<VehicleView>,
    pub day: u32,
    pub week: u32,
    pub roads_used: u32,
    pub road_quota: u32,
    pub bridge_credits: u32,
    pub score: u64,
    pub congestion: f32,
    pub congestion_tier: CongestionTier,
    pub run_state: RunState,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeView {
    pub position: Position,
    pub is_intersection: bool,
    pub is_bridge: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeView {
    pub from: Position,
    pub to: Position,
    pub load: u32,
    pub is_bridge: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointView {
    pub kind: EndpointKind,
    pub color: ColorId,
    pub position: Position,
    pub backlog: u32,
    /// Whether the endpoint currently reaches the network
    pub bound: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct VehicleView {
    pub color: ColorId,
    pub position: Position,
    pub angle: f32,
    pub phase: TripPhase,
}
