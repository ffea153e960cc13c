//! Vehicle state and per-tick movement
//!
//! A vehicle carries a committed path of node handles. Movement respects
//! a dwell quantum (backpressure at busy edges) and tolerates paths that
//! went stale after a topology edit: a missing leg stalls the vehicle for
//! the tick, it never aborts the tick.

use super::config::SimConfig;
use super::game_state::UpgradeLevels;
use super::network::RoadNetwork;
use super::types::{ColorId, EndpointId, Position, VehicleId};
use petgraph::stable_graph::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripPhase {
    ToStore,
    ToHome,
}

/// What a single advancement pass decided for this vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStep {
    /// Moved (or accumulated dwell) normally
    Moving,
    /// Current leg's edge no longer exists; waited in place
    Stalled,
    /// Reached the last node of the committed path
    PathComplete,
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub color: ColorId,
    pub position: Position,
    pub angle: f32,
    pub phase: TripPhase,
    /// Originating house and paired store
    pub house: EndpointId,
    pub store: EndpointId,
    /// Committed path; a snapshot of the topology at route time
    pub path: Vec<NodeIndex>,
    /// Index of the current leg (path[leg] -> path[leg + 1])
    pub leg: usize,
    /// Progress along the current leg, 0..=1
    pub t: f32,
    /// Accumulated dwell/wait time at the current leg
    pub wait: f32,
}

impl Vehicle {
    pub fn new(
        id: VehicleId,
        color: ColorId,
        house: EndpointId,
        store: EndpointId,
        path: Vec<NodeIndex>,
        position: Position,
    ) -> Self {
        Self {
            id,
            color,
            position,
            angle: 0.0,
            phase: TripPhase::ToStore,
            house,
            store,
            path,
            leg: 0,
            t: 0.0,
            wait: 0.0,
        }
    }

    /// Begin the return trip along a freshly computed path
    pub fn turn_home(&mut self, path: Vec<NodeIndex>, store_position: Position) {
        self.phase = TripPhase::ToHome;
        self.path = path;
        self.leg = 0;
        self.t = 0.0;
        self.wait = 0.0;
        self.position = store_position;
    }

    /// Advance along the current leg for one tick.
    ///
    /// Increments the leg edge's load, applies the dwell quantum and
    /// over-capacity backpressure, then moves. Missing path nodes or a
    /// removed leg edge stall the vehicle instead of failing.
    pub fn advance(
        &mut self,
        dt: f32,
        net: &mut RoadNetwork,
        cfg: &SimConfig,
        levels: &UpgradeLevels,
    ) -> VehicleStep {
        if self.leg + 1 >= self.path.len() {
            return VehicleStep::PathComplete;
        }
        let from = self.path[self.leg];
        let to = self.path[self.leg + 1];

        let Some(edge) = net.edge_between(from, to) else {
            self.wait += dt;
            return VehicleStep::Stalled;
        };
        let (Some(from_pos), Some(to_pos)) = (net.node_position(from), net.node_position(to))
        else {
            self.wait += dt;
            return VehicleStep::Stalled;
        };

        let load = match net.edge_mut(edge) {
            Some(data) => {
                data.load += 1;
                data.load
            }
            None => {
                self.wait += dt;
                return VehicleStep::Stalled;
            }
        };

        let dwell = (cfg.dwell_base
            - levels.lights as f32 * cfg.dwell_light_step
            - levels.roundabouts as f32 * cfg.dwell_roundabout_step)
            .max(cfg.dwell_min);
        // Over-capacity edges bleed dwell progress, holding the vehicle back
        if load > cfg.edge_capacity_base + levels.lights {
            self.wait -= dt * cfg.over_capacity_wait;
        }

        if self.wait < dwell {
            self.wait += dt;
            return VehicleStep::Moving;
        }

        let seg_len = from_pos.distance(&to_pos).max(1.0);
        self.t = (self.t + cfg.car_speed() * dt / seg_len).min(1.0);
        self.position = from_pos.lerp(&to_pos, self.t);
        self.angle = from_pos.angle_to(&to_pos);

        if self.t >= 1.0 {
            self.leg += 1;
            self.t = 0.0;
            self.wait = 0.0;
            if self.leg + 1 >= self.path.len() {
                return VehicleStep::PathComplete;
            }
        }
        VehicleStep::Moving
    }
}
