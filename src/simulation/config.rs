//! Tunable simulation parameters
//!
//! Every gameplay constant lives here so tests and alternative frontends
//! can reshape the simulation without touching the core.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Grid lattice dimensions (grid mode only)
    pub grid_cols: i32,
    pub grid_rows: i32,
    /// Side length of a grid cell in world units; also the unit scale
    /// used to convert cell-relative speeds in freeform mode
    pub cell_size: f32,
    /// Extent of the buildable area in freeform mode, world units
    pub world_width: f32,
    pub world_height: f32,

    /// Starting road segment quota
    pub initial_road_budget: u32,
    /// Starting bridge credits
    pub initial_bridge_credits: u32,

    /// Seconds of elapsed time per in-game day
    pub day_seconds: f32,
    /// Days per week; a week boundary pauses the run for an upgrade pick
    pub week_days: u32,
    /// Every this many days a new color pair unlocks
    pub color_unlock_days: u32,
    /// Hard cap on house/store pairs
    pub max_pairs: usize,
    /// Initial house/store pair count
    pub initial_pairs: usize,

    /// Vehicle speed in cells per second
    pub car_speed_cells_per_sec: f32,
    /// Base spawn-rate multiplier, grows each week
    pub spawn_base: f32,
    pub spawn_growth_per_week: f32,
    /// Active vehicles allowed per color: base + current week
    pub max_cars_per_color_base: u32,
    /// Spawn timer resets to (min + rand * spread) / spawn multiplier
    pub spawn_interval_min: f32,
    pub spawn_interval_spread: f32,
    /// Houses with backlog retry once their timer drops below this
    pub backlog_retry_window: f32,

    /// Congestion meter value that stops the run
    pub failure_threshold: f32,
    /// Continuous congestion decay per second
    pub congestion_decay: f32,
    /// Congestion added per saturated edge per second
    pub saturation_rate: f32,
    /// Edge load at which an edge counts as saturated
    pub saturation_load: u32,
    /// Penalty when a demand spawn fails (unbound or unroutable)
    pub spawn_failure_penalty: f32,
    /// Penalty when a vehicle at its store finds no way home
    pub dead_end_penalty: f32,
    /// Penalty per second while a vehicle sits on a removed edge
    pub stale_route_penalty: f32,

    /// Minimum time a vehicle dwells before crossing into the next leg
    pub dwell_base: f32,
    /// Dwell reduction per traffic-light level
    pub dwell_light_step: f32,
    /// Dwell reduction per roundabout level
    pub dwell_roundabout_step: f32,
    /// Dwell never drops below this
    pub dwell_min: f32,
    /// Edge capacity before over-capacity waits kick in (plus light level)
    pub edge_capacity_base: u32,
    /// Dwell progress lost per second while the leg edge is over capacity
    pub over_capacity_wait: f32,

    /// Router: cost added per unit of live edge load (freeform policy)
    pub router_load_penalty: f32,

    /// Snap radius for resolving points to existing nodes and for
    /// binding endpoints to the network
    pub snap_radius: f32,
    /// Max distance from a segment for remove-nearest to take effect
    pub removal_tolerance: f32,
    /// Crossings closer than this to a segment endpoint don't split
    pub crossing_endpoint_tolerance: f32,

    /// Upgrade magnitudes
    pub road_quota_upgrade: u32,
    pub bridge_credit_upgrade: u32,

    /// Largest delta time a single step will accept
    pub max_step_dt: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_cols: 32,
            grid_rows: 20,
            cell_size: 28.0,
            world_width: 896.0,
            world_height: 560.0,

            initial_road_budget: 130,
            initial_bridge_credits: 3,

            day_seconds: 16.0,
            week_days: 7,
            color_unlock_days: 3,
            max_pairs: 12,
            initial_pairs: 5,

            car_speed_cells_per_sec: 3.1,
            spawn_base: 0.11,
            spawn_growth_per_week: 0.022,
            max_cars_per_color_base: 6,
            spawn_interval_min: 1.8,
            spawn_interval_spread: 6.0,
            backlog_retry_window: 0.8,

            failure_threshold: 50.0,
            congestion_decay: 0.02,
            saturation_rate: 0.035,
            saturation_load: 3,
            spawn_failure_penalty: 0.15,
            dead_end_penalty: 0.22,
            stale_route_penalty: 0.05,

            dwell_base: 0.24,
            dwell_light_step: 0.03,
            dwell_roundabout_step: 0.02,
            dwell_min: 0.05,
            edge_capacity_base: 1,
            over_capacity_wait: 0.7,

            router_load_penalty: 6.0,

            snap_radius: 14.0,
            removal_tolerance: 14.0,
            crossing_endpoint_tolerance: 4.0,

            road_quota_upgrade: 24,
            bridge_credit_upgrade: 3,

            max_step_dt: 0.1,
        }
    }
}

impl SimConfig {
    /// Vehicle speed in world units per second
    pub fn car_speed(&self) -> f32 {
        self.car_speed_cells_per_sec * self.cell_size
    }
}
