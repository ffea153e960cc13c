//! Standalone transit simulation module
//!
//! This module contains all the core road-building and traffic-flow logic.
//! It runs independently of any rendering layer and can be driven headless
//! from a console harness or from tests.

mod budget;
mod config;
mod endpoint;
mod game_state;
mod network;
mod router;
mod snapshot;
mod traffic;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use budget::ResourceBudget;
#[allow(unused_imports)]
pub use config::SimConfig;
#[allow(unused_imports)]
pub use endpoint::{Endpoint, EndpointKind, EndpointRegistry};
#[allow(unused_imports)]
pub use game_state::{
    apply_upgrade, CongestionTier, FailureMonitor, RunState, UpgradeKind, UpgradeLevels,
    UPGRADE_CATALOG,
};
#[allow(unused_imports)]
pub use network::{AddSegmentOutcome, EdgeData, NodeData, RoadNetwork};
#[allow(unused_imports)]
pub use router::{RoutePolicy, Router};
#[allow(unused_imports)]
pub use snapshot::{
    EdgeView, EndpointView, FrameSnapshot, NodeView, SaveState, VehicleView,
};
#[allow(unused_imports)]
pub use traffic::TrafficSimulator;
#[allow(unused_imports)]
pub use types::{
    ColorId, EndpointId, IdGen, Position, RiverSpan, SimError, SimId, SimRng, TopologyMode,
    VehicleId,
};
#[allow(unused_imports)]
pub use vehicle::{TripPhase, Vehicle, VehicleStep};
pub use world::{EditCommand, SimWorld};
