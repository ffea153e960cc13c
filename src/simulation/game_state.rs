//! Run-level state: upgrades, the week-boundary pause and the failure rule
//!
//! Upgrades are a tagged enumeration applied through one pure dispatch
//! function; no effect closures, no ambient state.

use serde::{Deserialize, Serialize};

use super::budget::ResourceBudget;
use super::config::SimConfig;

/// The run-level state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    /// Week boundary reached; nothing advances until an upgrade is picked
    PausedForUpgrade,
    /// Congestion crossed the failure threshold; terminal until reset
    Stopped,
}

/// Fixed upgrade catalog sampled at every week boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeKind {
    /// Raise the road segment quota
    RoadQuota,
    /// Grant extra bridge credits
    BridgeCredits,
    /// Traffic lights: +1 edge capacity, shorter dwell
    TrafficLights,
    /// Roundabouts: shorter dwell
    Roundabouts,
}

pub const UPGRADE_CATALOG: [UpgradeKind; 4] = [
    UpgradeKind::RoadQuota,
    UpgradeKind::BridgeCredits,
    UpgradeKind::TrafficLights,
    UpgradeKind::Roundabouts,
];

/// Flow-improvement upgrade counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevels {
    pub lights: u32,
    pub roundabouts: u32,
}

/// Apply one upgrade to the budget/levels it targets
pub fn apply_upgrade(
    kind: UpgradeKind,
    cfg: &SimConfig,
    budget: &mut ResourceBudget,
    levels: &mut UpgradeLevels,
) {
    match kind {
        UpgradeKind::RoadQuota => budget.max_roads += cfg.road_quota_upgrade,
        UpgradeKind::BridgeCredits => budget.bridge_credits += cfg.bridge_credit_upgrade,
        UpgradeKind::TrafficLights => levels.lights += 1,
        UpgradeKind::Roundabouts => levels.roundabouts += 1,
    }
}

/// Coarse congestion health reported to the frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CongestionTier {
    Flowing,
    Slowdown,
    Critical,
}

/// Pure evaluator of the congestion meter against the failure threshold
#[derive(Debug, Clone, Copy)]
pub struct FailureMonitor {
    pub threshold: f32,
}

impl FailureMonitor {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn failed(&self, congestion: f32) -> bool {
        congestion >= self.threshold
    }

    pub fn tier(&self, congestion: f32) -> CongestionTier {
        let ratio = congestion / self.threshold;
        if ratio < 0.45 {
            CongestionTier::Flowing
        } else if ratio < 0.8 {
            CongestionTier::Slowdown
        } else {
            CongestionTier::Critical
        }
    }
}
