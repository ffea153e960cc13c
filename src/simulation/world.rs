//! Main simulation world that ties everything together
//!
//! One controller object owns every component and exposes a single
//! `step(dt)` entry point any driver can call: a real-time loop, a
//! headless harness or a deterministic replay. Edit commands are explicit
//! values queued by the input layer and drained between ticks.

use std::collections::VecDeque;

use anyhow::{bail, Result};
use log::{info, warn};

use super::budget::ResourceBudget;
use super::config::SimConfig;
use super::endpoint::{Endpoint, EndpointKind, EndpointRegistry};
use super::game_state::{
    apply_upgrade, FailureMonitor, RunState, UpgradeKind, UpgradeLevels, UPGRADE_CATALOG,
};
use super::network::{AddSegmentOutcome, RoadNetwork};
use super::router::Router;
use super::snapshot::{EdgeView, EndpointView, FrameSnapshot, NodeView, SaveState, VehicleView};
use super::traffic::TrafficSimulator;
use super::types::{
    ColorId, EndpointId, IdGen, Position, RiverSpan, SimError, SimRng, TopologyMode,
};

/// A discrete network edit, queued by the input layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditCommand {
    AddSegment { from: Position, to: Position },
    RemoveNearest { at: Position },
}

pub struct SimWorld {
    pub config: SimConfig,
    pub network: RoadNetwork,
    pub budget: ResourceBudget,
    pub endpoints: EndpointRegistry,
    pub traffic: TrafficSimulator,
    pub router: Router,
    pub levels: UpgradeLevels,
    pub run_state: RunState,
    /// The three catalog entries offered while paused for an upgrade
    pub offered_upgrades: Vec<UpgradeKind>,

    pub day: u32,
    pub week: u32,
    pub elapsed: f32,
    next_color: u32,

    pending_edits: VecDeque<EditCommand>,
    pub(crate) ids: IdGen,
    pub(crate) rng: SimRng,
}

impl SimWorld {
    pub fn new_grid(config: SimConfig, seed: Option<u64>) -> Self {
        let mode = TopologyMode::Grid {
            cols: config.grid_cols,
            rows: config.grid_rows,
            cell_size: config.cell_size,
        };
        Self::new_internal(mode, config, seed)
    }

    pub fn new_freeform(config: SimConfig, seed: Option<u64>) -> Self {
        Self::new_internal(TopologyMode::Freeform, config, seed)
    }

    fn new_internal(mode: TopologyMode, config: SimConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => SimRng::seeded(seed),
            None => SimRng::unseeded(),
        };
        let river = build_river(mode, &config, &mut rng);
        let mut world = Self {
            budget: ResourceBudget::new(config.initial_road_budget, config.initial_bridge_credits),
            network: RoadNetwork::new(mode, river),
            endpoints: EndpointRegistry::default(),
            traffic: TrafficSimulator::new(),
            router: Router::for_mode(mode, config.router_load_penalty),
            levels: UpgradeLevels::default(),
            run_state: RunState::Running,
            offered_upgrades: Vec::new(),
            day: 1,
            week: 1,
            elapsed: 0.0,
            next_color: 0,
            pending_edits: VecDeque::new(),
            ids: IdGen::new(),
            rng,
            config,
        };
        for _ in 0..world.config.initial_pairs {
            world.add_color_pair();
        }
        world
    }

    /// Rebuild a fresh Running world with the same config and topology
    /// mode; the only way out of the Stopped state.
    pub fn reset(&mut self, seed: Option<u64>) {
        *self = Self::new_internal(self.network.mode, self.config.clone(), seed);
    }

    // --- edits ----------------------------------------------------------

    /// Queue an edit for the next step; never interleaves with a tick
    pub fn queue_edit(&mut self, cmd: EditCommand) {
        self.pending_edits.push_back(cmd);
    }

    /// Apply an edit immediately (between ticks)
    pub fn apply_edit(&mut self, cmd: EditCommand) -> Result<AddSegmentOutcome, SimError> {
        let outcome = match cmd {
            EditCommand::AddSegment { from, to } => {
                self.network
                    .add_segment(from, to, &mut self.budget, &self.config)?
            }
            EditCommand::RemoveNearest { at } => {
                let removed =
                    self.network
                        .remove_segment_near(at, &mut self.budget, &self.config);
                if !removed {
                    warn!("nothing to remove near ({:.1}, {:.1})", at.x, at.y);
                }
                AddSegmentOutcome {
                    segments_added: 0,
                    blocked: None,
                }
            }
        };
        // Topology changed; every weak binding is derived from it
        self.endpoints
            .rebind_all(&self.network, self.config.snap_radius);
        Ok(outcome)
    }

    fn drain_edits(&mut self) {
        while let Some(cmd) = self.pending_edits.pop_front() {
            if let Err(err) = self.apply_edit(cmd) {
                warn!("edit rejected: {err}");
            }
        }
    }

    // --- upgrades ---------------------------------------------------------

    /// Pick one of the three offered upgrades, resuming the run
    pub fn choose_upgrade(&mut self, index: usize) -> Result<()> {
        if self.run_state != RunState::PausedForUpgrade {
            bail!("no upgrade choice is pending");
        }
        let Some(&kind) = self.offered_upgrades.get(index) else {
            bail!("upgrade index {index} out of range");
        };
        apply_upgrade(kind, &self.config, &mut self.budget, &mut self.levels);
        info!("upgrade applied: {kind:?}");
        self.offered_upgrades.clear();
        self.run_state = RunState::Running;
        Ok(())
    }

    fn offer_upgrades(&mut self) {
        self.offered_upgrades = self
            .rng
            .choose_multiple(&UPGRADE_CATALOG, 3)
            .into_iter()
            .copied()
            .collect();
        self.run_state = RunState::PausedForUpgrade;
    }

    // --- time ---------------------------------------------------------------

    /// Advance day/week counters from elapsed time. Returns true when a
    /// week boundary pauses the run.
    fn update_time(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        let next_day = (self.elapsed / self.config.day_seconds) as u32 + 1;
        if next_day <= self.day {
            return false;
        }
        self.day = next_day;

        if self.day % self.config.color_unlock_days == 0 {
            self.add_color_pair();
        }
        if (self.day - 1) % self.config.week_days == 0 {
            self.week += 1;
            self.offer_upgrades();
            return true;
        }
        false
    }

    /// Unlock one new house/store pair at random free positions
    fn add_color_pair(&mut self) {
        if self.endpoints.house_count() >= self.config.max_pairs {
            return;
        }
        let color = ColorId(self.next_color);
        self.next_color += 1;

        let mut placed = self.endpoints.positions();
        let house_pos = self.random_free_position(&placed);
        placed.push(house_pos);
        let store_pos = self.random_free_position(&placed);

        let initial_timer = 2.0 + self.rng.random_range(0.0..4.0);
        let house = Endpoint::new(
            EndpointId(self.ids.next()),
            EndpointKind::House,
            color,
            house_pos,
            initial_timer,
        );
        let store = Endpoint::new(
            EndpointId(self.ids.next()),
            EndpointKind::Store,
            color,
            store_pos,
            0.0,
        );
        self.endpoints.push(house);
        self.endpoints.push(store);
        self.endpoints
            .rebind_all(&self.network, self.config.snap_radius);
        info!("color pair {} unlocked", color.0);
    }

    /// Random non-river position keeping clear of already-placed endpoints
    fn random_free_position(&mut self, avoid: &[Position]) -> Position {
        let cell_size = self.config.cell_size;
        let min_spacing = 4.0 * cell_size;
        for _ in 0..400 {
            let candidate = match self.network.mode {
                TopologyMode::Grid { cols, rows, .. } => {
                    let cell = (
                        self.rng.random_index(cols as usize) as i32,
                        self.rng.random_index(rows as usize) as i32,
                    );
                    if self.network.is_river_cell(cell) {
                        continue;
                    }
                    self.network.cell_center(cell)
                }
                TopologyMode::Freeform => {
                    let p = Position::new(
                        self.rng.random_range(0.0..self.config.world_width),
                        self.rng.random_range(0.0..self.config.world_height),
                    );
                    if let Some(river) = self.network.river {
                        if river.contains_x(p.x) {
                            continue;
                        }
                    }
                    p
                }
            };
            let too_close = avoid.iter().any(|p| {
                (p.x - candidate.x).abs() + (p.y - candidate.y).abs() < min_spacing
            });
            if !too_close {
                return candidate;
            }
        }
        // Dense map fallback, mirrors the bounded retry budget
        self.network.cell_center((1, 1))
    }

    // --- the tick -------------------------------------------------------

    /// Advance the simulation by one frame. The delta is clamped to avoid
    /// large-dt spirals after a host stall. Ticks only run in the Running
    /// state; queued edits apply regardless so players can keep building
    /// while paused.
    pub fn step(&mut self, dt: f32) {
        let dt = dt.min(self.config.max_step_dt);
        self.drain_edits();

        if self.run_state != RunState::Running {
            return;
        }

        if self.update_time(dt) {
            // Week boundary: the pause takes effect before any demand,
            // movement or congestion for this frame.
            return;
        }

        self.traffic.tick(
            dt,
            &mut self.network,
            &mut self.endpoints,
            &self.router,
            &self.config,
            &self.levels,
            self.week,
            &mut self.ids,
            &mut self.rng,
        );

        let monitor = FailureMonitor::new(self.config.failure_threshold);
        if monitor.failed(self.traffic.congestion) {
            warn!(
                "network jam reached {:.1}, run stopped",
                self.traffic.congestion
            );
            self.run_state = RunState::Stopped;
        }
    }

    // --- convenience --------------------------------------------------------

    pub fn congestion(&self) -> f32 {
        self.traffic.congestion
    }

    pub fn score(&self) -> u64 {
        self.traffic.score
    }

    /// Build a demo world: grid mode, seeded, with every color pair
    /// already wired up through a central trunk road.
    pub fn create_demo_world(seed: u64) -> Self {
        let mut world = Self::new_grid(SimConfig::default(), Some(seed));
        let pairs: Vec<(Position, Position)> = world
            .endpoints
            .houses()
            .filter_map(|h| {
                world
                    .endpoints
                    .store_for_color(h.color)
                    .map(|s| (h.position, s.position))
            })
            .collect();
        for (from, to) in pairs {
            if let Err(err) = world.apply_edit(EditCommand::AddSegment { from, to }) {
                warn!("demo road rejected: {err}");
            }
        }
        world
    }

    /// Print a one-screen summary of the world state
    pub fn print_summary(&self) {
        println!("=== Transit Tangle Summary ===");
        println!(
            "Day {} / Week {} | elapsed {:.1}s | state {:?}",
            self.day, self.week, self.elapsed, self.run_state
        );
        println!(
            "Roads: {} / {} | Bridges: {} | Lights: {} | Roundabouts: {}",
            self.budget.roads_used,
            self.budget.max_roads,
            self.budget.bridge_credits,
            self.levels.lights,
            self.levels.roundabouts
        );
        let monitor = FailureMonitor::new(self.config.failure_threshold);
        println!(
            "Trips: {} | Congestion: {:.2} ({:?})",
            self.traffic.score,
            self.traffic.congestion,
            monitor.tier(self.traffic.congestion)
        );
        println!(
            "Vehicles: {} | Endpoints: {} | Backlog total: {}",
            self.traffic.vehicles.len(),
            self.endpoints.endpoints.len(),
            self.endpoints
                .endpoints
                .iter()
                .map(|e| e.backlog)
                .sum::<u32>()
        );
    }
}

// --- persistence and the frame view ------------------------------------

impl SimWorld {
    /// Capture durable state. Vehicles, loads and bindings are derived
    /// and deliberately left out.
    pub fn save_state(&self) -> SaveState {
        SaveState {
            config: self.config.clone(),
            mode: self.network.mode,
            river: self.network.river,
            graph: self.network.graph().clone(),
            endpoints: self.endpoints.clone(),
            budget: self.budget.clone(),
            levels: self.levels,
            day: self.day,
            week: self.week,
            elapsed: self.elapsed,
            score: self.traffic.score,
            congestion: self.traffic.congestion,
        }
    }

    /// Rebuild a Running world from a save, recomputing all derived state
    pub fn from_save(save: SaveState, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SimRng::seeded(seed),
            None => SimRng::unseeded(),
        };
        let network = RoadNetwork::from_saved(save.mode, save.river, save.graph);
        let mut endpoints = save.endpoints;
        endpoints.rebind_all(&network, save.config.snap_radius);
        for endpoint in &mut endpoints.endpoints {
            endpoint.spawn_timer = 1.0;
        }
        let next_color = endpoints
            .endpoints
            .iter()
            .map(|e| e.color.0 + 1)
            .max()
            .unwrap_or(0);
        let ids = IdGen::resume_after(endpoints.max_raw_id());

        let mut traffic = TrafficSimulator::new();
        traffic.score = save.score;
        traffic.congestion = save.congestion;

        Self {
            router: Router::for_mode(save.mode, save.config.router_load_penalty),
            network,
            endpoints,
            traffic,
            budget: save.budget,
            levels: save.levels,
            run_state: RunState::Running,
            offered_upgrades: Vec::new(),
            day: save.day,
            week: save.week,
            elapsed: save.elapsed,
            next_color,
            pending_edits: VecDeque::new(),
            ids,
            rng,
            config: save.config,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.save_state())?)
    }

    pub fn from_json(json: &str, seed: Option<u64>) -> Result<Self> {
        let save: SaveState = serde_json::from_str(json)?;
        Ok(Self::from_save(save, seed))
    }

    /// Read-only view of the current frame for a rendering layer
    pub fn frame_snapshot(&self) -> FrameSnapshot {
        let graph = self.network.graph();
        let nodes = graph
            .node_indices()
            .map(|n| {
                let data = &graph[n];
                NodeView {
                    position: data.pos,
                    is_intersection: data.is_intersection,
                    is_bridge: data.is_bridge,
                }
            })
            .collect();
        let edges = graph
            .edge_indices()
            .filter_map(|e| {
                let (u, v) = graph.edge_endpoints(e)?;
                let data = &graph[e];
                Some(EdgeView {
                    from: graph[u].pos,
                    to: graph[v].pos,
                    load: data.load,
                    is_bridge: data.is_bridge,
                })
            })
            .collect();
        let endpoints = self
            .endpoints
            .endpoints
            .iter()
            .map(|e| EndpointView {
                kind: e.kind,
                color: e.color,
                position: e.position,
                backlog: e.backlog,
                bound: e.binding.is_some(),
            })
            .collect();
        let vehicles = self
            .traffic
            .vehicles
            .values()
            .map(|v| VehicleView {
                color: v.color,
                position: v.position,
                angle: v.angle,
                phase: v.phase,
            })
            .collect();

        let monitor = FailureMonitor::new(self.config.failure_threshold);
        FrameSnapshot {
            nodes,
            edges,
            endpoints,
            vehicles,
            day: self.day,
            week: self.week,
            roads_used: self.budget.roads_used,
            road_quota: self.budget.max_roads,
            bridge_credits: self.budget.bridge_credits,
            score: self.traffic.score,
            congestion: self.traffic.congestion,
            congestion_tier: monitor.tier(self.traffic.congestion),
            run_state: self.run_state,
        }
    }
}

/// Carve the river: a 2-3 column band starting 35-55% across the map
fn build_river(mode: TopologyMode, config: &SimConfig, rng: &mut SimRng) -> Option<RiverSpan> {
    match mode {
        TopologyMode::Grid {
            cols, cell_size, ..
        } => {
            let start = (cols as f32 * (0.35 + rng.random_range(0.0..0.2))).floor();
            let width = 2.0 + rng.random_index(2) as f32;
            Some(RiverSpan {
                min_x: start * cell_size,
                max_x: (start + width) * cell_size,
            })
        }
        TopologyMode::Freeform => {
            let start = config.world_width * (0.35 + rng.random_range(0.0..0.2));
            let width = config.cell_size * (2.0 + rng.random_range(0.0..1.0));
            Some(RiverSpan {
                min_x: start,
                max_x: start + width,
            })
        }
    }
}
