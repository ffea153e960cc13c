//! Traffic flow: demand spawning, vehicle advancement, congestion
//!
//! One tick is a strictly sequential pass: reset loads, spawn demand,
//! advance every vehicle, then accumulate and decay the congestion meter.
//! Every failure here recovers locally into the meter or a backlog.

use std::collections::HashMap;

use log::debug;

use super::config::SimConfig;
use super::endpoint::EndpointRegistry;
use super::game_state::UpgradeLevels;
use super::network::RoadNetwork;
use super::router::Router;
use super::types::{ColorId, EndpointId, IdGen, SimError, SimRng, VehicleId};
use super::vehicle::{TripPhase, Vehicle, VehicleStep};

pub struct TrafficSimulator {
    pub vehicles: HashMap<VehicleId, Vehicle>,
    /// Global congestion meter, clamped at a zero floor
    pub congestion: f32,
    /// Completed round trips
    pub score: u64,
}

impl Default for TrafficSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficSimulator {
    pub fn new() -> Self {
        Self {
            vehicles: HashMap::new(),
            congestion: 0.0,
            score: 0,
        }
    }

    pub fn active_count_for(&self, color: ColorId) -> usize {
        self.vehicles.values().filter(|v| v.color == color).count()
    }

    /// Run one simulation tick over the current topology
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        dt: f32,
        net: &mut RoadNetwork,
        endpoints: &mut EndpointRegistry,
        router: &Router,
        cfg: &SimConfig,
        levels: &UpgradeLevels,
        week: u32,
        ids: &mut IdGen,
        rng: &mut SimRng,
    ) {
        net.reset_loads();
        self.spawn_demand(dt, net, endpoints, router, cfg, week, ids, rng);
        self.update_vehicles(dt, net, endpoints, router, cfg, levels);

        let saturated = net.saturated_edge_count(cfg.saturation_load);
        self.congestion += saturated as f32 * dt * cfg.saturation_rate;
        self.congestion = (self.congestion - dt * cfg.congestion_decay).max(0.0);
    }

    /// Demand pass: tick every house's countdown, spawn when the per-color
    /// cap allows, retry backlog opportunistically near timer expiry.
    #[allow(clippy::too_many_arguments)]
    fn spawn_demand(
        &mut self,
        dt: f32,
        net: &RoadNetwork,
        endpoints: &mut EndpointRegistry,
        router: &Router,
        cfg: &SimConfig,
        week: u32,
        ids: &mut IdGen,
        rng: &mut SimRng,
    ) {
        let spawn_scale = cfg.spawn_base + cfg.spawn_growth_per_week * (week.saturating_sub(1)) as f32;
        let cap = (cfg.max_cars_per_color_base + week) as usize;

        let house_ids: Vec<EndpointId> = endpoints.houses().map(|h| h.id).collect();
        for house_id in house_ids {
            let (color, timer_expired, retry_window) = {
                let Some(house) = endpoints.get_mut(house_id) else {
                    continue;
                };
                house.spawn_timer -= dt;
                (
                    house.color,
                    house.spawn_timer <= 0.0,
                    house.spawn_timer < cfg.backlog_retry_window,
                )
            };
            let active = self.active_count_for(color);

            if timer_expired && active < cap {
                match self.try_spawn(house_id, net, endpoints, router, ids) {
                    Ok(()) => {}
                    Err(err) => {
                        debug!("spawn failed for house {house_id:?}: {err}");
                        if let Some(house) = endpoints.get_mut(house_id) {
                            house.backlog += 1;
                        }
                        self.congestion += cfg.spawn_failure_penalty;
                    }
                }
                let interval =
                    cfg.spawn_interval_min + rng.random_range(0.0..cfg.spawn_interval_spread);
                if let Some(house) = endpoints.get_mut(house_id) {
                    house.spawn_timer = interval / spawn_scale;
                }
            } else if retry_window && active < cap {
                let backlog = endpoints.get(house_id).map(|h| h.backlog).unwrap_or(0);
                if backlog > 0 {
                    match self.try_spawn(house_id, net, endpoints, router, ids) {
                        Ok(()) => {
                            if let Some(house) = endpoints.get_mut(house_id) {
                                house.backlog -= 1;
                            }
                        }
                        Err(err) => {
                            // Retries are opportunistic; only the original
                            // failure charged the meter.
                            debug!("backlog retry failed for house {house_id:?}: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Create one vehicle for the house's color pair. Requires both
    /// endpoints bound to the network and a live route between them.
    fn try_spawn(
        &mut self,
        house_id: EndpointId,
        net: &RoadNetwork,
        endpoints: &EndpointRegistry,
        router: &Router,
        ids: &mut IdGen,
    ) -> Result<(), SimError> {
        let house = endpoints.get(house_id).ok_or(SimError::UnboundEndpoint)?;
        let store = endpoints
            .store_for_color(house.color)
            .ok_or(SimError::UnboundEndpoint)?;
        if house.binding.is_none() || store.binding.is_none() {
            return Err(SimError::UnboundEndpoint);
        }

        let path = router
            .route(net, house.binding, store.binding)
            .ok_or(SimError::Unroutable)?;
        if path.len() < 2 {
            return Err(SimError::Unroutable);
        }

        let id = VehicleId(ids.next());
        let vehicle = Vehicle::new(
            id,
            house.color,
            house.id,
            store.id,
            path,
            house.position,
        );
        self.vehicles.insert(id, vehicle);
        Ok(())
    }

    /// Advance every vehicle one tick, resolving end-of-path transitions
    fn update_vehicles(
        &mut self,
        dt: f32,
        net: &mut RoadNetwork,
        endpoints: &EndpointRegistry,
        router: &Router,
        cfg: &SimConfig,
        levels: &UpgradeLevels,
    ) {
        // Deterministic order so load accumulation reproduces under a seed
        let mut vehicle_ids: Vec<VehicleId> = self.vehicles.keys().copied().collect();
        vehicle_ids.sort();

        for vehicle_id in vehicle_ids {
            let Some(mut vehicle) = self.vehicles.remove(&vehicle_id) else {
                continue;
            };
            match vehicle.advance(dt, net, cfg, levels) {
                VehicleStep::Moving => {
                    self.vehicles.insert(vehicle_id, vehicle);
                }
                VehicleStep::Stalled => {
                    // A leg of the committed path was edited away; the
                    // vehicle waits in place and pressures the meter.
                    self.congestion += cfg.stale_route_penalty * dt;
                    self.vehicles.insert(vehicle_id, vehicle);
                }
                VehicleStep::PathComplete => match vehicle.phase {
                    TripPhase::ToStore => {
                        let back = endpoints
                            .get(vehicle.store)
                            .zip(endpoints.get(vehicle.house))
                            .and_then(|(store, house)| {
                                router
                                    .route(net, store.binding, house.binding)
                                    .map(|path| (path, store.position))
                            });
                        match back {
                            Some((path, store_pos)) if path.len() >= 2 => {
                                vehicle.turn_home(path, store_pos);
                                self.vehicles.insert(vehicle_id, vehicle);
                            }
                            _ => {
                                debug!("vehicle {vehicle_id:?} has no way home, removing");
                                self.congestion += cfg.dead_end_penalty;
                            }
                        }
                    }
                    TripPhase::ToHome => {
                        self.score += 1;
                    }
                },
            }
        }
    }
}
