//! Core simulation mechanics validation
//!
//! Exercises the budget accounting, both topology modes, routing policies,
//! demand spawning and the run-level state machine.

use transit_tangle::simulation::{
    apply_upgrade, ColorId, CongestionTier, EditCommand, Endpoint, EndpointId, EndpointKind,
    EndpointRegistry, FailureMonitor, IdGen, Position, ResourceBudget, RiverSpan, RoadNetwork,
    RoutePolicy, Router, RunState, SimConfig, SimError, SimId, SimRng, SimWorld, TopologyMode,
    TrafficSimulator, UpgradeKind, UpgradeLevels, Vehicle, VehicleId,
};

fn grid_mode() -> TopologyMode {
    TopologyMode::Grid {
        cols: 32,
        rows: 20,
        cell_size: 28.0,
    }
}

#[test]
fn test_grid_budget_tracks_segment_count() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut budget = ResourceBudget::new(130, 3);

    let a = net.cell_center((0, 0));
    let b = net.cell_center((5, 0));
    let outcome = net.add_segment(a, b, &mut budget, &cfg).unwrap();
    assert_eq!(outcome.segments_added, 6);
    assert!(outcome.blocked.is_none());
    assert_eq!(budget.roads_used, 6);
    assert_eq!(net.segment_count(), 6);

    // Removing refunds and the counters stay in lockstep
    assert!(net.remove_segment_near(net.cell_center((2, 0)), &mut budget, &cfg));
    assert_eq!(budget.roads_used, 5);
    assert_eq!(net.segment_count(), 5);
}

#[test]
fn test_grid_add_applies_partially_when_quota_runs_out() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut budget = ResourceBudget::new(3, 0);

    let a = net.cell_center((0, 0));
    let b = net.cell_center((5, 0));
    let outcome = net.add_segment(a, b, &mut budget, &cfg).unwrap();
    assert_eq!(outcome.segments_added, 3);
    assert_eq!(outcome.blocked, Some(SimError::BudgetExceeded));
    assert_eq!(net.segment_count(), 3);
    assert_eq!(budget.roads_used, 3);

    // A drag that can't place even its first cell is an outright error
    let mut empty = ResourceBudget::new(0, 0);
    let mut fresh = RoadNetwork::new(grid_mode(), None);
    let result = fresh.add_segment(a, b, &mut empty, &cfg);
    assert_eq!(result.unwrap_err(), SimError::BudgetExceeded);
    assert_eq!(fresh.segment_count(), 0);
}

#[test]
fn test_grid_bridge_credit_consumed_and_refunded() {
    let cfg = SimConfig::default();
    // Cell column 2 (center x = 70) is water
    let river = RiverSpan {
        min_x: 56.0,
        max_x: 84.0,
    };
    let mut net = RoadNetwork::new(grid_mode(), Some(river));
    let mut budget = ResourceBudget::new(20, 1);

    assert!(net.is_river_cell((2, 0)));
    assert!(!net.is_river_cell((1, 0)));

    let a = net.cell_center((0, 0));
    let b = net.cell_center((4, 0));
    let outcome = net.add_segment(a, b, &mut budget, &cfg).unwrap();
    assert_eq!(outcome.segments_added, 5);
    assert_eq!(budget.bridge_credits, 0);
    assert_eq!(budget.roads_used, 5);

    // Removing the bridge cell gives the credit back
    assert!(net.remove_segment_near(net.cell_center((2, 0)), &mut budget, &cfg));
    assert_eq!(budget.bridge_credits, 1);
    assert_eq!(budget.roads_used, 4);
}

#[test]
fn test_grid_crossing_stops_at_river_without_credit() {
    let cfg = SimConfig::default();
    let river = RiverSpan {
        min_x: 56.0,
        max_x: 84.0,
    };
    let mut net = RoadNetwork::new(grid_mode(), Some(river));
    let mut budget = ResourceBudget::new(20, 0);

    let a = net.cell_center((0, 0));
    let b = net.cell_center((4, 0));
    let outcome = net.add_segment(a, b, &mut budget, &cfg).unwrap();
    // The walk laid cells 0 and 1, then hit the water with no credit
    assert_eq!(outcome.segments_added, 2);
    assert_eq!(outcome.blocked, Some(SimError::NoBridgeCredit));
    assert_eq!(budget.roads_used, 2);
    assert_eq!(budget.bridge_credits, 0);
}

#[test]
fn test_freeform_bridge_rejection_is_atomic() {
    let cfg = SimConfig::default();
    let river = RiverSpan {
        min_x: 40.0,
        max_x: 60.0,
    };
    let mut net = RoadNetwork::new(TopologyMode::Freeform, Some(river));
    let mut budget = ResourceBudget::new(10, 0);

    let result = net.add_segment(
        Position::new(10.0, 10.0),
        Position::new(90.0, 10.0),
        &mut budget,
        &cfg,
    );
    assert_eq!(result.unwrap_err(), SimError::NoBridgeCredit);
    // Nothing was placed and nothing was charged
    assert_eq!(budget.roads_used, 0);
    assert_eq!(net.node_count(), 0);
    assert_eq!(net.edge_count(), 0);

    // With a credit the same segment goes through
    let mut funded = ResourceBudget::new(10, 1);
    let outcome = net
        .add_segment(
            Position::new(10.0, 10.0),
            Position::new(90.0, 10.0),
            &mut funded,
            &cfg,
        )
        .unwrap();
    assert_eq!(outcome.segments_added, 1);
    assert_eq!(funded.bridge_credits, 0);
    assert_eq!(net.segment_count(), 1);
}

#[test]
fn test_freeform_crossing_splits_both_segments() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(TopologyMode::Freeform, None);
    let mut budget = ResourceBudget::new(20, 0);

    net.add_segment(
        Position::new(0.0, 50.0),
        Position::new(100.0, 50.0),
        &mut budget,
        &cfg,
    )
    .unwrap();
    assert_eq!(net.segment_count(), 1);

    let outcome = net
        .add_segment(
            Position::new(50.0, 0.0),
            Position::new(50.0, 100.0),
            &mut budget,
            &cfg,
        )
        .unwrap();
    assert_eq!(outcome.segments_added, 2);

    // One crossing: the old edge split in two plus the two-part chain
    assert_eq!(net.edge_count(), 4);
    assert_eq!(net.node_count(), 5);
    assert_eq!(budget.roads_used, 4);
    assert_eq!(net.segment_count(), budget.roads_used as usize);

    // The split point became an intersection node
    let mid = net
        .nearest_node_within(&Position::new(50.0, 50.0), 1.0)
        .unwrap();
    assert!(net.node(mid).unwrap().is_intersection);
    assert_eq!(net.degree(mid), 4);
}

#[test]
fn test_freeform_duplicate_segment_is_a_no_op() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(TopologyMode::Freeform, None);
    let mut budget = ResourceBudget::new(20, 0);

    let a = Position::new(0.0, 0.0);
    let b = Position::new(100.0, 0.0);
    net.add_segment(a, b, &mut budget, &cfg).unwrap();
    let outcome = net.add_segment(a, b, &mut budget, &cfg).unwrap();
    assert_eq!(outcome.segments_added, 0);
    assert_eq!(budget.roads_used, 1);
    assert_eq!(net.segment_count(), 1);
}

#[test]
fn test_grid_route_prefers_connected_cells() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut budget = ResourceBudget::new(20, 0);

    // A 2x2 cycle; the extra cell at (2,0) boosts (1,0)'s degree
    let add = |net: &mut RoadNetwork, budget: &mut ResourceBudget, from, to| {
        let (a, b) = (net.cell_center(from), net.cell_center(to));
        net.add_segment(a, b, budget, &cfg).unwrap();
    };
    add(&mut net, &mut budget, (0, 0), (1, 1));
    add(&mut net, &mut budget, (0, 1), (0, 1));
    add(&mut net, &mut budget, (2, 0), (2, 0));

    let start = net.node_at_cell((0, 0)).unwrap();
    let goal = net.node_at_cell((1, 1)).unwrap();
    let via = net.node_at_cell((1, 0)).unwrap();
    assert_eq!(net.degree(via), 3);

    let router = Router::new(RoutePolicy::DegreeBfs, 0.0);
    let path = router.route(&net, Some(start), Some(goal)).unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(path[1], via);
}

#[test]
fn test_congestion_weighted_router_avoids_loaded_edges() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(TopologyMode::Freeform, None);
    let mut budget = ResourceBudget::new(20, 0);

    // Direct edge of length 100 versus a two-leg detour totalling 140
    let s = Position::new(0.0, 0.0);
    let g = Position::new(100.0, 0.0);
    let m = Position::new(50.0, 48.98979);
    net.add_segment(s, g, &mut budget, &cfg).unwrap();
    net.add_segment(s, m, &mut budget, &cfg).unwrap();
    net.add_segment(m, g, &mut budget, &cfg).unwrap();

    let start = net.nearest_node_within(&s, 1.0).unwrap();
    let goal = net.nearest_node_within(&g, 1.0).unwrap();
    let mid = net.nearest_node_within(&m, 1.0).unwrap();

    let router = Router::new(RoutePolicy::CongestionWeighted, 6.0);
    let unloaded = router.route(&net, Some(start), Some(goal)).unwrap();
    assert_eq!(unloaded, vec![start, goal]);

    // Load 7 on the direct edge makes it cost 100 + 7 * 6 = 142
    let direct = net.edge_between(start, goal).unwrap();
    net.edge_mut(direct).unwrap().load = 7;
    let loaded = router.route(&net, Some(start), Some(goal)).unwrap();
    assert_eq!(loaded, vec![start, mid, goal]);
}

#[test]
fn test_congestion_decays_to_zero() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut endpoints = EndpointRegistry::default();
    let router = Router::for_mode(net.mode, cfg.router_load_penalty);
    let levels = UpgradeLevels::default();
    let mut ids = IdGen::new();
    let mut rng = SimRng::seeded(1);

    let mut sim = TrafficSimulator::new();
    sim.congestion = 10.0;
    for _ in 0..6000 {
        sim.tick(
            0.1,
            &mut net,
            &mut endpoints,
            &router,
            &cfg,
            &levels,
            1,
            &mut ids,
            &mut rng,
        );
    }
    assert_eq!(sim.congestion, 0.0);
    assert!(sim.vehicles.is_empty());
}

#[test]
fn test_unreachable_demand_builds_backlog() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut endpoints = EndpointRegistry::default();
    let house_id = EndpointId(SimId(0));
    endpoints.push(Endpoint::new(
        house_id,
        EndpointKind::House,
        ColorId(0),
        Position::new(14.0, 14.0),
        0.0,
    ));
    endpoints.push(Endpoint::new(
        EndpointId(SimId(1)),
        EndpointKind::Store,
        ColorId(0),
        Position::new(140.0, 14.0),
        0.0,
    ));
    endpoints.rebind_all(&net, cfg.snap_radius);

    let router = Router::for_mode(net.mode, cfg.router_load_penalty);
    let levels = UpgradeLevels::default();
    let mut ids = IdGen::new();
    let mut rng = SimRng::seeded(2);

    let mut sim = TrafficSimulator::new();
    sim.tick(
        0.1,
        &mut net,
        &mut endpoints,
        &router,
        &cfg,
        &levels,
        1,
        &mut ids,
        &mut rng,
    );

    // No roads at all: the demand lands in the backlog and the meter rises
    assert!(sim.vehicles.is_empty());
    assert_eq!(endpoints.get(house_id).unwrap().backlog, 1);
    assert!(sim.congestion > 0.0);
}

#[test]
fn test_stalled_vehicle_pressures_the_meter() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut budget = ResourceBudget::new(20, 0);
    let a = net.cell_center((0, 0));
    let b = net.cell_center((4, 0));
    net.add_segment(a, b, &mut budget, &cfg).unwrap();

    let start = net.node_at_cell((0, 0)).unwrap();
    let goal = net.node_at_cell((4, 0)).unwrap();
    let router = Router::new(RoutePolicy::DegreeBfs, 0.0);
    let path = router.route(&net, Some(start), Some(goal)).unwrap();
    assert_eq!(path.len(), 5);

    // Edit the first leg away after the route was committed
    assert!(net.remove_segment_near(net.cell_center((1, 0)), &mut budget, &cfg));

    let mut sim = TrafficSimulator::new();
    let id = VehicleId(SimId(0));
    sim.vehicles.insert(
        id,
        Vehicle::new(
            id,
            ColorId(0),
            EndpointId(SimId(0)),
            EndpointId(SimId(1)),
            path,
            a,
        ),
    );

    let mut endpoints = EndpointRegistry::default();
    let levels = UpgradeLevels::default();
    let mut ids = IdGen::new();
    let mut rng = SimRng::seeded(3);
    sim.tick(
        0.1,
        &mut net,
        &mut endpoints,
        &router,
        &cfg,
        &levels,
        1,
        &mut ids,
        &mut rng,
    );

    // The vehicle stays put and keeps the tick alive
    assert_eq!(sim.vehicles.len(), 1);
    assert!(sim.congestion > 0.0);
}

#[test]
fn test_round_trip_scores() {
    let cfg = SimConfig::default();
    let mut net = RoadNetwork::new(grid_mode(), None);
    let mut budget = ResourceBudget::new(20, 0);
    let a = net.cell_center((0, 0));
    let b = net.cell_center((5, 0));
    net.add_segment(a, b, &mut budget, &cfg).unwrap();

    let mut endpoints = EndpointRegistry::default();
    endpoints.push(Endpoint::new(
        EndpointId(SimId(0)),
        EndpointKind::House,
        ColorId(0),
        a,
        0.0,
    ));
    endpoints.push(Endpoint::new(
        EndpointId(SimId(1)),
        EndpointKind::Store,
        ColorId(0),
        b,
        0.0,
    ));
    endpoints.rebind_all(&net, cfg.snap_radius);

    let router = Router::for_mode(net.mode, cfg.router_load_penalty);
    let levels = UpgradeLevels::default();
    let mut ids = IdGen::new();
    let mut rng = SimRng::seeded(4);

    let mut sim = TrafficSimulator::new();
    for _ in 0..600 {
        sim.tick(
            0.05,
            &mut net,
            &mut endpoints,
            &router,
            &cfg,
            &levels,
            1,
            &mut ids,
            &mut rng,
        );
    }
    assert!(sim.score >= 1, "no round trip completed in 30s");
}

#[test]
fn test_upgrades_apply() {
    let cfg = SimConfig::default();
    let mut budget = ResourceBudget::new(130, 3);
    let mut levels = UpgradeLevels::default();

    apply_upgrade(UpgradeKind::RoadQuota, &cfg, &mut budget, &mut levels);
    assert_eq!(budget.max_roads, 154);

    apply_upgrade(UpgradeKind::BridgeCredits, &cfg, &mut budget, &mut levels);
    assert_eq!(budget.bridge_credits, 6);

    apply_upgrade(UpgradeKind::TrafficLights, &cfg, &mut budget, &mut levels);
    apply_upgrade(UpgradeKind::Roundabouts, &cfg, &mut budget, &mut levels);
    assert_eq!(levels.lights, 1);
    assert_eq!(levels.roundabouts, 1);
}

#[test]
fn test_week_boundary_pauses_and_resumes() {
    let mut world = SimWorld::new_grid(SimConfig::default(), Some(42));
    for _ in 0..1300 {
        world.step(0.1);
        if world.run_state == RunState::PausedForUpgrade {
            break;
        }
    }
    assert_eq!(world.run_state, RunState::PausedForUpgrade);
    assert_eq!(world.offered_upgrades.len(), 3);
    assert_eq!(world.week, 2);
    assert!(world.day >= 8);

    assert!(world.choose_upgrade(9).is_err());
    world.choose_upgrade(0).unwrap();
    assert_eq!(world.run_state, RunState::Running);
    assert!(world.offered_upgrades.is_empty());
}

#[test]
fn test_color_pairs_unlock_over_time() {
    let mut world = SimWorld::new_grid(SimConfig::default(), Some(7));
    assert_eq!(world.endpoints.house_count(), 5);

    // Day 3 arrives after 32 simulated seconds
    for _ in 0..340 {
        world.step(0.1);
    }
    assert_eq!(world.endpoints.house_count(), 6);
}

#[test]
fn test_failure_stops_the_run() {
    let mut world = SimWorld::new_grid(SimConfig::default(), Some(3));
    world.traffic.congestion = 60.0;
    world.step(0.05);
    assert_eq!(world.run_state, RunState::Stopped);

    // Stopped worlds don't advance
    let elapsed = world.elapsed;
    world.step(0.05);
    assert_eq!(world.elapsed, elapsed);

    world.reset(Some(3));
    assert_eq!(world.run_state, RunState::Running);
    assert_eq!(world.congestion(), 0.0);
}

#[test]
fn test_failure_monitor_tiers() {
    let monitor = FailureMonitor::new(50.0);
    assert_eq!(monitor.tier(10.0), CongestionTier::Flowing);
    assert_eq!(monitor.tier(30.0), CongestionTier::Slowdown);
    assert_eq!(monitor.tier(45.0), CongestionTier::Critical);
    assert!(!monitor.failed(49.9));
    assert!(monitor.failed(50.0));
}

#[test]
fn test_queued_edits_apply_even_while_paused() {
    let mut world = SimWorld::new_grid(SimConfig::default(), Some(9));
    world.run_state = RunState::PausedForUpgrade;

    let before = world.network.segment_count();
    let from = world.network.cell_center((0, 0));
    let to = world.network.cell_center((3, 0));
    world.queue_edit(EditCommand::AddSegment { from, to });
    world.step(0.1);

    assert!(world.network.segment_count() > before);
    assert_eq!(world.elapsed, 0.0);
}
