//! Road network graph
//!
//! An arena of nodes addressed by stable handles; edges store handles,
//! never references. Supports two topology modes: an orthogonal cell grid
//! (every road cell is a node, adjacency is implicit between neighboring
//! cells) and freeform continuous placement with geometric edge splitting.

use std::collections::HashMap;

use log::debug;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use serde::{Deserialize, Serialize};

use super::budget::ResourceBudget;
use super::config::SimConfig;
use super::types::{Position, RiverSpan, SimError, TopologyMode};

/// Node payload stored in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub pos: Position,
    /// Degree >= 3, recomputed after every mutation
    pub is_intersection: bool,
    /// Grid mode: this cell sits on the river and consumed a bridge credit
    pub is_bridge: bool,
}

/// Edge payload stored in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub length: f32,
    /// Vehicles on this edge during the current tick; reset every tick
    /// and written only by the traffic pass
    pub load: u32,
    /// Freeform mode: this segment crosses the river
    pub is_bridge: bool,
}

/// Outcome of a successful add-segment edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddSegmentOutcome {
    /// Road segments the edit actually placed
    pub segments_added: usize,
    /// Grid mode applies partially: set when the walk stopped early
    pub blocked: Option<SimError>,
}

/// A planned crossing of the new freeform segment with an existing edge
struct Crossing {
    edge: EdgeIndex,
    point: Position,
    /// Parameter along the new segment, used to order crossings
    t_new: f32,
}

pub struct RoadNetwork {
    pub mode: TopologyMode,
    pub river: Option<RiverSpan>,
    graph: StableUnGraph<NodeData, EdgeData>,
    /// Grid mode: cell coordinates -> node handle
    cell_index: HashMap<(i32, i32), NodeIndex>,
}

impl RoadNetwork {
    pub fn new(mode: TopologyMode, river: Option<RiverSpan>) -> Self {
        Self {
            mode,
            river,
            graph: StableUnGraph::default(),
            cell_index: HashMap::new(),
        }
    }

    /// Rebuild a network from a deserialized graph. Loads, intersection
    /// flags and the grid cell index are all derived state and recomputed.
    pub fn from_saved(
        mode: TopologyMode,
        river: Option<RiverSpan>,
        graph: StableUnGraph<NodeData, EdgeData>,
    ) -> Self {
        let mut net = Self {
            mode,
            river,
            graph,
            cell_index: HashMap::new(),
        };
        if let TopologyMode::Grid { .. } = net.mode {
            let cells: Vec<(NodeIndex, Position)> = net
                .graph
                .node_indices()
                .map(|n| (n, net.graph[n].pos))
                .collect();
            for (n, pos) in cells {
                net.cell_index.insert(net.world_to_cell(pos), n);
            }
        }
        net.reset_loads();
        net.recompute_intersections();
        net
    }

    pub fn graph(&self) -> &StableUnGraph<NodeData, EdgeData> {
        &self.graph
    }

    // --- coordinate helpers -------------------------------------------------

    pub fn cell_center(&self, cell: (i32, i32)) -> Position {
        match self.mode {
            TopologyMode::Grid { cell_size, .. } => Position::new(
                cell.0 as f32 * cell_size + cell_size * 0.5,
                cell.1 as f32 * cell_size + cell_size * 0.5,
            ),
            TopologyMode::Freeform => Position::default(),
        }
    }

    pub fn world_to_cell(&self, pos: Position) -> (i32, i32) {
        match self.mode {
            TopologyMode::Grid { cell_size, .. } => (
                (pos.x / cell_size).floor() as i32,
                (pos.y / cell_size).floor() as i32,
            ),
            TopologyMode::Freeform => (0, 0),
        }
    }

    pub fn cell_in_bounds(&self, cell: (i32, i32)) -> bool {
        match self.mode {
            TopologyMode::Grid { cols, rows, .. } => {
                cell.0 >= 0 && cell.1 >= 0 && cell.0 < cols && cell.1 < rows
            }
            TopologyMode::Freeform => true,
        }
    }

    pub fn is_river_cell(&self, cell: (i32, i32)) -> bool {
        match self.river {
            Some(river) => river.contains_x(self.cell_center(cell).x),
            None => false,
        }
    }

    fn is_river_span(&self, a: &Position, b: &Position) -> bool {
        match self.river {
            Some(river) => river.crossed_by(a, b),
            None => false,
        }
    }

    // --- queries ------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of placed road segments: cells in grid mode, edges in freeform
    pub fn segment_count(&self) -> usize {
        match self.mode {
            TopologyMode::Grid { .. } => self.graph.node_count(),
            TopologyMode::Freeform => self.graph.edge_count(),
        }
    }

    pub fn contains_node(&self, node: NodeIndex) -> bool {
        self.graph.contains_node(node)
    }

    pub fn node(&self, node: NodeIndex) -> Option<&NodeData> {
        self.graph.node_weight(node)
    }

    pub fn node_position(&self, node: NodeIndex) -> Option<Position> {
        self.graph.node_weight(node).map(|n| n.pos)
    }

    pub fn neighbors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(node)
    }

    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph.neighbors(node).count()
    }

    pub fn has_adjacency(&self, node: NodeIndex) -> bool {
        self.graph.neighbors(node).next().is_some()
    }

    pub fn edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn edge(&self, edge: EdgeIndex) -> Option<&EdgeData> {
        self.graph.edge_weight(edge)
    }

    pub fn edge_mut(&mut self, edge: EdgeIndex) -> Option<&mut EdgeData> {
        self.graph.edge_weight_mut(edge)
    }

    pub fn node_at_cell(&self, cell: (i32, i32)) -> Option<NodeIndex> {
        self.cell_index.get(&cell).copied()
    }

    /// Nearest node to a position within the given radius
    pub fn nearest_node_within(&self, pos: &Position, radius: f32) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .map(|n| (n, pos.distance(&self.graph[n].pos)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(n, _)| n)
    }

    /// Edges saturated at or above the given load this tick
    pub fn saturated_edge_count(&self, saturation_load: u32) -> usize {
        self.graph
            .edge_indices()
            .filter(|e| self.graph[*e].load >= saturation_load)
            .count()
    }

    pub fn reset_loads(&mut self) {
        let edges: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        for e in edges {
            self.graph[e].load = 0;
        }
    }

    // --- mutation -----------------------------------------------------------

    /// Place a road between two points, gated by the budget.
    ///
    /// Grid mode walks the orthogonal cell path from `a` to `b`, adding a
    /// segment per cell and stopping at the first cell the budget can't
    /// cover (partial application). Freeform mode inserts a single segment,
    /// splitting it and any edges it geometrically crosses at new
    /// intersection nodes; the whole operation fails without mutating
    /// anything if the budget can't cover every resulting sub-segment.
    pub fn add_segment(
        &mut self,
        a: Position,
        b: Position,
        budget: &mut ResourceBudget,
        cfg: &SimConfig,
    ) -> Result<AddSegmentOutcome, SimError> {
        match self.mode {
            TopologyMode::Grid { .. } => self.add_cell_path(a, b, budget),
            TopologyMode::Freeform => self.add_freeform_segment(a, b, budget, cfg),
        }
    }

    /// Remove the segment nearest the point, refunding its cost.
    /// Returns false when nothing is within tolerance.
    pub fn remove_segment_near(
        &mut self,
        point: Position,
        budget: &mut ResourceBudget,
        cfg: &SimConfig,
    ) -> bool {
        match self.mode {
            TopologyMode::Grid { .. } => self.remove_cell(point, budget),
            TopologyMode::Freeform => self.remove_freeform_edge(point, budget, cfg),
        }
    }

    fn add_cell_path(
        &mut self,
        a: Position,
        b: Position,
        budget: &mut ResourceBudget,
    ) -> Result<AddSegmentOutcome, SimError> {
        let start = self.world_to_cell(a);
        let goal = self.world_to_cell(b);
        let mut added = 0;

        for cell in orthogonal_walk(start, goal) {
            if !self.cell_in_bounds(cell) {
                continue;
            }
            match self.add_road_cell(cell, budget) {
                Ok(true) => added += 1,
                Ok(false) => {} // already a road cell
                Err(err) if added == 0 => return Err(err),
                Err(err) => {
                    self.recompute_intersections();
                    return Ok(AddSegmentOutcome {
                        segments_added: added,
                        blocked: Some(err),
                    });
                }
            }
        }

        if added > 0 {
            self.recompute_intersections();
        }
        Ok(AddSegmentOutcome {
            segments_added: added,
            blocked: None,
        })
    }

    /// Add one road cell, connecting it to orthogonally adjacent road cells.
    /// Ok(false) means the cell was already a road.
    fn add_road_cell(
        &mut self,
        cell: (i32, i32),
        budget: &mut ResourceBudget,
    ) -> Result<bool, SimError> {
        if self.cell_index.contains_key(&cell) {
            return Ok(false);
        }
        if budget.roads_remaining() == 0 {
            return Err(SimError::BudgetExceeded);
        }

        let on_river = self.is_river_cell(cell);
        if on_river && !budget.try_consume_bridge() {
            return Err(SimError::NoBridgeCredit);
        }
        budget.try_consume_road();

        let pos = self.cell_center(cell);
        let node = self.graph.add_node(NodeData {
            pos,
            is_intersection: false,
            is_bridge: on_river,
        });
        self.cell_index.insert(cell, node);

        let cell_size = match self.mode {
            TopologyMode::Grid { cell_size, .. } => cell_size,
            TopologyMode::Freeform => unreachable!("cell ops are grid-only"),
        };
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let neighbor = (cell.0 + dx, cell.1 + dy);
            if let Some(&other) = self.cell_index.get(&neighbor) {
                let bridge_link = on_river || self.graph[other].is_bridge;
                self.graph.add_edge(
                    node,
                    other,
                    EdgeData {
                        length: cell_size,
                        load: 0,
                        is_bridge: bridge_link,
                    },
                );
            }
        }
        Ok(true)
    }

    fn remove_cell(&mut self, point: Position, budget: &mut ResourceBudget) -> bool {
        let cell = self.world_to_cell(point);
        let Some(node) = self.cell_index.remove(&cell) else {
            return false;
        };
        let was_bridge = self.graph[node].is_bridge;
        self.graph.remove_node(node);
        budget.refund_road();
        if was_bridge {
            budget.refund_bridge();
        }
        self.recompute_intersections();
        true
    }

    fn add_freeform_segment(
        &mut self,
        p1: Position,
        p2: Position,
        budget: &mut ResourceBudget,
        cfg: &SimConfig,
    ) -> Result<AddSegmentOutcome, SimError> {
        let node_a = self.nearest_node_within(&p1, cfg.snap_radius);
        let node_b = self.nearest_node_within(&p2, cfg.snap_radius);
        let pa = node_a.map(|n| self.graph[n].pos).unwrap_or(p1);
        let pb = node_b.map(|n| self.graph[n].pos).unwrap_or(p2);

        if pa.distance(&pb) < cfg.crossing_endpoint_tolerance {
            return Ok(AddSegmentOutcome::default());
        }
        if let (Some(a), Some(b)) = (node_a, node_b) {
            if a == b {
                return Ok(AddSegmentOutcome::default());
            }
        }

        let crossings = self.collect_crossings(&pa, &pb, node_a, node_b, cfg);

        // Budget the whole plan before touching anything. Each crossing
        // splits an existing edge (one edge becomes two, net +1 road) and
        // adds one more sub-segment to the new chain.
        let sub_segments = crossings.len() as u32 + 1;
        let required_roads = sub_segments + crossings.len() as u32;
        let mut required_bridges = 0u32;

        let mut chain_points = vec![pa];
        chain_points.extend(crossings.iter().map(|c| c.point));
        chain_points.push(pb);
        for pair in chain_points.windows(2) {
            if self.is_river_span(&pair[0], &pair[1]) {
                required_bridges += 1;
            }
        }
        for crossing in &crossings {
            let (u, v) = self
                .graph
                .edge_endpoints(crossing.edge)
                .expect("crossing references a live edge");
            let (pu, pv) = (self.graph[u].pos, self.graph[v].pos);
            let halves_crossing = [(pu, crossing.point), (crossing.point, pv)]
                .iter()
                .filter(|(x, y)| self.is_river_span(x, y))
                .count() as u32;
            if self.graph[crossing.edge].is_bridge {
                // The original credit stays with one crossing half
                required_bridges += halves_crossing.saturating_sub(1);
            } else {
                required_bridges += halves_crossing;
            }
        }

        // Both anchors already joined by an edge and nothing to split:
        // the segment would be a duplicate, treat as a no-op edit.
        if crossings.is_empty() {
            if let (Some(a), Some(b)) = (node_a, node_b) {
                if self.graph.find_edge(a, b).is_some() {
                    debug!("segment already exists between snapped nodes, ignoring");
                    return Ok(AddSegmentOutcome::default());
                }
            }
        }

        if required_roads > budget.roads_remaining() {
            return Err(SimError::BudgetExceeded);
        }
        if required_bridges > budget.bridge_credits {
            return Err(SimError::NoBridgeCredit);
        }

        // Commit: split the crossed edges first so the chain can attach
        // to the fresh intersection nodes.
        let mut chain_nodes = Vec::with_capacity(crossings.len() + 2);
        chain_nodes.push(self.resolve_or_create(node_a, pa));
        for crossing in &crossings {
            let node = self.split_edge_at(crossing.edge, crossing.point, budget);
            chain_nodes.push(node);
        }
        chain_nodes.push(self.resolve_or_create(node_b, pb));

        let mut segments_added = 0;
        for pair in chain_nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b || self.graph.find_edge(a, b).is_some() {
                continue;
            }
            let (qa, qb) = (self.graph[a].pos, self.graph[b].pos);
            let is_bridge = self.is_river_span(&qa, &qb);
            self.insert_edge(a, b, is_bridge);
            budget.try_consume_road();
            if is_bridge {
                budget.try_consume_bridge();
            }
            segments_added += 1;
        }

        self.recompute_intersections();
        Ok(AddSegmentOutcome {
            segments_added,
            blocked: None,
        })
    }

    fn resolve_or_create(&mut self, existing: Option<NodeIndex>, pos: Position) -> NodeIndex {
        match existing {
            Some(n) => n,
            None => self.graph.add_node(NodeData {
                pos,
                is_intersection: false,
                is_bridge: false,
            }),
        }
    }

    fn insert_edge(&mut self, a: NodeIndex, b: NodeIndex, is_bridge: bool) -> EdgeIndex {
        let length = self.graph[a].pos.distance(&self.graph[b].pos);
        self.graph.add_edge(
            a,
            b,
            EdgeData {
                length,
                load: 0,
                is_bridge,
            },
        )
    }

    /// Crossings of the prospective segment with existing edges, skipping
    /// intersections that land within tolerance of any involved endpoint,
    /// ordered along the new segment.
    fn collect_crossings(
        &self,
        pa: &Position,
        pb: &Position,
        node_a: Option<NodeIndex>,
        node_b: Option<NodeIndex>,
        cfg: &SimConfig,
    ) -> Vec<Crossing> {
        let tol = cfg.crossing_endpoint_tolerance;
        let mut crossings = Vec::new();
        for edge in self.graph.edge_indices() {
            let (u, v) = self
                .graph
                .edge_endpoints(edge)
                .expect("iterating live edges");
            if node_a == Some(u) || node_a == Some(v) || node_b == Some(u) || node_b == Some(v) {
                continue;
            }
            let (pu, pv) = (self.graph[u].pos, self.graph[v].pos);
            let Some((point, t_new)) = segment_intersection(pa, pb, &pu, &pv) else {
                continue;
            };
            if point.distance(pa) < tol
                || point.distance(pb) < tol
                || point.distance(&pu) < tol
                || point.distance(&pv) < tol
            {
                continue;
            }
            crossings.push(Crossing { edge, point, t_new });
        }
        crossings.sort_by(|a, b| {
            a.t_new
                .partial_cmp(&b.t_new)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        crossings
    }

    /// Replace one edge with two halves meeting at a new node. One edge
    /// becoming two costs one road unit; the paid bridge credit follows the
    /// first half still over the river and any further crossing half
    /// consumes a fresh credit (the plan already verified affordability).
    fn split_edge_at(
        &mut self,
        edge: EdgeIndex,
        point: Position,
        budget: &mut ResourceBudget,
    ) -> NodeIndex {
        let (u, v) = self
            .graph
            .edge_endpoints(edge)
            .expect("splitting a live edge");
        let was_bridge = self.graph[edge].is_bridge;
        self.graph.remove_edge(edge);
        budget.try_consume_road();

        let node = self.graph.add_node(NodeData {
            pos: point,
            is_intersection: false,
            is_bridge: false,
        });
        let (pu, pv) = (self.graph[u].pos, self.graph[v].pos);
        let mut credit_carried = was_bridge;
        for (from, to, x, y) in [(u, node, pu, point), (node, v, point, pv)] {
            let crosses = self.is_river_span(&x, &y);
            self.insert_edge(from, to, crosses);
            if crosses {
                if credit_carried {
                    credit_carried = false;
                } else {
                    budget.try_consume_bridge();
                }
            }
        }
        node
    }

    fn remove_freeform_edge(
        &mut self,
        point: Position,
        budget: &mut ResourceBudget,
        cfg: &SimConfig,
    ) -> bool {
        let mut nearest: Option<(EdgeIndex, f32)> = None;
        for edge in self.graph.edge_indices() {
            let (u, v) = self
                .graph
                .edge_endpoints(edge)
                .expect("iterating live edges");
            let d = point_segment_distance(&point, &self.graph[u].pos, &self.graph[v].pos);
            if nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((edge, d));
            }
        }
        let Some((edge, dist)) = nearest else {
            return false;
        };
        if dist > cfg.removal_tolerance {
            return false;
        }

        let was_bridge = self.graph[edge].is_bridge;
        let (u, v) = self.graph.edge_endpoints(edge).expect("edge is live");
        self.graph.remove_edge(edge);
        budget.refund_road();
        if was_bridge {
            budget.refund_bridge();
        }
        // Drop nodes the removal orphaned; handles invalidate explicitly.
        for n in [u, v] {
            if self.graph.neighbors(n).next().is_none() {
                self.graph.remove_node(n);
            }
        }
        self.recompute_intersections();
        true
    }

    /// Full rescan of intersection flags. The network is bounded by the
    /// road quota, so a rescan per mutation stays cheap.
    fn recompute_intersections(&mut self) {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        for n in nodes {
            let degree = self.graph.neighbors(n).count();
            self.graph[n].is_intersection = degree >= 3;
        }
    }
}

/// Orthogonal cell walk: x first, then y, matching player drag semantics
fn orthogonal_walk(start: (i32, i32), goal: (i32, i32)) -> Vec<(i32, i32)> {
    let mut path = vec![start];
    let (mut cx, mut cy) = start;
    while cx != goal.0 {
        cx += if cx < goal.0 { 1 } else { -1 };
        path.push((cx, cy));
    }
    while cy != goal.1 {
        cy += if cy < goal.1 { 1 } else { -1 };
        path.push((cx, cy));
    }
    path
}

/// Proper intersection point of segments a1-a2 and b1-b2, with the
/// parameter along a1-a2. Parallel or non-overlapping segments yield None.
fn segment_intersection(
    a1: &Position,
    a2: &Position,
    b1: &Position,
    b2: &Position,
) -> Option<(Position, f32)> {
    let r = (a2.x - a1.x, a2.y - a1.y);
    let s = (b2.x - b1.x, b2.y - b1.y);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let qp = (b1.x - a1.x, b1.y - a1.y);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some((Position::new(a1.x + t * r.0, a1.y + t * r.1), t))
}

fn point_segment_distance(p: &Position, a: &Position, b: &Position) -> f32 {
    let ab = (b.x - a.x, b.y - a.y);
    let len_sq = ab.0 * ab.0 + ab.1 * ab.1;
    if len_sq < f32::EPSILON {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * ab.0 + (p.y - a.y) * ab.1) / len_sq).clamp(0.0, 1.0);
    p.distance(&Position::new(a.x + t * ab.0, a.y + t * ab.1))
}
