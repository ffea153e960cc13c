//! Path search over the road network
//!
//! Two interchangeable policies. Congestion-weighted shortest path is the
//! canonical one: edge costs are recomputed from live load on every call,
//! so routes adapt to the traffic of the current tick. Degree-preferring
//! BFS is the grid-mode alternative: a plain breadth-first search that
//! enqueues same-depth neighbors through higher-connectivity cells first.
//! Either way a returned path is a snapshot; later topology edits never
//! repair or invalidate it, the traffic pass detects staleness itself.

use std::collections::{HashMap, HashSet, VecDeque};

use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use super::network::RoadNetwork;
use super::types::TopologyMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// BFS preferring higher-degree cells among equal-depth frontier nodes
    DegreeBfs,
    /// Dijkstra with cost = length + live load * penalty
    CongestionWeighted,
}

#[derive(Debug, Clone)]
pub struct Router {
    pub policy: RoutePolicy,
    /// Cost per unit of live edge load (congestion-weighted policy)
    pub load_penalty: f32,
}

impl Router {
    pub fn new(policy: RoutePolicy, load_penalty: f32) -> Self {
        Self {
            policy,
            load_penalty,
        }
    }

    /// Default policy for a topology mode
    pub fn for_mode(mode: TopologyMode, load_penalty: f32) -> Self {
        let policy = match mode {
            TopologyMode::Grid { .. } => RoutePolicy::DegreeBfs,
            TopologyMode::Freeform => RoutePolicy::CongestionWeighted,
        };
        Self::new(policy, load_penalty)
    }

    /// Find a path between two endpoint bindings. None when either binding
    /// is absent or no path exists. The returned path includes both ends.
    pub fn route(
        &self,
        net: &RoadNetwork,
        start: Option<NodeIndex>,
        goal: Option<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        let start = start?;
        let goal = goal?;
        if !net.contains_node(start) || !net.contains_node(goal) {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }
        match self.policy {
            RoutePolicy::DegreeBfs => self.degree_bfs(net, start, goal),
            RoutePolicy::CongestionWeighted => self.congestion_dijkstra(net, start, goal),
        }
    }

    fn congestion_dijkstra(
        &self,
        net: &RoadNetwork,
        start: NodeIndex,
        goal: NodeIndex,
    ) -> Option<Vec<NodeIndex>> {
        let penalty = self.load_penalty;
        let (_, path) = astar(
            net.graph(),
            start,
            |n| n == goal,
            |edge| OrderedFloat(edge.weight().length + edge.weight().load as f32 * penalty),
            |_| OrderedFloat(0.0), // null heuristic = Dijkstra
        )?;
        Some(path)
    }

    /// Documented heuristic, not shortest-path-optimal: neighbors enqueue
    /// in descending adjacency degree, so among same-length routes the one
    /// through better-connected cells wins deterministically.
    fn degree_bfs(
        &self,
        net: &RoadNetwork,
        start: NodeIndex,
        goal: NodeIndex,
    ) -> Option<Vec<NodeIndex>> {
        let mut queue = VecDeque::from([start]);
        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen: HashSet<NodeIndex> = HashSet::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == goal {
                break;
            }
            let mut nexts: Vec<NodeIndex> = net.neighbors(current).collect();
            nexts.sort_by(|a, b| net.degree(*b).cmp(&net.degree(*a)));
            for next in nexts {
                if !seen.insert(next) {
                    continue;
                }
                prev.insert(next, current);
                queue.push_back(next);
            }
        }

        if !seen.contains(&goal) {
            return None;
        }
        let mut path = vec![goal];
        let mut cursor = goal;
        while let Some(&p) = prev.get(&cursor) {
            path.push(p);
            cursor = p;
        }
        path.reverse();
        Some(path)
    }
}
