//! Core types for the transit simulation
//!
//! These are standalone types that don't depend on any frontend.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimId(pub usize);

/// A wrapper type for endpoint (house/store) IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub SimId);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub SimId);

/// A color identity pairing exactly one house with one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorId(pub u32);

/// Monotonic ID source shared by all entity kinds in a world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdGen {
    next: usize,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume issuing after the given ID (used when loading a save)
    pub fn resume_after(last: usize) -> Self {
        Self { next: last + 1 }
    }

    pub fn next(&mut self) -> SimId {
        let id = SimId(self.next);
        self.next += 1;
        id
    }
}

/// A 2D position in world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Heading from this position toward another, in radians
    pub fn angle_to(&self, other: &Position) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Which way the network lays out its nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TopologyMode {
    /// Orthogonal cell lattice; every road cell is a node
    Grid { cols: i32, rows: i32, cell_size: f32 },
    /// Nodes at arbitrary continuous coordinates
    Freeform,
}

/// The river: an immutable vertical band of blocked space.
/// Grid cells whose center falls inside the band are water; freeform
/// segments overlapping the band are bridges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiverSpan {
    pub min_x: f32,
    pub max_x: f32,
}

impl RiverSpan {
    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.min_x && x <= self.max_x
    }

    /// Whether a segment between the two positions lies over the water
    pub fn crossed_by(&self, a: &Position, b: &Position) -> bool {
        let lo = a.x.min(b.x);
        let hi = a.x.max(b.x);
        lo < self.max_x && hi > self.min_x
    }
}

/// Everything that can go wrong inside the simulation. None of these are
/// fatal: they feed the congestion meter or an endpoint's backlog and the
/// run keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("road segment quota exhausted")]
    BudgetExceeded,
    #[error("no bridge credit available for a river crossing")]
    NoBridgeCredit,
    #[error("no route exists between the bound endpoints")]
    Unroutable,
    #[error("endpoint has no network node within snap radius")]
    UnboundEndpoint,
    #[error("a committed route leg no longer exists")]
    StaleRoute,
}

/// Seeded-or-thread RNG so simulations can be reproduced exactly
#[derive(Debug, Default)]
pub struct SimRng {
    inner: Option<StdRng>,
}

impl SimRng {
    pub fn unseeded() -> Self {
        Self { inner: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Some(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn random_range(&mut self, range: std::ops::Range<f32>) -> f32 {
        match &mut self.inner {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    pub fn random_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        match &mut self.inner {
            Some(rng) => rng.random_range(0..len),
            None => rand::rng().random_range(0..len),
        }
    }

    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            return None;
        }
        match &mut self.inner {
            Some(rng) => slice.choose(rng),
            None => slice.choose(&mut rand::rng()),
        }
    }

    /// Sample `amount` distinct elements from the slice
    pub fn choose_multiple<'a, T>(&mut self, slice: &'a [T], amount: usize) -> Vec<&'a T> {
        match &mut self.inner {
            Some(rng) => slice.choose_multiple(rng, amount).collect(),
            None => slice.choose_multiple(&mut rand::rng(), amount).collect(),
        }
    }
}
