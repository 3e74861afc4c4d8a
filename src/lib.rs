//! Bounded Voronoi diagrams with Fortune's sweep-line algorithm.
//!
//! A [`VoronoiBuilder`] owns one build session. It can be driven one event at a time, for a
//! bounded amount of wall-clock time, or to completion:
//!
//! ```rust
//! use voronoi_builder::{Point, Rect, VoronoiBuilder};
//!
//! let bounds = Rect::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
//! let sites = [Point::new(30.0, 50.0), Point::new(70.0, 50.0)];
//!
//! let voronoi = VoronoiBuilder::new(bounds, &sites)?.build()?;
//! assert_eq!(voronoi.sites().len(), 2);
//! assert_eq!(voronoi.internal_edges().count(), 1);
//! # Ok::<(), voronoi_builder::Error>(())
//! ```
//!
//! The sweep line moves in the direction of increasing `y`.

use std::cmp::Ordering;

mod beachline;
pub mod builder;
pub mod diagram;
pub mod error;
mod event;
pub mod geometry;
mod heap;
pub mod sites;


pub use builder::{BuildState, BuildStats, BuilderConfig, Progress, VoronoiBuilder};
pub use diagram::{Edge, EdgeId, Site, SiteId, Vertex, VertexId, Voronoi};
pub use error::{Error, Result};
pub use geometry::Rect;

/// A point in 2D space. It is ordered in lexicographic order, by `y` first.
#[derive(PartialEq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}
impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}
impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn dot(&self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn perp_dot(&self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn distance(&self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}
impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Point")
            .field(&self.x)
            .field(&self.y)
            .finish()
    }
}
impl std::hash::Hash for Point {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}
impl Eq for Point {}
impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y
            .total_cmp(&other.y)
            .then_with(|| self.x.total_cmp(&other.x))
    }
}

/// Compare the polar angle of the vectors `a` and `b` in relation to the x-axis, in the range [0,
/// τ). Return if the polar angle of `a` is less, equal or greater than of `b`.
///
/// If either `a` or `b` is a zero vector, this will return `Ordering::Equal`.
///
/// Based on: https://stackoverflow.com/a/39420680
pub fn vec2_angle_cmp(a: Point, b: Point) -> Ordering {
    let h_a = (a.y < 0.0) || ((a.y == 0.0) && (a.x < 0.0)); // 0 for [0,180). 1 for [180,360).
    let h_b = (b.y < 0.0) || ((b.y == 0.0) && (b.x < 0.0)); // 0 for [0,180). 1 for [180,360).

    if h_a == h_b {
        // bxa = |b|.|a|.sin(angle from `b` to `a`, positive in orientation `+x` to `+y`)
        let bxa = b.x * a.y - b.y * a.x;
        return bxa.partial_cmp(&0.0).unwrap_or(Ordering::Equal);
    }

    if h_a {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}
