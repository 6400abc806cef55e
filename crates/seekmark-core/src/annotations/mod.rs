// crates/seekmark-core/src/annotations/mod.rs
//
// Frame-indexed annotation timeline: sparse events and points that overlay the
// decoded frames. Both collections are sorted by frame and are queried with
// rank searches every time the seek engine lands somewhere new.

pub mod events;
pub mod points;

pub use events::EventSet;
pub use points::{OverlayPoint, PointSet};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn from_forward(forward: bool) -> Self {
        if forward { Direction::Forward } else { Direction::Backward }
    }

    /// +1 / -1, for relative frame arithmetic.
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Confidence predicate used when rotating through events of one kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFilter {
    pub threshold: f64,
    /// `true`: keep events with p >= threshold; `false`: p <= threshold.
    pub above: bool,
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self { threshold: 0.0, above: true }
    }
}

impl ConfidenceFilter {
    pub fn accepts(&self, p: f64) -> bool {
        if self.above { p >= self.threshold } else { p <= self.threshold }
    }
}
