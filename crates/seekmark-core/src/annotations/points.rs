// crates/seekmark-core/src/annotations/points.rs
//
// Spatial (point) annotations: a pixel position per (frame, label id).
// Parallel arrays ordered by frame. Several labels may share a frame, but a
// given (frame, label) pair appears at most once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Direction;

/// One point drawn over the frame it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayPoint {
    pub label:      usize,
    pub x:          f64,
    pub y:          f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    #[serde(default)]
    frames: Vec<u64>,
    #[serde(default)]
    labels: Vec<usize>,
    #[serde(default)]
    x:      Vec<f64>,
    #[serde(default)]
    y:      Vec<f64>,
    /// Older files predate confidences; `normalize` fills them with 1.
    #[serde(rename = "p", default)]
    confidence: Vec<f64>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[u64] {
        &self.frames
    }

    fn find(&self, frame: u64, label: usize) -> Option<usize> {
        let start = self.frames.partition_point(|&f| f < frame);
        (start..self.frames.len())
            .take_while(|&i| self.frames[i] == frame)
            .find(|&i| self.labels[i] == label)
    }

    /// Place `label` at (x, y) on `frame`, replacing any previous position of
    /// that label on the same frame. Manual placements carry confidence 1.
    pub fn upsert(&mut self, frame: u64, label: usize, x: f64, y: f64) {
        if let Some(k) = self.find(frame, label) {
            self.x[k] = x;
            self.y[k] = y;
            self.confidence[k] = 1.0;
            return;
        }
        let k = self.frames.partition_point(|&f| f <= frame);
        self.frames.insert(k, frame);
        self.labels.insert(k, label);
        self.x.insert(k, x);
        self.y.insert(k, y);
        self.confidence.insert(k, 1.0);
    }

    /// Delete the point for `label` on `frame`. Returns `true` if one existed.
    pub fn remove(&mut self, frame: u64, label: usize) -> bool {
        let Some(k) = self.find(frame, label) else { return false };
        self.frames.remove(k);
        self.labels.remove(k);
        self.x.remove(k);
        self.y.remove(k);
        self.confidence.remove(k);
        true
    }

    /// Drop every point using `label` and shift higher label ids down by one,
    /// mirroring removal of an entry from the project's label list.
    pub fn forget_label(&mut self, label: usize) {
        let mut k = 0;
        while k < self.frames.len() {
            if self.labels[k] == label {
                self.frames.remove(k);
                self.labels.remove(k);
                self.x.remove(k);
                self.y.remove(k);
                self.confidence.remove(k);
            } else {
                if self.labels[k] > label {
                    self.labels[k] -= 1;
                }
                k += 1;
            }
        }
    }

    /// Overlay for `frame`, in storage order.
    pub fn at_frame(&self, frame: u64) -> Vec<OverlayPoint> {
        let start = self.frames.partition_point(|&f| f < frame);
        (start..self.frames.len())
            .take_while(|&i| self.frames[i] == frame)
            .map(|i| OverlayPoint {
                label:      self.labels[i],
                x:          self.x[i],
                y:          self.y[i],
                confidence: self.confidence[i],
            })
            .collect()
    }

    /// Next/previous annotated frame relative to `frame`, wrapping around.
    pub fn rotate(&self, frame: u64, direction: Direction) -> Option<u64> {
        let n = self.frames.len();
        if n == 0 {
            return None;
        }
        let k = match direction {
            Direction::Forward => self.frames.partition_point(|&f| f <= frame) % n,
            Direction::Backward => (self.frames.partition_point(|&f| f < frame) + n - 1) % n,
        };
        Some(self.frames[k])
    }

    /// Restore equal column lengths and frame order after deserialising, and
    /// drop repeated (frame, label) rows.
    pub fn normalize(&mut self) {
        let n = self.frames.len();
        self.labels.resize(n, 0);
        self.x.resize(n, 0.0);
        self.y.resize(n, 0.0);
        self.confidence.resize(n, 1.0);

        // Stable sort, then keep the first row of each (frame, label).
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| self.frames[i]);
        let mut seen = HashSet::with_capacity(n);
        order.retain(|&i| seen.insert((self.frames[i], self.labels[i])));
        if order.len() == n && order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return;
        }
        self.frames = order.iter().map(|&i| self.frames[i]).collect();
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
        self.x = order.iter().map(|&i| self.x[i]).collect();
        self.y = order.iter().map(|&i| self.y[i]).collect();
        self.confidence = order.iter().map(|&i| self.confidence[i]).collect();
    }
}
