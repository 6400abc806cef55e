// crates/seekmark-core/src/annotations/events.rs
//
// Temporal (event) annotations: one text label per frame, optionally with a
// detector confidence. Stored as parallel arrays so the persisted JSON keeps
// the `{frames, labels, p}` shape the project file has always used.
//
// Every navigation query here is a rank search over `frames`, so the arrays
// MUST stay strictly sorted and unique by frame. Any mutation that can break
// that (currently only `move_event`) re-sorts before returning.

use serde::{Deserialize, Serialize};

use super::{ConfidenceFilter, Direction};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSet {
    #[serde(default)]
    frames: Vec<u64>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    confidence: Option<Vec<f64>>,
}

impl EventSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set with confidences, e.g. from an automatic detector.
    pub fn with_confidence(frames: Vec<u64>, labels: Vec<String>, confidence: Vec<f64>) -> Self {
        let mut set = Self { frames, labels, confidence: Some(confidence) };
        set.normalize();
        set
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        let (frames, labels) = pairs.into_iter().map(|(f, l)| (f, l.into())).unzip();
        let mut set = Self { frames, labels, confidence: None };
        set.normalize();
        set
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

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_confidence(&self) -> bool {
        self.confidence.is_some()
    }

    pub fn confidence(&self, index: usize) -> Option<f64> {
        self.confidence.as_ref().and_then(|p| p.get(index).copied())
    }

    pub fn frame(&self, index: usize) -> Option<u64> {
        self.frames.get(index).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Index of the latest event at or before `frame`.
    pub fn frame_to_event_index(&self, frame: u64) -> Option<usize> {
        self.frames.partition_point(|&f| f <= frame).checked_sub(1)
    }

    pub fn contains_frame(&self, frame: u64) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    /// Insert an empty-labelled event at `frame`.
    ///
    /// Returns the index of the new event, or `None` when an event already
    /// exists at that exact frame (no-op).
    pub fn insert_event(&mut self, frame: u64) -> Option<usize> {
        let pos = match self.frames.binary_search(&frame) {
            Ok(_) => return None,
            Err(pos) => pos,
        };
        self.frames.insert(pos, frame);
        self.labels.insert(pos, String::new());
        if let Some(p) = self.confidence.as_mut() {
            p.insert(pos, 1.0);
        }
        Some(pos)
    }

    /// Remove the event at `index`, returning its frame.
    pub fn remove_at(&mut self, index: usize) -> Option<u64> {
        if index >= self.frames.len() {
            return None;
        }
        self.labels.remove(index);
        if let Some(p) = self.confidence.as_mut() {
            p.remove(index);
        }
        Some(self.frames.remove(index))
    }

    /// Retarget the event active at `old_frame` to `new_frame`.
    ///
    /// Returns the event's index after re-sorting, or `None` when no event is
    /// active at `old_frame` or another event already occupies `new_frame`.
    pub fn move_event(&mut self, old_frame: u64, new_frame: u64) -> Option<usize> {
        let k = self.frame_to_event_index(old_frame)?;
        if self.frames[k] == new_frame {
            return Some(k);
        }
        if self.contains_frame(new_frame) {
            return None;
        }
        self.frames[k] = new_frame;
        self.resort();
        self.frames.binary_search(&new_frame).ok()
    }

    pub fn set_label(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.labels.get_mut(index) {
            Some(label) => {
                *label = text.into();
                true
            }
            None => false,
        }
    }

    /// Mark a detected event as confirmed (confidence 1). No-op for sets
    /// without confidences.
    pub fn confirm(&mut self, index: usize) -> bool {
        match self.confidence.as_mut().and_then(|p| p.get_mut(index)) {
            Some(p) => {
                *p = 1.0;
                true
            }
            None => false,
        }
    }

    /// Index of the next/previous event relative to `frame`, wrapping at the
    /// ends.
    ///
    /// With `matching` set, only events carrying the same label as the event
    /// the cursor is on are candidates; when the set has confidences they must
    /// also pass the threshold. If nothing else qualifies the current event is
    /// returned.
    pub fn rotate(
        &self,
        frame: u64,
        direction: Direction,
        matching: Option<&ConfidenceFilter>,
    ) -> Option<usize> {
        let n = self.frames.len();
        if n == 0 {
            return None;
        }
        match direction {
            Direction::Forward => {
                let k = self.frames.partition_point(|&f| f <= frame) % n;
                let Some(filter) = matching else { return Some(k) };
                let current = (k + n - 1) % n;
                let candidates: Vec<usize> =
                    (0..n).filter(|&i| self.qualifies(i, current, filter)).collect();
                Some(
                    candidates.iter().copied().find(|&i| i > current)
                        .or_else(|| candidates.first().copied())
                        .unwrap_or(current),
                )
            }
            Direction::Backward => {
                let k = (self.frames.partition_point(|&f| f < frame) + n - 1) % n;
                let Some(filter) = matching else { return Some(k) };
                let current = (k + 1) % n;
                let candidates: Vec<usize> =
                    (0..n).rev().filter(|&i| self.qualifies(i, current, filter)).collect();
                Some(
                    candidates.iter().copied().find(|&i| i < current)
                        .or_else(|| candidates.first().copied())
                        .unwrap_or(current),
                )
            }
        }
    }

    fn qualifies(&self, index: usize, current: usize, filter: &ConfidenceFilter) -> bool {
        if self.labels[index] != self.labels[current] {
            return false;
        }
        self.confidence(index).map_or(true, |p| filter.accepts(p))
    }

    /// Restore the parallel-array invariants after deserialising: equal
    /// lengths, sorted by frame, unique frames (first occurrence wins).
    pub fn normalize(&mut self) {
        let n = self.frames.len();
        self.labels.resize(n, String::new());
        if let Some(p) = self.confidence.as_mut() {
            p.resize(n, 1.0);
        }
        self.resort();
        let mut i = 1;
        while i < self.frames.len() {
            if self.frames[i] == self.frames[i - 1] {
                self.remove_at(i);
            } else {
                i += 1;
            }
        }
    }

    fn resort(&mut self) {
        let mut order: Vec<usize> = (0..self.frames.len()).collect();
        order.sort_by_key(|&i| self.frames[i]);
        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return;
        }
        self.frames = order.iter().map(|&i| self.frames[i]).collect();
        self.labels = order.iter().map(|&i| std::mem::take(&mut self.labels[i])).collect();
        if let Some(p) = self.confidence.as_mut() {
            *p = order.iter().map(|&i| p[i]).collect();
        }
    }

    /// List-row prefix for the event at `index`: the frame zero-padded to the
    /// width of the last event's frame, plus the confidence when present.
    pub fn row_prefix(&self, index: usize) -> Option<String> {
        let frame = self.frame(index)?;
        let max = self.frames.last().copied().unwrap_or(frame).max(1);
        let width = max.to_string().len();
        Some(match self.confidence(index) {
            Some(p) => format!("{frame:0width$} {p:.2} | "),
            None => format!("{frame:0width$} │ "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventSet {
        EventSet::from_pairs([(5, "a"), (10, "b"), (15, "c")])
    }

    #[test]
    fn frame_to_event_index_is_rank_minus_one() {
        let events = sample();
        assert_eq!(events.frame_to_event_index(1), None);
        assert_eq!(events.frame_to_event_index(5), Some(0));
        assert_eq!(events.frame_to_event_index(9), Some(0));
        assert_eq!(events.frame_to_event_index(10), Some(1));
        assert_eq!(events.frame_to_event_index(100), Some(2));
        assert_eq!(EventSet::new().frame_to_event_index(10), None);
    }

    #[test]
    fn insert_event_is_noop_on_existing_frame() {
        let mut events = sample();
        assert_eq!(events.insert_event(10), None);
        assert_eq!(events.len(), 3);
        assert_eq!(events.insert_event(12), Some(2));
        assert_eq!(events.frames(), &[5, 10, 12, 15]);
        assert_eq!(events.labels()[2], "");
    }

    #[test]
    fn insert_event_extends_confidence() {
        let mut events = EventSet::with_confidence(
            vec![4, 64],
            vec!["x".into(), "y".into()],
            vec![0.3, 0.9],
        );
        assert_eq!(events.insert_event(10), Some(1));
        assert_eq!(events.confidence(1), Some(1.0));
        assert_eq!(events.confidence(2), Some(0.9));
    }

    #[test]
    fn move_event_resorts_and_repairs_labels() {
        let mut events = sample();
        assert_eq!(events.move_event(10, 2), Some(0));
        assert_eq!(events.frames(), &[2, 5, 15]);
        assert_eq!(events.labels(), &["b", "a", "c"]);
    }

    #[test]
    fn move_event_keeps_confidence_paired() {
        let mut events = EventSet::with_confidence(
            vec![5, 10, 15],
            vec!["a".into(), "b".into(), "c".into()],
            vec![0.1, 0.2, 0.3],
        );
        events.move_event(5, 20);
        assert_eq!(events.frames(), &[10, 15, 20]);
        assert_eq!(events.label(2), Some("a"));
        assert_eq!(events.confidence(2), Some(0.1));
    }

    #[test]
    fn move_event_refuses_occupied_frame() {
        let mut events = sample();
        assert_eq!(events.move_event(10, 15), None);
        assert_eq!(events.frames(), &[5, 10, 15]);
        // Nothing active before the first event.
        assert_eq!(events.move_event(3, 4), None);
    }

    #[test]
    fn remove_at_drops_all_columns() {
        let mut events = sample();
        assert_eq!(events.remove_at(1), Some(10));
        assert_eq!(events.frames(), &[5, 15]);
        assert_eq!(events.labels(), &["a", "c"]);
        assert_eq!(events.remove_at(9), None);
    }

    #[test]
    fn rotate_wraps_around() {
        let events = sample();
        assert_eq!(events.rotate(10, Direction::Forward, None), Some(2));
        assert_eq!(events.rotate(15, Direction::Forward, None), Some(0));
        assert_eq!(events.rotate(10, Direction::Backward, None), Some(0));
        assert_eq!(events.rotate(5, Direction::Backward, None), Some(2));
        assert_eq!(events.rotate(12, Direction::Backward, None), Some(1));
        assert_eq!(EventSet::new().rotate(1, Direction::Forward, None), None);
    }

    #[test]
    fn rotate_matching_label() {
        let events = EventSet::from_pairs([(5, "step"), (10, "turn"), (15, "step"), (20, "turn")]);
        let any = ConfidenceFilter::default();
        // On event 0 ("step"): next "step" is index 2.
        assert_eq!(events.rotate(5, Direction::Forward, Some(&any)), Some(2));
        // On event 2: wraps back to index 0.
        assert_eq!(events.rotate(15, Direction::Forward, Some(&any)), Some(0));
        // On event 3 ("turn") going back: previous "turn" is index 1.
        assert_eq!(events.rotate(20, Direction::Backward, Some(&any)), Some(1));
        assert_eq!(events.rotate(10, Direction::Backward, Some(&any)), Some(3));
    }

    #[test]
    fn rotate_matching_applies_threshold() {
        let events = EventSet::with_confidence(
            vec![5, 10, 15, 20],
            vec!["s".into(), "s".into(), "s".into(), "s".into()],
            vec![0.9, 0.2, 0.8, 0.1],
        );
        let above = ConfidenceFilter { threshold: 0.5, above: true };
        assert_eq!(events.rotate(5, Direction::Forward, Some(&above)), Some(2));
        let below = ConfidenceFilter { threshold: 0.5, above: false };
        assert_eq!(events.rotate(5, Direction::Forward, Some(&below)), Some(1));
        assert_eq!(events.rotate(10, Direction::Forward, Some(&below)), Some(3));
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let mut events: EventSet =
            serde_json::from_str(r#"{"frames":[64,4,4],"labels":["b","a","dup"]}"#).unwrap();
        events.normalize();
        assert_eq!(events.frames(), &[4, 64]);
        assert_eq!(events.labels(), &["a", "b"]);
    }

    #[test]
    fn row_prefix_pads_to_last_frame_width() {
        let events = EventSet::from_pairs([(4, "a"), (164, "b")]);
        assert_eq!(events.row_prefix(0).unwrap(), "004 │ ");
        let detected = EventSet::with_confidence(vec![7], vec!["a".into()], vec![0.5]);
        assert_eq!(detected.row_prefix(0).unwrap(), "7 0.50 | ");
    }
}
