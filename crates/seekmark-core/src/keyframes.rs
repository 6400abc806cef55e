// crates/seekmark-core/src/keyframes.rs
//
// Lazy keyframe index for one video.
//
// Entries are added only as a side effect of decoding (the seek engine calls
// `insert` whenever it decodes a keyframe), never by scanning the whole file.
// The index is therefore allowed to be incomplete, but everything in it was
// observed as a keyframe. Persisted in the project entry as a plain sorted list.

use serde::{Deserialize, Serialize};

/// Strictly increasing, duplicate-free list of 1-indexed keyframe numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u64>", into = "Vec<u64>")]
pub struct KeyframeIndex {
    frames: Vec<u64>,
}

impl KeyframeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `frame` if absent. Returns `true` when the index grew.
    pub fn insert(&mut self, frame: u64) -> bool {
        match self.frames.binary_search(&frame) {
            Ok(_) => false,
            Err(pos) => {
                self.frames.insert(pos, frame);
                true
            }
        }
    }

    /// Number of entries `<= frame`.
    ///
    /// Two frames with the same bracket sit in the same known keyframe
    /// interval, so linear decoding from one to the other never has to cross
    /// an unknown keyframe boundary.
    pub fn bracket(&self, frame: u64) -> usize {
        self.frames.partition_point(|&k| k <= frame)
    }

    /// Latest known keyframe at or before `frame`.
    pub fn at_or_before(&self, frame: u64) -> Option<u64> {
        match self.bracket(frame) {
            0 => None,
            n => Some(self.frames[n - 1]),
        }
    }

    pub fn contains(&self, frame: u64) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.frames
    }
}

// Older project files may carry unsorted or duplicated lists; restore the
// invariant on the way in rather than trusting the file.
impl From<Vec<u64>> for KeyframeIndex {
    fn from(mut frames: Vec<u64>) -> Self {
        frames.sort_unstable();
        frames.dedup();
        Self { frames }
    }
}

impl From<KeyframeIndex> for Vec<u64> {
    fn from(index: KeyframeIndex) -> Self {
        index.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strictly_increasing(index: &KeyframeIndex) -> bool {
        index.as_slice().windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn insert_keeps_order_and_rejects_duplicates() {
        let mut index = KeyframeIndex::new();
        for f in [50, 1, 99, 50, 25, 1, 75, 99, 2] {
            index.insert(f);
            assert!(strictly_increasing(&index));
        }
        assert_eq!(index.as_slice(), &[1, 2, 25, 50, 75, 99]);
        assert!(!index.insert(25));
        assert!(index.insert(26));
    }

    #[test]
    fn insert_grid_is_always_sorted() {
        // Pseudo-random but deterministic insertion order.
        let mut index = KeyframeIndex::new();
        let mut x: u64 = 7;
        for _ in 0..500 {
            x = (x * 31 + 11) % 257;
            index.insert(x);
        }
        assert!(strictly_increasing(&index));
    }

    #[test]
    fn bracket_of_empty_index_is_zero() {
        let index = KeyframeIndex::new();
        assert_eq!(index.bracket(0), 0);
        assert_eq!(index.bracket(1), 0);
        assert_eq!(index.bracket(u64::MAX), 0);
    }

    #[test]
    fn bracket_counts_entries_at_or_before() {
        let index = KeyframeIndex::from(vec![1, 50, 99]);
        assert_eq!(index.bracket(0), 0);
        assert_eq!(index.bracket(1), 1);
        assert_eq!(index.bracket(49), 1);
        assert_eq!(index.bracket(50), 2);
        assert_eq!(index.bracket(75), 2);
        assert_eq!(index.bracket(99), 3);
        assert_eq!(index.bracket(1000), 3);

        let index = KeyframeIndex::from(vec![10, 20]);
        assert_eq!(index.bracket(5), 0);
    }

    #[test]
    fn bracket_matches_naive_count() {
        let index = KeyframeIndex::from(vec![3, 8, 13, 21, 34]);
        for f in 0..40 {
            let naive = index.as_slice().iter().filter(|&&k| k <= f).count();
            assert_eq!(index.bracket(f), naive, "frame {f}");
        }
    }

    #[test]
    fn at_or_before_picks_nearest_prior_keyframe() {
        let index = KeyframeIndex::from(vec![1, 50, 99]);
        assert_eq!(index.at_or_before(75), Some(50));
        assert_eq!(index.at_or_before(50), Some(50));
        assert_eq!(index.at_or_before(0), None);
    }

    #[test]
    fn deserialising_restores_invariant() {
        let index: KeyframeIndex = serde_json::from_str("[60, 0, 30, 30]").unwrap();
        assert_eq!(index.as_slice(), &[0, 30, 60]);
        assert_eq!(serde_json::to_string(&index).unwrap(), "[0,30,60]");
    }
}
