//! Frame references produced by video decomposition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One extracted frame on temporary storage.
///
/// Sequence numbers start at 1 and are dense in source playback order.
/// The on-disk names are zero-padded to four digits so lexicographic
/// filename order matches sequence order, which is what the recompose
/// stage relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRef {
    pub sequence_number: u64,
    pub path: PathBuf,
}

impl FrameRef {
    pub fn new(sequence_number: u64, path: impl Into<PathBuf>) -> Self {
        debug_assert!(sequence_number >= 1);
        Self {
            sequence_number,
            path: path.into(),
        }
    }
}

impl PartialOrd for FrameRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sequence_number.cmp(&other.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_sequence() {
        let mut frames = vec![
            FrameRef::new(3, "/tmp/0003.png"),
            FrameRef::new(1, "/tmp/0001.png"),
            FrameRef::new(2, "/tmp/0002.png"),
        ];
        frames.sort();
        let numbers: Vec<u64> = frames.iter().map(|f| f.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_padded_names_sort_like_sequence() {
        let names: Vec<String> = (1..=1200).step_by(97).map(|n| format!("{:04}.png", n)).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
