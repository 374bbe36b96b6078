//! Trim window restricting which portion of a source video is processed.

use serde::{Deserialize, Serialize};

/// Inclusive frame bounds at source fps. Either, both, or neither may be
/// set. Frame extraction and audio restore both derive their time offsets
/// from the same formula here, which keeps them in sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimWindow {
    #[serde(default)]
    pub start_frame: Option<u64>,
    #[serde(default)]
    pub end_frame: Option<u64>,
}

impl TrimWindow {
    pub fn new(start_frame: Option<u64>, end_frame: Option<u64>) -> Self {
        Self {
            start_frame,
            end_frame,
        }
    }

    /// True when at least one bound is set.
    pub fn is_active(&self) -> bool {
        self.start_frame.is_some() || self.end_frame.is_some()
    }

    /// When both bounds are set, start must not exceed end.
    pub fn is_valid(&self) -> bool {
        match (self.start_frame, self.end_frame) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    /// Start offset in seconds at the given fps.
    pub fn start_seconds(&self, fps: f64) -> Option<f64> {
        self.start_frame.map(|frame| frame as f64 / fps)
    }

    /// End offset in seconds at the given fps.
    pub fn end_seconds(&self, fps: f64) -> Option<f64> {
        self.end_frame.map(|frame| frame as f64 / fps)
    }

    /// Number of frames the window keeps out of `total`.
    pub fn frame_count(&self, total: u64) -> u64 {
        let start = self.start_frame.unwrap_or(0).min(total);
        let end = self.end_frame.unwrap_or(total).min(total);
        end.saturating_sub(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(TrimWindow::default().is_valid());
        assert!(TrimWindow::new(Some(10), None).is_valid());
        assert!(TrimWindow::new(Some(10), Some(10)).is_valid());
        assert!(!TrimWindow::new(Some(11), Some(10)).is_valid());
    }

    #[test]
    fn test_seconds_are_exact_frame_over_fps() {
        let trim = TrimWindow::new(Some(50), Some(200));
        assert_eq!(trim.start_seconds(25.0), Some(50.0 / 25.0));
        assert_eq!(trim.end_seconds(25.0), Some(200.0 / 25.0));
        assert_eq!(trim.start_seconds(29.97), Some(50.0 / 29.97));
    }

    #[test]
    fn test_frame_count_scenario() {
        // 10s @ 25fps source trimmed to [50, 200) keeps 150 frames.
        let trim = TrimWindow::new(Some(50), Some(200));
        assert_eq!(trim.frame_count(250), 150);
    }

    #[test]
    fn test_frame_count_unbounded() {
        assert_eq!(TrimWindow::default().frame_count(250), 250);
        assert_eq!(TrimWindow::new(Some(100), None).frame_count(250), 150);
        assert_eq!(TrimWindow::new(None, Some(100)).frame_count(250), 100);
        // End beyond the source is clamped.
        assert_eq!(TrimWindow::new(None, Some(400)).frame_count(250), 250);
    }
}
