//! Per-run temporary frame storage.
//!
//! One workspace per processing run: zero-padded 4-digit frame files plus
//! a fixed-name intermediate output video. The zero padding keeps
//! lexicographic filename order identical to sequence order.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use vswap_models::FrameRef;

use crate::error::MediaResult;

/// Fixed name of the merged-but-silent intermediate video.
pub const TEMP_OUTPUT_VIDEO_NAME: &str = "temp.mp4";

/// Temporary workspace holding extracted frames for one run.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
    run_id: Uuid,
}

impl TempWorkspace {
    /// Create a fresh workspace. Removed on drop or explicit purge.
    pub fn create() -> MediaResult<Self> {
        let dir = tempfile::Builder::new().prefix("vswap-").tempdir()?;
        let run_id = Uuid::new_v4();
        debug!(%run_id, "created temp workspace at {}", dir.path().display());
        Ok(Self { dir, run_id })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// FFmpeg output pattern for numbered frames.
    pub fn frames_pattern(&self) -> String {
        self.dir.path().join("%04d.png").to_string_lossy().into_owned()
    }

    /// Path of frame `sequence_number` (1-based).
    pub fn frame_path(&self, sequence_number: u64) -> PathBuf {
        self.dir.path().join(format!("{:04}.png", sequence_number))
    }

    /// Path of the intermediate output video.
    pub fn output_video_path(&self) -> PathBuf {
        self.dir.path().join(TEMP_OUTPUT_VIDEO_NAME)
    }

    /// Collect extracted frames, sorted by filename (equals sequence
    /// order thanks to the zero padding).
    pub fn collect_frames(&self) -> MediaResult<Vec<FrameRef>> {
        let mut names: Vec<PathBuf> = std::fs::read_dir(self.dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|e| e == "png").unwrap_or(false))
            .collect();
        names.sort();

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, path)| FrameRef::new(i as u64 + 1, path))
            .collect())
    }

    /// Remove the workspace and everything in it.
    pub fn purge(self) -> MediaResult<()> {
        debug!(run_id = %self.run_id, "purging temp workspace");
        self.dir.close()?;
        Ok(())
    }
}
