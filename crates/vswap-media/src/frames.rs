//! Video decompose/recompose operations.
//!
//! Every operation here returns a boolean success flag and never raises
//! to its caller; diagnostics go to the debug log. A failed stage leaves
//! a multi-item batch run free to continue with the next item.

use std::path::Path;

use tracing::debug;

use vswap_models::{frame_quality, EncodingProfile, Resolution, RunConfig, TrimWindow};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::hwaccel::HwAccel;
use crate::probe::probe_video;
use crate::progress::ProgressSink;
use crate::temp::TempWorkspace;

/// Build the extraction filter chain in fixed order: trim, scale, fps.
///
/// Absent trim bounds omit only the trim clause; the remaining clauses
/// never reorder.
pub fn build_extract_filter(trim: &TrimWindow, resolution: Option<Resolution>, fps: f64) -> String {
    let mut clauses = Vec::new();

    match (trim.start_frame, trim.end_frame) {
        (Some(start), Some(end)) => {
            clauses.push(format!("trim=start_frame={}:end_frame={}", start, end));
        }
        (Some(start), None) => clauses.push(format!("trim=start_frame={}", start)),
        (None, Some(end)) => clauses.push(format!("trim=end_frame={}", end)),
        (None, None) => {}
    }

    if let Some(resolution) = resolution {
        let normalized = resolution.normalize();
        clauses.push(format!("scale={}:{}", normalized.width, normalized.height));
    }

    clauses.push(format!("fps={}", fps));
    clauses.join(",")
}

/// Decompose a video into numbered frames in the workspace.
///
/// Output is forced to constant frame rate so frame indices stay aligned
/// with `frame / fps` time arithmetic.
pub async fn extract_frames(
    source: impl AsRef<Path>,
    ws: &TempWorkspace,
    fps: f64,
    config: &RunConfig,
    accel: HwAccel,
    sink: Option<ProgressSink>,
) -> bool {
    let source = source.as_ref();

    if !config.trim.is_valid() {
        debug!("refusing extraction: trim start exceeds end");
        return false;
    }

    let filter = build_extract_filter(&config.trim, config.output_resolution, fps);
    let cmd = FfmpegCommand::new()
        .input_args(["-hwaccel", accel.flag_value().unwrap_or("auto")])
        .input(source.to_string_lossy())
        .output_args(["-q:v", &frame_quality(config.temp_frame_quality).to_string()])
        .output_args(["-pix_fmt", "rgb24"])
        .video_filter(filter)
        .output_args(["-fps_mode", "cfr"])
        .output(ws.frames_pattern());

    let runner = FfmpegRunner::new();
    let result = match sink {
        Some(sink) => {
            let total_ms = trimmed_duration_ms(source, &config.trim, fps).await;
            runner.run_with_progress(&cmd, total_ms, sink).await
        }
        None => runner.run_silent(&cmd).await,
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            debug!("frame extraction failed for {}: {}", source.display(), e);
            false
        }
    }
}

/// Recompose numbered frames into the fixed-name intermediate video.
///
/// Pixel format and color space are always forced to 4:2:0 / BT.709.
pub async fn merge_frames(
    ws: &TempWorkspace,
    fps: f64,
    profile: &EncodingProfile,
    accel: HwAccel,
    sink: Option<ProgressSink>,
) -> bool {
    let frame_total = ws.collect_frames().map(|f| f.len()).unwrap_or(0) as f64;

    let cmd = FfmpegCommand::new()
        .input_args(["-hwaccel", accel.flag_value().unwrap_or("auto")])
        .input_args(["-r", &fps.to_string()])
        .input(ws.frames_pattern())
        .output_args(profile.to_output_args())
        .output_args(["-pix_fmt", "yuv420p"])
        .output_args(["-colorspace", "bt709"])
        .output(ws.output_video_path().to_string_lossy());

    let runner = FfmpegRunner::new();
    let result = match sink {
        Some(sink) => {
            let total_ms = (frame_total / fps * 1000.0) as i64;
            runner.run_with_progress(&cmd, total_ms, sink).await
        }
        None => runner.run_silent(&cmd).await,
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            debug!("frame merge failed: {}", e);
            false
        }
    }
}

/// Re-attach the original audio, trimmed to the same window as the video.
///
/// Offsets are `frame / fps` seconds from the shared trim arithmetic and
/// seek the audio donor input; `-shortest` truncates to the shorter
/// stream. Nothing is re-encoded.
pub async fn restore_audio(
    ws: &TempWorkspace,
    source: impl AsRef<Path>,
    output: impl AsRef<Path>,
    trim: &TrimWindow,
    fps: f64,
) -> bool {
    let source = source.as_ref();
    let output = output.as_ref();

    let mut cmd = FfmpegCommand::new()
        .input_args(["-hwaccel", "auto"])
        .input(ws.output_video_path().to_string_lossy());

    if let Some(start) = trim.start_seconds(fps) {
        cmd = cmd.input_args(["-ss".to_string(), start.to_string()]);
    }
    if let Some(end) = trim.end_seconds(fps) {
        cmd = cmd.input_args(["-to".to_string(), end.to_string()]);
    }

    let cmd = cmd
        .input(source.to_string_lossy())
        .output_args(["-c", "copy"])
        .output_args(["-map", "0:v:0"])
        .output_args(["-map", "1:a:0"])
        .output_arg("-shortest")
        .output(output.to_string_lossy());

    match FfmpegRunner::new().run_silent(&cmd).await {
        Ok(()) => true,
        Err(e) => {
            debug!("audio restore failed for {}: {}", output.display(), e);
            false
        }
    }
}

/// Mux a replacement audio track under the silent video, padding the
/// audio to at least the video duration before `-shortest` truncation.
pub async fn replace_audio(
    silent_video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> bool {
    let output = output.as_ref();

    let cmd = FfmpegCommand::new()
        .input_args(["-hwaccel", "auto"])
        .input(silent_video.as_ref().to_string_lossy())
        .input(audio.as_ref().to_string_lossy())
        .output_args(["-af", "apad"])
        .output_args(["-c:v", "copy"])
        .output_args(["-map", "0:v:0"])
        .output_args(["-map", "1:a:0"])
        .output_arg("-shortest")
        .output(output.to_string_lossy());

    match FfmpegRunner::new().run_silent(&cmd).await {
        Ok(()) => true,
        Err(e) => {
            debug!("audio replace failed for {}: {}", output.display(), e);
            false
        }
    }
}

/// Re-encode a processed still image in place at the given quality.
pub async fn compress_image(path: impl AsRef<Path>, quality: u8) -> bool {
    let path = path.as_ref();

    let cmd = FfmpegCommand::new()
        .input_args(["-hwaccel", "auto"])
        .input(path.to_string_lossy())
        .output_args(["-q:v", &frame_quality(quality).to_string()])
        .output(path.to_string_lossy());

    match FfmpegRunner::new().run_silent(&cmd).await {
        Ok(()) => true,
        Err(e) => {
            debug!("image compression failed for {}: {}", path.display(), e);
            false
        }
    }
}

/// Duration of the trimmed window in milliseconds, for progress scaling.
async fn trimmed_duration_ms(source: &Path, trim: &TrimWindow, fps: f64) -> i64 {
    match probe_video(source).await {
        Ok(info) => {
            let total_frames = info
                .frame_count
                .unwrap_or_else(|| (info.duration * info.fps).round() as u64);
            (trim.frame_count(total_frames) as f64 / fps * 1000.0) as i64
        }
        Err(e) => {
            debug!("probe failed while scaling progress: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_order_full_chain() {
        let trim = TrimWindow::new(Some(50), Some(200));
        let filter = build_extract_filter(&trim, Some(Resolution::new(1280, 720)), 25.0);
        assert_eq!(filter, "trim=start_frame=50:end_frame=200,scale=1280:720,fps=25");
    }

    #[test]
    fn test_filter_order_start_only() {
        let trim = TrimWindow::new(Some(50), None);
        let filter = build_extract_filter(&trim, Some(Resolution::new(1280, 720)), 25.0);
        assert_eq!(filter, "trim=start_frame=50,scale=1280:720,fps=25");
    }

    #[test]
    fn test_filter_order_end_only() {
        let trim = TrimWindow::new(None, Some(200));
        let filter = build_extract_filter(&trim, None, 30.0);
        assert_eq!(filter, "trim=end_frame=200,fps=30");
    }

    #[test]
    fn test_filter_no_trim_keeps_scale_then_fps() {
        let filter = build_extract_filter(&TrimWindow::default(), Some(Resolution::new(640, 480)), 24.0);
        assert_eq!(filter, "scale=640:480,fps=24");
    }

    #[test]
    fn test_filter_minimal() {
        let filter = build_extract_filter(&TrimWindow::default(), None, 29.97);
        assert_eq!(filter, "fps=29.97");
    }

    #[test]
    fn test_filter_scale_is_normalized() {
        let filter = build_extract_filter(&TrimWindow::default(), Some(Resolution::new(1279, 719)), 25.0);
        assert_eq!(filter, "scale=1280:720,fps=25");
    }

    #[tokio::test]
    async fn test_extract_refuses_inverted_trim() {
        let ws = TempWorkspace::create().unwrap();
        let config = RunConfig {
            trim: TrimWindow::new(Some(200), Some(50)),
            ..RunConfig::default()
        };
        assert!(!extract_frames("input.mp4", &ws, 25.0, &config, HwAccel::None, None).await);
    }
}
