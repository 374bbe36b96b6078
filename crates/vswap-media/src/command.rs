//! FFmpeg command builder and runner.
//!
//! Every invocation carries the fixed baseline `-hide_banner -loglevel
//! error` plus `-y`, so the only bytes FFmpeg ever writes to stderr in
//! silent mode are genuine errors.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressSink};

/// Builder for FFmpeg command lines with one or more inputs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCommand {
    /// Per-input argument groups; each group ends with `-i <path>`.
    inputs: Vec<Vec<String>>,
    /// Arguments queued before the next `input()` call.
    pending_input_args: Vec<String>,
    /// Output arguments (after all inputs).
    output_args: Vec<String>,
    /// Output target (file path or `pipe:1`).
    output: Option<String>,
}

impl FfmpegCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an argument to apply before the next input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.pending_input_args.push(arg.into());
        self
    }

    /// Queue multiple arguments to apply before the next input.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending_input_args
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an input, consuming any queued input arguments.
    pub fn input(mut self, path: impl Into<String>) -> Self {
        let mut group = std::mem::take(&mut self.pending_input_args);
        group.push("-i".to_string());
        group.push(path.into());
        self.inputs.push(group);
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the video filter chain.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set the output target.
    pub fn output(mut self, target: impl Into<String>) -> Self {
        self.output = Some(target.into());
        self
    }

    /// Build the full argument list.
    ///
    /// When `progress` is set, `-progress pipe:2 -nostats` is inserted so
    /// the runner can parse incremental progress events from stderr.
    pub fn build_args(&self, progress: bool) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        if progress {
            args.push("-progress".to_string());
            args.push("pipe:2".to_string());
            args.push("-nostats".to_string());
        }

        for group in &self.inputs {
            args.extend(group.clone());
        }

        args.extend(self.output_args.clone());

        if let Some(output) = &self.output {
            args.push("-y".to_string());
            args.push(output.clone());
        }

        args
    }
}

/// Runner supervising the external FFmpeg process.
#[derive(Debug, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run to completion, capturing stderr. Any stderr output or a
    /// non-zero exit is a failure.
    pub async fn run_silent(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args(false);
        debug!("running ffmpeg {}", args.join(" "));

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() || !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(exit_code = ?output.status.code(), %stderr, "ffmpeg failed");
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg reported errors",
                Some(stderr),
                output.status.code(),
            ));
        }

        Ok(())
    }

    /// Run while forwarding a monotonically non-decreasing 0-100 progress
    /// value to the sink. `total_duration_ms` scales the raw out_time.
    pub async fn run_with_progress(
        &self,
        cmd: &FfmpegCommand,
        total_duration_ms: i64,
        sink: ProgressSink,
    ) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args(true);
        debug!("running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            MediaError::ffmpeg_failed("stderr not captured", None, None)
        })?;
        let mut reader = BufReader::new(stderr).lines();

        let progress_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut last_pct = 0.0_f64;

            while let Ok(Some(line)) = reader.next_line().await {
                if parse_progress_line(&line, &mut current) {
                    let pct = if current.is_complete {
                        100.0
                    } else {
                        current.percentage(total_duration_ms)
                    };
                    if pct > last_pct {
                        last_pct = pct;
                        sink(pct);
                    }
                }
            }
        });

        let status = child.wait().await;
        let _ = progress_handle.await;
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            debug!(exit_code = ?status.code(), "ffmpeg exited abnormally during tracked run");
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }

    /// Spawn FFmpeg with piped stdin/stdout for raw byte plumbing.
    pub fn open_stream(&self, cmd: &FfmpegCommand) -> MediaResult<Child> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args(false);
        debug!("opening ffmpeg stream {}", args.join(" "));

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(child)
    }
}

/// Parse one `-progress` key=value line into the running state.
///
/// Returns true when the line completes an event (the `progress` key).
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> bool {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                // Both keys report microseconds in modern builds.
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                if value != "N/A" {
                    if let Some(speed) = value.strip_suffix('x') {
                        if let Ok(speed) = speed.parse() {
                            current.speed = speed;
                        }
                    }
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return true;
            }
            _ => {}
        }
    }

    false
}
