//! Raw audio decoding through the streaming process handle.

use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// One video frame's worth of PCM samples, used as the auxiliary input
/// for lip synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode a file to signed 16-bit little-endian PCM at the requested
/// rate and channel count.
///
/// Bytes are piped straight out of the decoder with no intermediate
/// file. Failure iff the process exit code is non-zero.
pub async fn read_raw_audio_samples(
    source: impl AsRef<Path>,
    sample_rate: u32,
    channels: u16,
) -> MediaResult<Vec<i16>> {
    let source = source.as_ref();

    if !source.exists() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    let cmd = FfmpegCommand::new()
        .input(source.to_string_lossy())
        .output_args(["-f", "s16le"])
        .output_args(["-acodec", "pcm_s16le"])
        .output_args(["-ar", &sample_rate.to_string()])
        .output_args(["-ac", &channels.to_string()])
        .output("pipe:1");

    let mut child = FfmpegRunner::new().open_stream(&cmd)?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("stdout not captured", None, None))?;

    let mut bytes = Vec::new();
    stdout.read_to_end(&mut bytes).await?;

    let status = child.wait().await?;
    if !status.success() {
        debug!(exit_code = ?status.code(), "raw audio decode failed for {}", source.display());
        return Err(MediaError::ffmpeg_failed(
            "raw PCM decode failed",
            None,
            status.code(),
        ));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Slice the sample stream into the chunk aligned with a video frame.
///
/// `frame_index` is 0-based; returns `None` past the end of the stream.
pub fn get_audio_frame(
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
    fps: f64,
    frame_index: u64,
) -> Option<AudioFrame> {
    if fps <= 0.0 {
        return None;
    }

    let per_frame = (sample_rate as f64 / fps * channels as f64).round() as usize;
    let start = per_frame.checked_mul(frame_index as usize)?;
    if start >= samples.len() {
        return None;
    }

    let end = (start + per_frame).min(samples.len());
    Some(AudioFrame {
        samples: samples[start..end].to_vec(),
        sample_rate,
        channels,
    })
}
