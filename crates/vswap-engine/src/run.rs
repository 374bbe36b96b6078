//! End-to-end run orchestration.
//!
//! A video run is a straight pipeline: probe the target, extract frames
//! into a temp workspace, transform them in place, merge them back into
//! a video, restore the audio track and move the result into place.
//! Failures are absorbed into a boolean result; the temp workspace is
//! purged on every path out.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use vswap_media::audio::{get_audio_frame, read_raw_audio_samples};
use vswap_media::frames::{
    compress_image, extract_frames, merge_frames, replace_audio, restore_audio,
};
use vswap_media::hwaccel::detect_hardware_accelerator;
use vswap_media::probe::probe_video;
use vswap_media::temp::TempWorkspace;
use vswap_media::vision::read_static_image;
use vswap_models::{Face, RunConfig};

use crate::analyser::CachingAnalyser;

use crate::engine::{process_image, process_video, FrameTransform};
use crate::processor::{FrameInputs, FrameProcessor, ProcessMode};
use crate::resources::{apply_memory_policy, CacheRegistry};

/// Sample layout the sync models consume.
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;
pub const AUDIO_CHANNELS: u16 = 1;

/// Per-run inputs shared by every frame.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Identity donors for face-mapping processors.
    pub source_faces: Vec<Face>,
    /// Audio driving the sync processors. When set it also replaces the
    /// output audio track; otherwise the target's own track is restored.
    pub replacement_audio: Option<std::path::PathBuf>,
}

/// Analyse an identity donor image. Reads through the static image
/// cache so repeated runs over the same donor reuse the decoded pixels.
pub fn source_faces_from_image(analyser: &CachingAnalyser, path: &Path) -> Vec<Face> {
    match read_static_image(path) {
        Some(image) => analyser.get_many_faces(&image),
        None => {
            warn!(path = %path.display(), "source image not readable");
            Vec::new()
        }
    }
}

/// Compose the processor chain into one per-frame transform. Processors
/// run in order; each consumes the previous output. Frame numbers are
/// 1-based, audio slices are 0-based.
pub fn build_frame_transform(
    processors: Arc<Vec<Arc<dyn FrameProcessor>>>,
    run_inputs: Arc<RunInputs>,
    audio_samples: Arc<Option<Vec<i16>>>,
    fps: f64,
) -> FrameTransform {
    Arc::new(move |frame, pixels| {
        let mut current = pixels;
        for processor in processors.iter() {
            let audio_frame = audio_samples.as_ref().as_ref().and_then(|samples| {
                get_audio_frame(
                    samples,
                    AUDIO_SAMPLE_RATE,
                    AUDIO_CHANNELS,
                    fps,
                    frame.sequence_number.saturating_sub(1),
                )
            });
            let inputs = FrameInputs {
                target_frame: current,
                source_faces: run_inputs.source_faces.clone(),
                audio_frame,
                frame_number: frame.sequence_number,
            };
            current = processor.transform_frame(&inputs)?;
        }
        Ok(current)
    })
}

/// Run the full pipeline on a video file. Returns `false` on the first
/// unrecoverable step; per-frame failures only lose those frames.
pub async fn swap_video(
    config: &RunConfig,
    target: &Path,
    output: &Path,
    processors: Vec<Arc<dyn FrameProcessor>>,
    run_inputs: RunInputs,
    caches: &CacheRegistry,
) -> bool {
    for processor in &processors {
        if let Err(error) = processor.preflight_check() {
            warn!(processor = processor.name(), %error, "preflight failed");
            return false;
        }
    }

    let info = match probe_video(target).await {
        Ok(info) => info,
        Err(error) => {
            warn!(%error, "target video not probeable");
            return false;
        }
    };
    let fps = config.output_fps.unwrap_or(info.fps);

    let ws = match TempWorkspace::create() {
        Ok(ws) => ws,
        Err(error) => {
            warn!(%error, "temp workspace creation failed");
            return false;
        }
    };

    let accel = detect_hardware_accelerator().await;

    info!(run_id = %ws.run_id(), target = %target.display(), fps, %accel, "extracting frames");
    if !extract_frames(target, &ws, fps, config, accel, None).await {
        warn!("frame extraction failed");
        purge(ws);
        return false;
    }

    let audio_samples = if let Some(audio) = &run_inputs.replacement_audio {
        read_raw_audio_samples(audio, AUDIO_SAMPLE_RATE, AUDIO_CHANNELS)
            .await
            .ok()
    } else if info.has_audio {
        read_raw_audio_samples(target, AUDIO_SAMPLE_RATE, AUDIO_CHANNELS)
            .await
            .ok()
    } else {
        None
    };

    for processor in &processors {
        if let Err(error) = processor.preprocess(ProcessMode::Output) {
            warn!(processor = processor.name(), %error, "preprocess failed");
            purge(ws);
            return false;
        }
    }

    let frames = match ws.collect_frames() {
        Ok(frames) if !frames.is_empty() => frames,
        Ok(_) => {
            warn!("no frames extracted");
            purge(ws);
            return false;
        }
        Err(error) => {
            warn!(%error, "frame collection failed");
            purge(ws);
            return false;
        }
    };

    let replacement_audio = run_inputs.replacement_audio.clone();
    let transform = build_frame_transform(
        Arc::new(processors.clone()),
        Arc::new(run_inputs),
        Arc::new(audio_samples),
        fps,
    );

    let total = frames.len();
    info!(frames = total, threads = config.execution_thread_count, "transforming frames");
    let thread_count = config.execution_thread_count;
    let queue_depth = config.execution_queue_depth;
    let worker = tokio::task::spawn_blocking(move || {
        process_video(&frames, thread_count, queue_depth, transform, |done, total| {
            debug!(done, total, "frame progress")
        })
    });
    let succeeded = match worker.await {
        Ok(succeeded) => succeeded,
        Err(error) => {
            warn!(%error, "frame worker failed");
            0
        }
    };
    if succeeded < total as u64 {
        warn!(failed = total as u64 - succeeded, "some frames were not transformed");
    }

    if !merge_frames(&ws, fps, &config.output_video, accel, None).await {
        warn!("frame merge failed");
        purge(ws);
        return false;
    }

    let finished = if let Some(audio) = &replacement_audio {
        let replaced = replace_audio(ws.output_video_path(), audio, output).await;
        if !replaced {
            warn!("audio replace failed, delivering silent video");
            move_into_place(&ws.output_video_path(), output)
        } else {
            true
        }
    } else if info.has_audio {
        let restored = restore_audio(&ws, target, output, &config.trim, fps).await;
        if !restored {
            warn!("audio restore failed, delivering silent video");
            move_into_place(&ws.output_video_path(), output)
        } else {
            true
        }
    } else {
        move_into_place(&ws.output_video_path(), output)
    };

    purge(ws);

    for processor in &processors {
        apply_memory_policy(config.memory_strategy, processor.as_ref(), caches);
    }

    finished
}

/// Run the processor chain on a single image. The target is copied to
/// the output path and rewritten there.
pub async fn swap_image(
    config: &RunConfig,
    target: &Path,
    output: &Path,
    processors: Vec<Arc<dyn FrameProcessor>>,
    run_inputs: RunInputs,
    caches: &CacheRegistry,
) -> bool {
    for processor in &processors {
        if let Err(error) = processor.preflight_check() {
            warn!(processor = processor.name(), %error, "preflight failed");
            return false;
        }
        if let Err(error) = processor.preprocess(ProcessMode::Output) {
            warn!(processor = processor.name(), %error, "preprocess failed");
            return false;
        }
    }

    if let Err(error) = std::fs::copy(target, output) {
        warn!(%error, "image copy failed");
        return false;
    }

    let transform = build_frame_transform(
        Arc::new(processors.clone()),
        Arc::new(run_inputs),
        Arc::new(None),
        0.0,
    );
    let frame_path = output.to_path_buf();
    let transformed =
        match tokio::task::spawn_blocking(move || process_image(&frame_path, transform)).await {
            Ok(transformed) => transformed,
            Err(error) => {
                warn!(%error, "frame worker failed");
                false
            }
        };

    let compressed =
        transformed && compress_image(output, config.output_image_quality).await;

    for processor in &processors {
        apply_memory_policy(config.memory_strategy, processor.as_ref(), caches);
    }

    compressed
}

fn move_into_place(from: &Path, to: &Path) -> bool {
    if std::fs::rename(from, to).is_ok() {
        return true;
    }
    // Rename fails across filesystems; fall back to copy.
    match std::fs::copy(from, to) {
        Ok(_) => true,
        Err(error) => {
            warn!(%error, "output move failed");
            false
        }
    }
}

fn purge(ws: TempWorkspace) {
    if let Err(error) = ws.purge() {
        debug!(%error, "temp workspace purge failed");
    }
}
