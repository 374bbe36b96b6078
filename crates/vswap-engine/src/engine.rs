//! Parallel frame-transform engine.
//!
//! Frames are partitioned into batches and pushed through a bounded
//! queue into a fixed worker pool. Each worker reads a frame file,
//! applies the transform, writes the result back to the same path and
//! reports one completion event. The calling thread feeds the queue
//! and aggregates the events into the progress callback. Delivery
//! order is unspecified; the zero-padded path scheme carries frame
//! order.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use image::RgbImage;
use tracing::{debug, warn};

use vswap_media::vision::{read_image, write_image};
use vswap_models::FrameRef;

use crate::error::{EngineError, EngineResult};

/// Per-frame transform shared by all workers.
pub type FrameTransform = Arc<dyn Fn(&FrameRef, RgbImage) -> EngineResult<RgbImage> + Send + Sync>;

/// A contiguous run of frames handed to one worker at a time.
#[derive(Debug, Clone)]
pub struct FrameBatch {
    pub frames: Vec<FrameRef>,
}

/// Split frames into batches sized so each worker cycles through the
/// queue several times, keeping stragglers from serializing the tail.
pub fn partition_batches(frames: &[FrameRef], thread_count: usize) -> Vec<FrameBatch> {
    if frames.is_empty() {
        return Vec::new();
    }
    let lanes = thread_count.max(1) * 4;
    let batch_size = frames.len().div_ceil(lanes).max(1);
    frames
        .chunks(batch_size)
        .map(|chunk| FrameBatch {
            frames: chunk.to_vec(),
        })
        .collect()
}

/// Transform every frame file in place. Returns the number of frames
/// transformed and written successfully; failed frames are logged and
/// skipped, leaving their files untouched.
pub fn process_video<P>(
    frames: &[FrameRef],
    thread_count: usize,
    queue_depth: usize,
    transform: FrameTransform,
    mut progress: P,
) -> u64
where
    P: FnMut(u64, u64),
{
    let total = frames.len() as u64;
    if total == 0 {
        return 0;
    }

    let thread_count = thread_count.max(1);
    let batches = partition_batches(frames, thread_count);

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
    {
        Ok(pool) => pool,
        Err(error) => {
            warn!(%error, "worker pool construction failed");
            return 0;
        }
    };

    let (work_tx, work_rx) = mpsc::sync_channel::<FrameBatch>(queue_depth.max(1));
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (done_tx, done_rx) = mpsc::channel::<bool>();

    // Workers run detached inside the pool; the calling thread never
    // occupies a pool slot, so even a single-thread pool drains.
    for _ in 0..thread_count {
        let work_rx = work_rx.clone();
        let done_tx = done_tx.clone();
        let transform = transform.clone();
        pool.spawn(move || loop {
            // Hold the lock only for the receive so batches hand off
            // to idle workers immediately.
            let batch = match work_rx.lock() {
                Ok(receiver) => receiver.recv().ok(),
                Err(_) => None,
            };
            let Some(batch) = batch else { break };

            for frame in &batch.frames {
                let ok = process_frame_file(frame, &transform);
                if done_tx.send(ok).is_err() {
                    return;
                }
            }
        });
    }
    drop(done_tx);

    // Feed the bounded queue, then aggregate completions until every
    // worker has dropped its sender.
    for batch in batches {
        if work_tx.send(batch).is_err() {
            break;
        }
    }
    drop(work_tx);

    let mut succeeded = 0u64;
    let mut done = 0u64;
    for ok in done_rx.iter() {
        done += 1;
        if ok {
            succeeded += 1;
        }
        progress(done, total);
    }

    succeeded
}

/// Single-frame degenerate case of [`process_video`].
pub fn process_image(path: &Path, transform: FrameTransform) -> bool {
    let frame = FrameRef {
        sequence_number: 0,
        path: path.to_path_buf(),
    };
    process_frame_file(&frame, &transform)
}

fn process_frame_file(frame: &FrameRef, transform: &FrameTransform) -> bool {
    match try_process_frame_file(frame, transform) {
        Ok(()) => true,
        Err(error) => {
            debug!(frame = frame.sequence_number, %error, "frame skipped");
            false
        }
    }
}

fn try_process_frame_file(frame: &FrameRef, transform: &FrameTransform) -> EngineResult<()> {
    let pixels = read_image(&frame.path)
        .ok_or_else(|| EngineError::FrameNotReadable(frame.path.clone()))?;

    let result = transform(frame, pixels)?;
    if !write_image(&frame.path, &result) {
        return Err(EngineError::FrameNotWritable(frame.path.clone()));
    }
    Ok(())
}
