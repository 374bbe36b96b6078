//! FFmpeg CLI gateway and frame decompose/recompose pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and supervised execution
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe stream inspection and hardware accelerator detection
//! - Frame extraction/merging with trim, scale and fps filters
//! - Audio restore/replace and raw PCM decoding
//! - Image IO with a shared static-image cache

pub mod audio;
pub mod command;
pub mod error;
pub mod frames;
pub mod hwaccel;
pub mod probe;
pub mod progress;
pub mod temp;
pub mod vision;

pub use audio::{get_audio_frame, read_raw_audio_samples, AudioFrame};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    build_extract_filter, compress_image, extract_frames, merge_frames, replace_audio,
    restore_audio,
};
pub use hwaccel::{detect_hardware_accelerator, HwAccel};
pub use probe::{probe_streams, probe_video, StreamInfo, VideoInfo};
pub use progress::{FfmpegProgress, ProgressSink};
pub use temp::TempWorkspace;
pub use vision::{
    clear_static_image_cache, read_image, read_static_image, resize_frame_resolution, write_image,
};
