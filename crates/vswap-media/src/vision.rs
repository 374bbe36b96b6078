//! Frame pixel IO.
//!
//! Unrecognized or missing files produce `None`/`false` rather than
//! errors, so probing a path costs nothing to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use image::RgbImage;
use tracing::debug;

/// Recognized still-image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a frame from disk. `None` for unrecognized or unreadable files.
pub fn read_image(path: impl AsRef<Path>) -> Option<RgbImage> {
    let path = path.as_ref();
    if !is_image_path(path) {
        return None;
    }
    match image::open(path) {
        Ok(img) => Some(img.to_rgb8()),
        Err(e) => {
            debug!("failed to read image {}: {}", path.display(), e);
            None
        }
    }
}

/// Write a frame to disk.
pub fn write_image(path: impl AsRef<Path>, frame: &RgbImage) -> bool {
    let path = path.as_ref();
    match frame.save(path) {
        Ok(()) => true,
        Err(e) => {
            debug!("failed to write image {}: {}", path.display(), e);
            false
        }
    }
}

fn static_cache() -> &'static Mutex<HashMap<PathBuf, RgbImage>> {
    static CACHE: OnceLock<Mutex<HashMap<PathBuf, RgbImage>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Read an image through the shared process-wide cache. Source and
/// reference stills are read on every frame, so repeated decodes would
/// dominate the transform loop without this.
pub fn read_static_image(path: impl AsRef<Path>) -> Option<RgbImage> {
    let path = path.as_ref();

    if let Some(cached) = static_cache().lock().ok()?.get(path) {
        return Some(cached.clone());
    }

    let frame = read_image(path)?;
    if let Ok(mut cache) = static_cache().lock() {
        cache.insert(path.to_path_buf(), frame.clone());
    }
    Some(frame)
}

/// Drop every cached static image. Used by the strict memory tier.
pub fn clear_static_image_cache() {
    if let Ok(mut cache) = static_cache().lock() {
        let dropped = cache.len();
        cache.clear();
        debug!("cleared static image cache ({} entries)", dropped);
    }
}

/// Number of cached entries.
pub fn static_image_cache_len() -> usize {
    static_cache().lock().map(|c| c.len()).unwrap_or(0)
}

/// Downscale a frame so it fits within the given bounds; frames already
/// within bounds are returned unchanged.
pub fn resize_frame_resolution(frame: &RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    let (width, height) = frame.dimensions();

    if width <= max_width && height <= max_height {
        return frame.clone();
    }

    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = (width as f64 * scale) as u32;
    let new_height = (height as f64 * scale) as u32;
    image::imageops::resize(
        frame,
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Triangle,
    )
}
