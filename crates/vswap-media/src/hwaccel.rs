//! Hardware accelerator detection.

use std::fmt;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// Hardware accelerators recognized in FFmpeg's capability list, in
/// preference order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwAccel {
    Vulkan,
    Cuda,
    Vaapi,
    #[default]
    None,
}

impl HwAccel {
    /// Value for the `-hwaccel` flag, if any.
    pub fn flag_value(&self) -> Option<&'static str> {
        match self {
            HwAccel::Vulkan => Some("vulkan"),
            HwAccel::Cuda => Some("cuda"),
            HwAccel::Vaapi => Some("vaapi"),
            HwAccel::None => None,
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag_value().unwrap_or("none"))
    }
}

/// Detect the best available hardware accelerator by parsing
/// `ffmpeg -hwaccels`. Any failure degrades to `HwAccel::None`.
pub async fn detect_hardware_accelerator() -> HwAccel {
    let output = Command::new("ffmpeg")
        .arg("-hwaccels")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) => {
            let listing = String::from_utf8_lossy(&output.stdout);
            let accel = pick_accelerator(&listing);
            debug!(%accel, "hardware accelerator detected");
            accel
        }
        Err(e) => {
            debug!("hardware accelerator detection failed: {}", e);
            HwAccel::None
        }
    }
}

/// Pick the preferred accelerator from the advertised capability list.
fn pick_accelerator(listing: &str) -> HwAccel {
    if listing.contains("vulkan") {
        HwAccel::Vulkan
    } else if listing.contains("cuda") {
        HwAccel::Cuda
    } else if listing.contains("vaapi") {
        HwAccel::Vaapi
    } else {
        HwAccel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_order() {
        assert_eq!(
            pick_accelerator("Hardware acceleration methods:\nvaapi\ncuda\nvulkan\n"),
            HwAccel::Vulkan
        );
        assert_eq!(
            pick_accelerator("Hardware acceleration methods:\nvaapi\ncuda\n"),
            HwAccel::Cuda
        );
        assert_eq!(
            pick_accelerator("Hardware acceleration methods:\nvaapi\n"),
            HwAccel::Vaapi
        );
        assert_eq!(pick_accelerator("Hardware acceleration methods:\n"), HwAccel::None);
    }
}
