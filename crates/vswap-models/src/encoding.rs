//! Video encoding configuration and quality mapping.
//!
//! Quality is a 0-100 percentage mapped linearly onto each encoder
//! family's native compression parameter (crf, cq, or per-frame q:v).
//! Higher quality percent always means a lower compression number.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default output quality percentage.
pub const DEFAULT_VIDEO_QUALITY: u8 = 80;
/// Default encoding preset.
pub const DEFAULT_PRESET: VideoPreset = VideoPreset::Veryfast;

/// Per-frame `-q:v` value for frame extraction and image compression.
/// Lower is higher quality in the target codec's convention.
pub fn frame_quality(percent: u8) -> u8 {
    (31.0 - percent.min(100) as f64 * 0.31).round() as u8
}

/// Supported output video encoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    Libx264,
    Libx265,
    LibvpxVp9,
    H264Nvenc,
    HevcNvenc,
    /// Pass-through: no compression flags are emitted.
    #[serde(untagged)]
    Other(String),
}

impl VideoEncoder {
    /// The codec name as passed to `-c:v`.
    pub fn codec_name(&self) -> &str {
        match self {
            VideoEncoder::Libx264 => "libx264",
            VideoEncoder::Libx265 => "libx265",
            VideoEncoder::LibvpxVp9 => "libvpx-vp9",
            VideoEncoder::H264Nvenc => "h264_nvenc",
            VideoEncoder::HevcNvenc => "hevc_nvenc",
            VideoEncoder::Other(name) => name,
        }
    }

    /// CRF-family software encoders.
    pub fn is_crf_family(&self) -> bool {
        matches!(self, VideoEncoder::Libx264 | VideoEncoder::Libx265)
    }

    /// GPU-accelerated NVENC variants.
    pub fn is_nvenc_family(&self) -> bool {
        matches!(self, VideoEncoder::H264Nvenc | VideoEncoder::HevcNvenc)
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_name())
    }
}

impl FromStr for VideoEncoder {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "libx264" => VideoEncoder::Libx264,
            "libx265" => VideoEncoder::Libx265,
            "libvpx-vp9" => VideoEncoder::LibvpxVp9,
            "h264_nvenc" => VideoEncoder::H264Nvenc,
            "hevc_nvenc" => VideoEncoder::HevcNvenc,
            other => VideoEncoder::Other(other.to_string()),
        })
    }
}

/// Human-readable speed presets (x264/x265 naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl VideoPreset {
    /// All preset names in speed order.
    pub const ALL: &'static [VideoPreset] = &[
        VideoPreset::Ultrafast,
        VideoPreset::Superfast,
        VideoPreset::Veryfast,
        VideoPreset::Faster,
        VideoPreset::Fast,
        VideoPreset::Medium,
        VideoPreset::Slow,
        VideoPreset::Slower,
        VideoPreset::Veryslow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoPreset::Ultrafast => "ultrafast",
            VideoPreset::Superfast => "superfast",
            VideoPreset::Veryfast => "veryfast",
            VideoPreset::Faster => "faster",
            VideoPreset::Fast => "fast",
            VideoPreset::Medium => "medium",
            VideoPreset::Slow => "slow",
            VideoPreset::Slower => "slower",
            VideoPreset::Veryslow => "veryslow",
        }
    }

    /// Remap to the NVENC p1-p7 ordinal scale. Total over all presets.
    pub fn nvenc_name(&self) -> &'static str {
        match self {
            VideoPreset::Ultrafast | VideoPreset::Superfast | VideoPreset::Veryfast => "p1",
            VideoPreset::Faster => "p2",
            VideoPreset::Fast => "p3",
            VideoPreset::Medium => "p4",
            VideoPreset::Slow => "p5",
            VideoPreset::Slower => "p6",
            VideoPreset::Veryslow => "p7",
        }
    }
}

impl fmt::Display for VideoPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown preset names.
#[derive(Debug, Error)]
#[error("unknown video preset: {0}")]
pub struct UnknownPreset(String);

impl FromStr for VideoPreset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoPreset::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPreset(s.to_string()))
    }
}

/// Output encoding profile: encoder, 0-100 quality, speed preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub encoder: VideoEncoder,
    pub quality: u8,
    pub preset: VideoPreset,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            encoder: VideoEncoder::Libx264,
            quality: DEFAULT_VIDEO_QUALITY,
            preset: DEFAULT_PRESET,
        }
    }
}

impl EncodingProfile {
    pub fn new(encoder: VideoEncoder, quality: u8, preset: VideoPreset) -> Self {
        Self {
            encoder,
            quality: quality.min(100),
            preset,
        }
    }

    /// CRF for the x264/x265 family.
    pub fn crf(&self) -> u8 {
        (51.0 - self.quality as f64 * 0.51).round() as u8
    }

    /// CRF for the VP9 family.
    pub fn vp9_crf(&self) -> u8 {
        (63.0 - self.quality as f64 * 0.63).round() as u8
    }

    /// Constant-quality value for the NVENC family.
    pub fn nvenc_cq(&self) -> u8 {
        (51.0 - self.quality as f64 * 0.51).round() as u8
    }

    /// FFmpeg output arguments for this profile.
    ///
    /// Unknown encoders get the codec flag only, no compression flags.
    pub fn to_output_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.encoder.codec_name().to_string()];

        if self.encoder.is_crf_family() {
            args.extend([
                "-crf".to_string(),
                self.crf().to_string(),
                "-preset".to_string(),
                self.preset.as_str().to_string(),
            ]);
        } else if self.encoder == VideoEncoder::LibvpxVp9 {
            args.extend(["-crf".to_string(), self.vp9_crf().to_string()]);
        } else if self.encoder.is_nvenc_family() {
            args.extend([
                "-cq".to_string(),
                self.nvenc_cq().to_string(),
                "-preset".to_string(),
                self.preset.nvenc_name().to_string(),
            ]);
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crf_formula() {
        // quality=80 => round(51 - 80*0.51) = round(10.2) = 10
        let profile = EncodingProfile::new(VideoEncoder::Libx264, 80, VideoPreset::Medium);
        assert_eq!(profile.crf(), 10);

        let profile = EncodingProfile::new(VideoEncoder::Libx265, 0, VideoPreset::Medium);
        assert_eq!(profile.crf(), 51);

        let profile = EncodingProfile::new(VideoEncoder::Libx264, 100, VideoPreset::Medium);
        assert_eq!(profile.crf(), 0);
    }

    #[test]
    fn test_vp9_formula() {
        let profile = EncodingProfile::new(VideoEncoder::LibvpxVp9, 0, VideoPreset::Medium);
        assert_eq!(profile.vp9_crf(), 63);
        let profile = EncodingProfile::new(VideoEncoder::LibvpxVp9, 100, VideoPreset::Medium);
        assert_eq!(profile.vp9_crf(), 0);
    }

    #[test]
    fn test_quality_mapping_monotonic() {
        for family in [VideoEncoder::Libx264, VideoEncoder::LibvpxVp9, VideoEncoder::H264Nvenc] {
            let mut last = u8::MAX;
            for quality in 0..=100u8 {
                let profile = EncodingProfile::new(family.clone(), quality, VideoPreset::Medium);
                let value = match &family {
                    VideoEncoder::LibvpxVp9 => profile.vp9_crf(),
                    f if f.is_nvenc_family() => profile.nvenc_cq(),
                    _ => profile.crf(),
                };
                assert!(value <= last, "quality {} raised the parameter", quality);
                last = value;
            }
        }
    }

    #[test]
    fn test_frame_quality_formula() {
        assert_eq!(frame_quality(100), 0);
        assert_eq!(frame_quality(0), 31);
        // round(31 - 50*0.31) = round(15.5) = 16
        assert_eq!(frame_quality(50), 16);
    }

    #[test]
    fn test_nvenc_preset_map_total() {
        for preset in VideoPreset::ALL {
            let name = preset.nvenc_name();
            assert!(name.starts_with('p'));
            let ordinal: u8 = name[1..].parse().unwrap();
            assert!((1..=7).contains(&ordinal));
        }
        assert_eq!(VideoPreset::Ultrafast.nvenc_name(), "p1");
        assert_eq!(VideoPreset::Superfast.nvenc_name(), "p1");
        assert_eq!(VideoPreset::Veryfast.nvenc_name(), "p1");
        assert_eq!(VideoPreset::Faster.nvenc_name(), "p2");
        assert_eq!(VideoPreset::Veryslow.nvenc_name(), "p7");
    }

    #[test]
    fn test_output_args_crf_family() {
        let profile = EncodingProfile::new(VideoEncoder::Libx264, 80, VideoPreset::Fast);
        let args = profile.to_output_args();
        assert_eq!(
            args,
            vec!["-c:v", "libx264", "-crf", "10", "-preset", "fast"]
        );
    }

    #[test]
    fn test_output_args_vp9_has_no_preset() {
        let profile = EncodingProfile::new(VideoEncoder::LibvpxVp9, 80, VideoPreset::Fast);
        let args = profile.to_output_args();
        assert!(!args.contains(&"-preset".to_string()));
        assert!(args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_output_args_nvenc() {
        let profile = EncodingProfile::new(VideoEncoder::HevcNvenc, 80, VideoPreset::Slow);
        let args = profile.to_output_args();
        assert_eq!(
            args,
            vec!["-c:v", "hevc_nvenc", "-cq", "10", "-preset", "p5"]
        );
    }

    #[test]
    fn test_output_args_unknown_encoder_passthrough() {
        let profile = EncodingProfile::new(
            VideoEncoder::Other("prores_ks".to_string()),
            80,
            VideoPreset::Fast,
        );
        assert_eq!(profile.to_output_args(), vec!["-c:v", "prores_ks"]);
    }

    #[test]
    fn test_encoder_from_str() {
        assert_eq!(
            "libvpx-vp9".parse::<VideoEncoder>().unwrap(),
            VideoEncoder::LibvpxVp9
        );
        assert_eq!(
            "something_else".parse::<VideoEncoder>().unwrap(),
            VideoEncoder::Other("something_else".to_string())
        );
    }
}
