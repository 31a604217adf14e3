//! 视频编码格式标识.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ying_core::YingError;

/// 支持的视频编码格式
///
/// 字符串形式与录制数据中 `CompressedVideo.format` 字段一致.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9
    Vp9,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// 格式名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
        }
    }

    /// 按格式字符串识别, 未知格式返回 None
    pub fn from_format(format: &str) -> Option<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Some(Self::H264),
            "h265" | "hevc" => Some(Self::H265),
            "vp9" => Some(Self::Vp9),
            "av1" => Some(Self::Av1),
            _ => None,
        }
    }

    /// 是否使用 Annex-B 起始码分帧
    pub const fn uses_annex_b(&self) -> bool {
        matches!(self, Self::H264 | Self::H265)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoCodec {
    type Err = YingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_format(s)
            .ok_or_else(|| YingError::Unsupported(format!("未知视频格式: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_format() {
        assert_eq!(VideoCodec::from_format("h264"), Some(VideoCodec::H264));
        assert_eq!(VideoCodec::from_format("HEVC"), Some(VideoCodec::H265));
        assert_eq!(VideoCodec::from_format("vp9"), Some(VideoCodec::Vp9));
        assert_eq!(VideoCodec::from_format("av1"), Some(VideoCodec::Av1));
        assert_eq!(VideoCodec::from_format("mjpeg"), None);
        assert!("vp8".parse::<VideoCodec>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for codec in [VideoCodec::H264, VideoCodec::H265, VideoCodec::Vp9, VideoCodec::Av1] {
            assert_eq!(codec.to_string().parse::<VideoCodec>().unwrap(), codec);
        }
    }
}
