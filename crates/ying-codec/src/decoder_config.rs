//! 解码器配置推导.
//!
//! H.264 从 SPS 推导 codec 字符串与编码尺寸, 其他格式使用固定的代表性 codec 字符串.

use serde::{Deserialize, Serialize};
use ying_core::YingResult;

use crate::parsers::h264;
use crate::{CompressedVideo, VideoCodec};

/// H.265 Main profile, level 3.1
pub const H265_CODEC_STRING: &str = "hvc1.1.6.L93.B0";
/// VP9 profile 0, level 3.1, 8-bit
pub const VP9_CODEC_STRING: &str = "vp09.00.31.08";
/// AV1 Main profile, level 3.1, 8-bit
pub const AV1_CODEC_STRING: &str = "av01.0.05M.08";

/// 硬件加速偏好
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareAcceleration {
    /// 不指定
    #[default]
    NoPreference,
    /// 优先硬件
    PreferHardware,
    /// 优先软件
    PreferSoftware,
}

/// 传给解码原语的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoderConfig {
    /// codec 字符串 (如 `avc1.42C01E`)
    pub codec: String,
    /// 编码宽度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coded_width: Option<u32>,
    /// 编码高度
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coded_height: Option<u32>,
    /// 显示宽度 (非方形像素时)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_aspect_width: Option<u32>,
    /// 显示高度 (非方形像素时)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_aspect_height: Option<u32>,
    /// 是否优化延迟
    #[serde(default)]
    pub optimize_for_latency: bool,
    /// 硬件加速偏好
    #[serde(default)]
    pub hardware_acceleration: HardwareAcceleration,
}

impl DecoderConfig {
    /// 仅含 codec 字符串的配置
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            coded_width: None,
            coded_height: None,
            display_aspect_width: None,
            display_aspect_height: None,
            optimize_for_latency: false,
            hardware_acceleration: HardwareAcceleration::NoPreference,
        }
    }

    /// 设置编码尺寸
    pub fn with_coded_size(mut self, width: u32, height: u32) -> Self {
        self.coded_width = Some(width);
        self.coded_height = Some(height);
        self
    }

    /// 编码尺寸 (宽, 高)
    pub fn coded_size(&self) -> Option<(u32, u32)> {
        self.coded_width.zip(self.coded_height)
    }
}

/// 由关键帧推导解码器配置
///
/// H.264 不含 SPS 或格式未知时返回 `Ok(None)`, SPS 非法时返回错误.
pub fn create_decoder_config(frame: &CompressedVideo) -> YingResult<Option<DecoderConfig>> {
    let config = match frame.codec() {
        Some(VideoCodec::H264) => {
            h264::parse_sps(&frame.data)?.map(|sps| h264::decoder_config_from_sps(&sps))
        }
        Some(VideoCodec::H265) => Some(DecoderConfig::new(H265_CODEC_STRING)),
        Some(VideoCodec::Vp9) => Some(DecoderConfig::new(VP9_CODEC_STRING)),
        Some(VideoCodec::Av1) => Some(DecoderConfig::new(AV1_CODEC_STRING)),
        None => None,
    };
    Ok(config)
}
