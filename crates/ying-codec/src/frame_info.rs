//! 帧分类: 按编码格式分派关键帧识别.

use serde::Serialize;
use ying_core::{YingError, YingResult};

use crate::annexb::is_annex_b;
use crate::parsers::{av1, h264, h265, vp9};
use crate::{CompressedVideo, VideoCodec};

/// 一帧的解码元数据
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    /// 是否为关键帧 (可独立解码)
    pub is_key_frame: bool,
    /// 是否可能需要低延迟改写 (仅 H.264 含 IDR 时为 true)
    pub may_need_rewrite: bool,
}

impl FrameInfo {
    fn key_frame(is_key_frame: bool) -> Self {
        Self {
            is_key_frame,
            may_need_rewrite: false,
        }
    }
}

/// 识别一帧压缩视频
pub fn get_frame_info(frame: &CompressedVideo) -> YingResult<FrameInfo> {
    get_frame_info_for(frame.codec(), &frame.data)
}

/// 按给定编码格式识别一个访问单元
///
/// 未知格式返回全 false. VP9 frame_marker 非法与不支持的 AV1 OBU 返回错误.
pub fn get_frame_info_for(codec: Option<VideoCodec>, data: &[u8]) -> YingResult<FrameInfo> {
    let info = match codec {
        Some(VideoCodec::H264) => h264::frame_info(data),
        Some(VideoCodec::H265) => FrameInfo::key_frame(h265::is_keyframe(data)),
        Some(VideoCodec::Vp9) => FrameInfo::key_frame(vp9::is_keyframe(data)?),
        Some(VideoCodec::Av1) => FrameInfo::key_frame(av1::is_keyframe(data)?),
        None => FrameInfo::default(),
    };
    Ok(info)
}

/// 检查一帧是否可以送入解码流程, 返回其编码格式
pub fn validate_frame(frame: &CompressedVideo) -> YingResult<VideoCodec> {
    if frame.is_empty() {
        return Err(YingError::InvalidData("视频帧数据为空".into()));
    }
    let codec = frame.codec().ok_or_else(|| {
        YingError::Unsupported(format!("不支持的视频格式: {}", frame.format))
    })?;
    if codec.uses_annex_b() && !is_annex_b(&frame.data) {
        return Err(YingError::InvalidData(format!(
            "{}: 数据不是 Annex-B 格式",
            codec.name().to_uppercase()
        )));
    }
    Ok(codec)
}
