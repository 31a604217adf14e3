//! 压缩视频帧.
//!
//! 对应录制数据中的一条 `CompressedVideo` 消息: 一个访问单元的压缩数据,
//! 带纳秒时间戳与格式字符串.

use bytes::Bytes;

use crate::VideoCodec;

/// 一帧压缩视频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedVideo {
    /// 时间戳 (纳秒)
    pub timestamp_nanos: i64,
    /// 格式字符串 (`h264`, `h265`, `vp9`, `av1`)
    pub format: String,
    /// 压缩数据
    pub data: Bytes,
}

impl CompressedVideo {
    /// 创建压缩帧
    pub fn new(timestamp_nanos: i64, format: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp_nanos,
            format: format.into(),
            data: data.into(),
        }
    }

    /// 识别编码格式
    pub fn codec(&self) -> Option<VideoCodec> {
        VideoCodec::from_format(&self.format)
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空帧
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
