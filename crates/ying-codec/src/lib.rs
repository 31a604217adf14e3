//! # ying-codec
//!
//! 视频基本流的码流层解析库.
//!
//! ## 功能
//!
//! - **扫描**: Annex-B 起始码查找与 NAL 单元迭代, AV1 OBU 遍历
//! - **分类**: H.264 / H.265 / VP9 / AV1 关键帧识别 ([`get_frame_info`])
//! - **H.264 SPS**: 解析、重新序列化、codec 字符串与解码器配置推导
//! - **低延迟改写**: 强制 `max_num_reorder_frames = 0` 的 SPS 改写 ([`rewrite_for_low_latency`])
//!
//! ## 使用示例
//!
//! ```rust
//! use ying_codec::{VideoCodec, get_frame_info_for};
//!
//! // SPS + IDR
//! let data = [
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E,
//!     0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80,
//! ];
//! let info = get_frame_info_for(Some(VideoCodec::H264), &data).unwrap();
//! assert!(info.is_key_frame);
//! ```

pub mod annexb;
pub mod codec_id;
pub mod compressed;
pub mod decoder_config;
pub mod frame_info;
pub mod parsers;

// 重导出常用类型
pub use codec_id::VideoCodec;
pub use compressed::CompressedVideo;
pub use decoder_config::{DecoderConfig, HardwareAcceleration, create_decoder_config};
pub use frame_info::{FrameInfo, get_frame_info, get_frame_info_for, validate_frame};
pub use parsers::h264::rewrite_for_low_latency;
