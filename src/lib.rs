//! # Ying (影)
//!
//! 纯 Rust 实现的视频码流引擎与自适应解码调度器.
//!
//! Ying 面向录制回放场景中的压缩视频帧:
//! - **码流解析**: Annex-B / OBU 扫描, H.264 SPS 解析与重写
//! - **帧分类**: H.264 / H.265 / VP9 / AV1 关键帧识别
//! - **低延迟改写**: 强制 `max_num_reorder_frames = 0`, 让解码器立即输出
//! - **解码调度**: 关键帧门控、时间有序帧缓存、播放头投影与 seek 恢复
//!
//! # 快速开始
//!
//! ```rust
//! use ying::codec::{CompressedVideo, get_frame_info};
//!
//! // AUD + IDR
//! let data = vec![0, 0, 0, 1, 0x09, 0xF0, 0, 0, 0, 1, 0x65, 0x88, 0x80];
//! let frame = CompressedVideo::new(0, "h264", data);
//! let info = get_frame_info(&frame).unwrap();
//! assert!(info.is_key_frame);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `ying-core` | 错误类型与位级读写 |
//! | `ying-codec` | 码流解析、帧分类与低延迟改写 |
//! | `ying-decode` | 解码调度与工作线程 |

/// 错误类型与位级读写工具
pub use ying_core as core;

/// 码流解析与帧分类
pub use ying_codec as codec;

/// 解码调度
pub use ying_decode as decode;

pub mod logging;
pub mod probe;

/// 获取 Ying 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
