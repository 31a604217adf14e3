//! VP9 关键帧识别.
//!
//! 只读取未压缩头部的首字节:
//! ```text
//! frame_marker(2) | profile_low_bit(1) | profile_high_bit(1) | [reserved_zero(1), 仅 profile 3]
//! | show_existing_frame(1) | frame_type(1) | show_frame(1)
//! ```

use ying_core::{BitReader, YingError, YingResult};

/// VP9 frame_marker 的固定值
const FRAME_MARKER: u32 = 2;

/// VP9 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vp9FrameType {
    /// KEY_FRAME (0)
    Key,
    /// NON_KEY_FRAME (1)
    NonKey,
}

/// VP9 未压缩头部的帧类型字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vp9FrameHeader {
    /// profile (0-3)
    pub profile: u8,
    /// show_existing_frame
    pub show_existing_frame: bool,
    /// frame_type, show_existing_frame 为 1 时不出现
    pub frame_type: Option<Vp9FrameType>,
    /// show_frame
    pub show_frame: bool,
}

impl Vp9FrameHeader {
    /// 解析帧头首字节
    pub fn parse(data: &[u8]) -> YingResult<Self> {
        let mut br = BitReader::new(data);
        let frame_marker = br.read_bits(2)?;
        if frame_marker != FRAME_MARKER {
            return Err(YingError::InvalidData(format!(
                "VP9: frame_marker 应为 2, 实际为 {}",
                frame_marker
            )));
        }
        let profile_low = br.read_bit()?;
        let profile_high = br.read_bit()?;
        let profile = ((profile_high << 1) | profile_low) as u8;
        if profile == 3 {
            br.skip_bits(1)?;
        }

        let show_existing_frame = br.read_flag()?;
        if show_existing_frame {
            return Ok(Self {
                profile,
                show_existing_frame,
                frame_type: None,
                show_frame: true,
            });
        }

        let frame_type = if br.read_flag()? {
            Vp9FrameType::NonKey
        } else {
            Vp9FrameType::Key
        };
        let show_frame = br.read_flag()?;
        Ok(Self {
            profile,
            show_existing_frame,
            frame_type: Some(frame_type),
            show_frame,
        })
    }

    /// 是否为可显示的关键帧
    pub fn is_keyframe(&self) -> bool {
        !self.show_existing_frame && self.frame_type == Some(Vp9FrameType::Key) && self.show_frame
    }
}

/// 判断 VP9 帧是否为关键帧
///
/// 空数据返回 `Ok(false)`, frame_marker 非法时返回错误.
pub fn is_keyframe(data: &[u8]) -> YingResult<bool> {
    if data.is_empty() {
        return Ok(false);
    }
    Ok(Vp9FrameHeader::parse(data)?.is_keyframe())
}
