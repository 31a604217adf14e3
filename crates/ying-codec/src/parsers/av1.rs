//! AV1 关键帧识别.
//!
//! 遍历低开销码流格式中的 OBU:
//! ```text
//! forbidden(1) | obu_type(4) | extension_flag(1) | has_size_field(1) | reserved(1)
//! [extension(8)] [obu_size(leb128)] payload
//! ```
//! 在 FRAME / FRAME_HEADER 的负载首字节读取 show_existing_frame 与 frame_type.

use ying_core::{Leb128Cursor, YingError, YingResult};

/// OBU 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObuType {
    /// OBU_SEQUENCE_HEADER
    SequenceHeader,
    /// OBU_TEMPORAL_DELIMITER
    TemporalDelimiter,
    /// OBU_FRAME_HEADER
    FrameHeader,
    /// OBU_TILE_GROUP
    TileGroup,
    /// OBU_METADATA
    Metadata,
    /// OBU_FRAME
    Frame,
    /// OBU_REDUNDANT_FRAME_HEADER
    RedundantFrameHeader,
    /// OBU_TILE_LIST
    TileList,
    /// OBU_PADDING
    Padding,
    /// 保留类型
    Reserved(u8),
}

impl ObuType {
    /// 从 4 位类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::SequenceHeader,
            2 => Self::TemporalDelimiter,
            3 => Self::FrameHeader,
            4 => Self::TileGroup,
            5 => Self::Metadata,
            6 => Self::Frame,
            7 => Self::RedundantFrameHeader,
            8 => Self::TileList,
            15 => Self::Padding,
            other => Self::Reserved(other),
        }
    }

    /// 类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::SequenceHeader => 1,
            Self::TemporalDelimiter => 2,
            Self::FrameHeader => 3,
            Self::TileGroup => 4,
            Self::Metadata => 5,
            Self::Frame => 6,
            Self::RedundantFrameHeader => 7,
            Self::TileList => 8,
            Self::Padding => 15,
            Self::Reserved(id) => *id,
        }
    }
}

/// OBU 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObuHeader {
    /// OBU 类型
    pub obu_type: ObuType,
    /// obu_extension_flag
    pub has_extension: bool,
    /// obu_has_size_field
    pub has_size_field: bool,
    /// 头部长度 (1 或 2 字节, 不含 obu_size)
    pub header_len: usize,
}

impl ObuHeader {
    /// 解析 OBU 头部, forbidden 位非零时返回 None
    pub fn parse(data: &[u8]) -> YingResult<Option<Self>> {
        let byte = *data.first().ok_or(YingError::Eof)?;
        if byte & 0x80 != 0 {
            return Ok(None);
        }
        let has_extension = byte & 0x04 != 0;
        let header_len = if has_extension { 2 } else { 1 };
        if data.len() < header_len {
            return Err(YingError::Eof);
        }
        Ok(Some(Self {
            obu_type: ObuType::from_type_id((byte >> 3) & 0x0F),
            has_extension,
            has_size_field: byte & 0x02 != 0,
            header_len,
        }))
    }
}

/// AV1 frame_type 中 KEY_FRAME 的取值
const KEY_FRAME: u8 = 0;

/// 判断 AV1 时间单元是否含关键帧
///
/// forbidden 位非零的 OBU 使整个缓冲区判为非关键帧 (容忍尾部垃圾数据).
/// 没有 obu_size 的 FRAME / FRAME_HEADER 延伸到缓冲区末尾; 其他无 obu_size 的
/// OBU 返回 [`YingError::Unsupported`].
pub fn is_keyframe(data: &[u8]) -> YingResult<bool> {
    let mut offset = 0usize;
    while offset < data.len() {
        let Some(header) = ObuHeader::parse(&data[offset..])? else {
            return Ok(false);
        };

        let mut cursor = Leb128Cursor::new(data, offset + header.header_len);
        let obu_size = if header.has_size_field {
            Some(cursor.decode()?)
        } else {
            None
        };
        let payload_start = cursor.offset();
        let payload_end = obu_size.map(|size| {
            usize::try_from(size)
                .ok()
                .and_then(|size| payload_start.checked_add(size))
                .unwrap_or(usize::MAX)
        });

        match header.obu_type {
            ObuType::TemporalDelimiter => {
                offset = payload_end.unwrap_or(payload_start);
                continue;
            }
            ObuType::Frame | ObuType::FrameHeader => {
                if let Some(&byte) = data.get(payload_start) {
                    let show_existing_frame = byte & 0x80 != 0;
                    let frame_type = (byte & 0x60) >> 5;
                    if !show_existing_frame && frame_type == KEY_FRAME {
                        return Ok(true);
                    }
                }
                offset = payload_end.unwrap_or(data.len());
                continue;
            }
            _ => {}
        }

        match payload_end {
            Some(end) => offset = end,
            None => {
                return Err(YingError::Unsupported(format!(
                    "AV1: 不支持无 obu_size 的 OBU, type={}",
                    header.obu_type.type_id()
                )));
            }
        }
    }
    Ok(false)
}
