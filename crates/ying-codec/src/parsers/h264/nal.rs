//! H.264 NAL 单元类型与 Annex-B 流遍历.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌──────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5)  │
//! └──────────────────────────────────────┘
//! ```

use std::fmt;

use crate::annexb::nal_units;
use crate::frame_info::FrameInfo;

/// H.264 NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NaluType {
    /// 非 IDR 图像切片
    Ndr,
    /// 数据分区 A
    Dpa,
    /// 数据分区 B
    Dpb,
    /// 数据分区 C
    Dpc,
    /// IDR 图像切片 (关键帧)
    Idr,
    /// 增补增强信息
    Sei,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 访问单元分隔符
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 其他类型
    Unknown(u8),
}

impl NaluType {
    /// 从 NAL 头部字节提取类型 (低 5 位)
    pub fn from_header(header: u8) -> Self {
        Self::from_type_id(header & 0x1F)
    }

    /// 从类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Ndr,
            2 => Self::Dpa,
            3 => Self::Dpb,
            4 => Self::Dpc,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            other => Self::Unknown(other),
        }
    }

    /// 类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Ndr => 1,
            Self::Dpa => 2,
            Self::Dpb => 3,
            Self::Dpc => 4,
            Self::Idr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Unknown(id) => *id,
        }
    }

    /// 是否为切片 (VCL) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(self, Self::Ndr | Self::Dpa | Self::Dpb | Self::Dpc | Self::Idr)
    }
}

impl fmt::Display for NaluType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ndr => write!(f, "NDR"),
            Self::Dpa => write!(f, "DPA"),
            Self::Dpb => write!(f, "DPB"),
            Self::Dpc => write!(f, "DPC"),
            Self::Idr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSequence"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "FillerData"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Unknown(id) => write!(f, "Unknown({})", id),
        }
    }
}

/// 识别一个 H.264 访问单元
///
/// 含 IDR 单元即为关键帧, 同时标记可能需要低延迟改写.
/// 非 Annex-B 数据返回全 false.
pub fn frame_info(data: &[u8]) -> FrameInfo {
    let has_idr = nal_units(data)
        .filter_map(|nalu| nalu.header_byte())
        .any(|header| NaluType::from_header(header) == NaluType::Idr);
    FrameInfo {
        is_key_frame: has_idr,
        may_need_rewrite: has_idr,
    }
}

/// 返回第一个指定类型的 NAL 单元 (含头部, 不含起始码)
pub fn first_nalu_of_type(data: &[u8], ty: NaluType) -> Option<&[u8]> {
    nal_units(data)
        .find(|nalu| nalu.header_byte().map(NaluType::from_header) == Some(ty))
        .map(|nalu| nalu.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annex_b(units: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        for unit in units {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            data.extend_from_slice(unit);
        }
        data
    }

    #[test]
    fn test_nalu_type_roundtrip() {
        for id in 0..32u8 {
            assert_eq!(NaluType::from_type_id(id).type_id(), id);
        }
        assert_eq!(NaluType::from_header(0x65), NaluType::Idr);
        assert_eq!(NaluType::from_header(0x67), NaluType::Sps);
        assert_eq!(NaluType::from_header(0x41), NaluType::Ndr);
        assert!(NaluType::Idr.is_vcl());
        assert!(!NaluType::Sps.is_vcl());
    }

    #[test]
    fn test_frame_info_idr() {
        let data = annex_b(&[&[0x09, 0xF0], &[0x67, 0x42], &[0x65, 0x88, 0x80]]);
        let info = frame_info(&data);
        assert!(info.is_key_frame, "含 IDR 应为关键帧");
        assert!(info.may_need_rewrite, "含 IDR 应标记可能改写");
    }

    #[test]
    fn test_frame_info_non_idr() {
        let data = annex_b(&[&[0x09, 0xF0], &[0x06, 0x05, 0x01], &[0x41, 0x9A, 0x02]]);
        let info = frame_info(&data);
        assert!(!info.is_key_frame, "仅 NDR/SEI/AUD 不应为关键帧");
        assert!(!info.may_need_rewrite);
    }

    #[test]
    fn test_frame_info_not_annex_b() {
        let info = frame_info(&[0x00, 0x00, 0x00, 0x05, 0x65, 0x88, 0x80, 0x40, 0x00]);
        assert_eq!(info, FrameInfo::default(), "长度前缀格式应返回全 false");
        assert_eq!(frame_info(&[]), FrameInfo::default());
    }

    #[test]
    fn test_first_nalu_of_type() {
        let data = annex_b(&[&[0x09, 0xF0], &[0x67, 0x42, 0xC0], &[0x68, 0xCE], &[0x67, 0x4D]]);
        assert_eq!(first_nalu_of_type(&data, NaluType::Sps), Some(&[0x67, 0x42, 0xC0][..]));
        assert_eq!(first_nalu_of_type(&data, NaluType::Pps), Some(&[0x68, 0xCE][..]));
        assert_eq!(first_nalu_of_type(&data, NaluType::Idr), None);
    }
}
