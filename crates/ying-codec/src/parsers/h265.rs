//! H.265/HEVC 关键帧识别.
//!
//! HEVC NAL 头部为 2 字节, nal_unit_type 位于首字节的 bit 6..1:
//! ```text
//! forbidden(1) | nal_unit_type(6) | nuh_layer_id(6) | nuh_temporal_id_plus1(3)
//! ```
//! 仅做类型判别, 不解析参数集.

use crate::annexb::nal_units;

/// BLA_W_LP, IRAP 区间起点
pub const BLA_W_LP: u8 = 16;
/// RSV_IRAP_VCL23, IRAP 区间终点
pub const RSV_IRAP_VCL23: u8 = 23;

/// 从 NAL 头部首字节提取 nal_unit_type
pub fn nal_unit_type(header: u8) -> u8 {
    (header & 0x7E) >> 1
}

/// 是否为 IRAP (BLA/IDR/CRA 及保留的 IRAP 类型)
pub fn is_irap(nal_unit_type: u8) -> bool {
    (BLA_W_LP..=RSV_IRAP_VCL23).contains(&nal_unit_type)
}

/// NAL 类型名称
pub fn nal_type_name(nal_unit_type: u8) -> &'static str {
    match nal_unit_type {
        0 => "TRAIL_N",
        1 => "TRAIL_R",
        2..=9 => "VCL",
        16 => "BLA_W_LP",
        17 => "BLA_W_RADL",
        18 => "BLA_N_LP",
        19 => "IDR_W_RADL",
        20 => "IDR_N_LP",
        21 => "CRA_NUT",
        22 | 23 => "RSV_IRAP",
        32 => "VPS",
        33 => "SPS",
        34 => "PPS",
        35 => "AUD",
        36 => "EOS",
        37 => "EOB",
        38 => "FD",
        39 => "PREFIX_SEI",
        40 => "SUFFIX_SEI",
        _ => "Unknown",
    }
}

/// 访问单元是否含 IRAP NAL 单元
///
/// 非 Annex-B 数据返回 false.
pub fn is_keyframe(data: &[u8]) -> bool {
    nal_units(data)
        .filter_map(|nalu| nalu.header_byte())
        .any(|header| is_irap(nal_unit_type(header)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 2 字节 HEVC NAL 头部
    fn header(nal_type: u8) -> [u8; 2] {
        [nal_type << 1, 0x01]
    }

    fn access_unit(types: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        for &ty in types {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            data.extend_from_slice(&header(ty));
            data.extend_from_slice(&[0xAF, 0x12]);
        }
        data
    }

    #[test]
    fn test_nal_unit_type() {
        assert_eq!(nal_unit_type(0x40), 32, "VPS");
        assert_eq!(nal_unit_type(0x26), 19, "IDR_W_RADL");
        assert_eq!(nal_unit_type(0x02), 1, "TRAIL_R");
    }

    #[test]
    fn test_irap_range() {
        for ty in 0..64u8 {
            assert_eq!(is_irap(ty), (16..=23).contains(&ty), "type={ty}");
        }
    }

    #[test]
    fn test_is_keyframe() {
        assert!(is_keyframe(&access_unit(&[32, 33, 34, 19])), "IDR_W_RADL 应为关键帧");
        assert!(is_keyframe(&access_unit(&[35, 21])), "CRA 应为关键帧");
        assert!(!is_keyframe(&access_unit(&[35, 1, 1])), "TRAIL_R 不是关键帧");
        assert!(!is_keyframe(&[0x26, 0x01, 0xAF]), "非 Annex-B 返回 false");
    }

    #[test]
    fn test_nal_type_name() {
        assert_eq!(nal_type_name(19), "IDR_W_RADL");
        assert_eq!(nal_type_name(33), "SPS");
        assert_eq!(nal_type_name(60), "Unknown");
    }
}
