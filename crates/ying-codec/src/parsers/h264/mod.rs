//! H.264 / AVC 码流解析.
//!
//! - [`nal`]: NAL 单元类型, 关键帧识别
//! - [`sps`]: SPS 解析与序列化
//! - [`vui`]: VUI / HRD 参数
//! - [`rewrite`]: 低延迟改写

pub mod nal;
pub mod rewrite;
pub mod sps;
pub mod vui;

pub use nal::{NaluType, first_nalu_of_type, frame_info};
pub use rewrite::rewrite_for_low_latency;
pub use sps::{CropRect, Sps};

use ying_core::YingResult;

use crate::decoder_config::DecoderConfig;

/// 解析访问单元中的第一个 SPS
///
/// 不含 SPS 时返回 `Ok(None)`, SPS 非法时返回错误.
pub fn parse_sps(data: &[u8]) -> YingResult<Option<Sps>> {
    first_nalu_of_type(data, NaluType::Sps)
        .map(Sps::parse)
        .transpose()
}

/// 由 SPS 推导解码器配置
///
/// 像素宽高比不为 1:1 时附带显示宽高.
pub fn decoder_config_from_sps(sps: &Sps) -> DecoderConfig {
    let width = sps.pic_width();
    let height = sps.pic_height();
    let mut config = DecoderConfig::new(sps.mime()).with_coded_size(width, height);

    let non_square = sps
        .sample_aspect_ratio()
        .filter(|&(sar_width, sar_height)| sar_width > 1 || sar_height > 1);
    if let Some((sar_width, sar_height)) = non_square {
        let display_width =
            (f64::from(width) * f64::from(sar_width) / f64::from(sar_height)).round() as u32;
        config.display_aspect_width = Some(display_width);
        config.display_aspect_height = Some(height);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h264::sps::tests::{baseline_sps, high_1080p_sps};
    use crate::parsers::h264::vui::{AspectRatio, VuiParameters};

    fn with_start_code(nalu: &[u8]) -> Vec<u8> {
        let mut data = vec![0x00, 0x00, 0x00, 0x01];
        data.extend_from_slice(nalu);
        data
    }

    #[test]
    fn test_parse_sps_from_access_unit() {
        let mut data = vec![0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];
        data.extend(with_start_code(&baseline_sps().to_nal_bytes().unwrap()));
        let sps = parse_sps(&data).unwrap().expect("应找到 SPS");
        assert_eq!(sps, baseline_sps());
    }

    #[test]
    fn test_parse_sps_absent() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80];
        assert_eq!(parse_sps(&data), Ok(None));
    }

    #[test]
    fn test_decoder_config_square_pixels() {
        let config = decoder_config_from_sps(&high_1080p_sps());
        assert_eq!(config.codec, "avc1.640028");
        assert_eq!(config.coded_width, Some(1920));
        assert_eq!(config.coded_height, Some(1088));
        assert_eq!(config.display_aspect_width, None, "1:1 像素不设置显示宽高");
    }

    #[test]
    fn test_decoder_config_anamorphic() {
        // 720x480, SAR 10:11
        let sps = Sps {
            pic_width_in_mbs_minus1: 44,
            pic_height_in_map_units_minus1: 29,
            vui: Some(VuiParameters {
                aspect_ratio: Some(AspectRatio::Predefined(3)),
                ..VuiParameters::default()
            }),
            ..baseline_sps()
        };
        let config = decoder_config_from_sps(&sps);
        assert_eq!(config.display_aspect_width, Some(655));
        assert_eq!(config.display_aspect_height, Some(480));
    }
}
