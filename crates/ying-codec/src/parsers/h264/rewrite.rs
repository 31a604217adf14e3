//! H.264 低延迟改写.
//!
//! 将访问单元中第一个 SPS 改为 `max_num_reorder_frames = 0`,
//! `max_dec_frame_buffering = max_num_ref_frames`, 使解码器无需缓存重排帧即可输出.
//! 其余 NAL 单元连同起始码逐字节复制, 后续重复的 SPS 被丢弃.

use log::{debug, warn};
use ying_core::{BitWriter, YingError, YingResult};

use super::nal::{NaluType, first_nalu_of_type};
use super::sps::Sps;
use crate::annexb::nal_units;

/// 为改写后的 SPS 预留的额外空间 (字节)
const REWRITE_SLACK: usize = 64;

/// 改写访问单元以降低解码延迟
///
/// 返回 `None` 表示无需改写: 数据不是 Annex-B, 不含 SPS, SPS 已是低延迟配置,
/// 或改写过程中出错 (出错时记录 warn 日志, 不影响原数据).
pub fn rewrite_for_low_latency(data: &[u8]) -> Option<Vec<u8>> {
    let sps_nalu = first_nalu_of_type(data, NaluType::Sps)?;
    let mut sps = match Sps::parse(sps_nalu) {
        Ok(sps) => sps,
        Err(err) => {
            warn!("H.264: 低延迟改写跳过, SPS 解析失败: {}", err);
            return None;
        }
    };
    if sps.is_low_latency() {
        debug!("H.264: SPS 已是低延迟配置, 无需改写");
        return None;
    }
    sps.apply_low_latency();

    match write_rewritten(data, &sps) {
        Ok(out) => Some(out),
        Err(err) => {
            warn!("H.264: 低延迟改写失败: {}", err);
            None
        }
    }
}

fn write_rewritten(data: &[u8], sps: &Sps) -> YingResult<Vec<u8>> {
    let mut out = vec![0u8; data.len() + REWRITE_SLACK];
    let mut pos = 0usize;
    let mut sps_written = false;

    for nalu in nal_units(data) {
        let is_sps = nalu.header_byte().map(NaluType::from_header) == Some(NaluType::Sps);
        if !is_sps {
            let unit = &data[nalu.offset..nalu.end()];
            let dst = out
                .get_mut(pos..pos + unit.len())
                .ok_or(YingError::OutOfSpace)?;
            dst.copy_from_slice(unit);
            pos += unit.len();
            continue;
        }
        if sps_written {
            continue;
        }

        let start_code = &data[nalu.offset..nalu.offset + nalu.start_code_len];
        let dst = out
            .get_mut(pos..pos + start_code.len())
            .ok_or(YingError::OutOfSpace)?;
        dst.copy_from_slice(start_code);
        pos += start_code.len();

        let mut bw = BitWriter::new(&mut out[pos..]);
        sps.write_to(&mut bw)?;
        pos += bw.finish()?;
        sps_written = true;
    }

    out.truncate(pos);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h264::parse_sps;
    use crate::parsers::h264::sps::tests::{baseline_sps, high_1080p_sps};

    fn access_unit(sps: &Sps, extra_sps: bool) -> Vec<u8> {
        let sps_bytes = sps.to_nal_bytes().unwrap();
        let mut data = vec![0x00, 0x00, 0x00, 0x01];
        data.extend_from_slice(&sps_bytes);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80]);
        if extra_sps {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            data.extend_from_slice(&sps_bytes);
        }
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, 0xA0]);
        data
    }

    #[test]
    fn test_rewrite_sets_low_latency() {
        let data = access_unit(&high_1080p_sps(), false);
        let out = rewrite_for_low_latency(&data).expect("应执行改写");

        let sps = parse_sps(&out).unwrap().unwrap();
        assert!(sps.is_low_latency());
        assert_eq!(sps.pic_width(), 1920);
        assert!(out.ends_with(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, 0xA0]), "IDR 应原样保留");
        assert!(
            out.windows(7).any(|w| w == [0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80]),
            "3 字节起始码的 PPS 应原样保留"
        );
    }

    #[test]
    fn test_rewrite_idempotent() {
        let data = access_unit(&baseline_sps(), false);
        let out = rewrite_for_low_latency(&data).expect("首次改写应生效");
        assert_eq!(rewrite_for_low_latency(&out), None, "二次改写应无需修改");
    }

    #[test]
    fn test_rewrite_drops_duplicate_sps() {
        let data = access_unit(&baseline_sps(), true);
        let out = rewrite_for_low_latency(&data).unwrap();
        let sps_count = nal_units(&out)
            .filter(|nalu| nalu.header_byte().map(NaluType::from_header) == Some(NaluType::Sps))
            .count();
        assert_eq!(sps_count, 1, "仅保留一个改写后的 SPS");
    }

    #[test]
    fn test_rewrite_without_sps() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21];
        assert_eq!(rewrite_for_low_latency(&data), None);
        assert_eq!(rewrite_for_low_latency(&[0x65, 0x88]), None);
    }

    #[test]
    fn test_rewrite_invalid_sps_skipped() {
        // profile_idc = 99 无效
        let data = [0x00, 0x00, 0x00, 0x01, 0x67, 0x63, 0x00, 0x1E, 0xAB, 0x40];
        assert_eq!(rewrite_for_low_latency(&data), None, "解析失败应跳过改写");
    }
}
