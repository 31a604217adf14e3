//! H.264 低延迟改写流水线集成测试.
//!
//! 用 BitWriter 逐字段构造 SPS, 验证 解析 → 改写 → 再解析 → 解码器配置 的完整链路.

use ying::codec::annexb::{nal_units, remove_emulation_prevention};
use ying::codec::parsers::h264::{self, NaluType};
use ying::codec::{CompressedVideo, create_decoder_config, get_frame_info, rewrite_for_low_latency};
use ying::core::{BitWriter, YingResult};

const PPS: [u8; 4] = [0x68, 0xEE, 0x3C, 0x80];
const IDR: [u8; 6] = [0x65, 0x88, 0x84, 0x00, 0x33, 0xFF];
const NON_IDR: [u8; 4] = [0x41, 0x9A, 0x02, 0x0C];

/// 构造 Main profile 640x360 SPS NAL (含 VUI, max_num_reorder_frames = 2)
///
/// num_units_in_tick = 1 使 NAL 中必然出现 emulation prevention 字节.
fn main_profile_sps() -> Vec<u8> {
    let mut buf = [0u8; 64];
    let mut bw = BitWriter::new(&mut buf);
    write_main_profile_sps(&mut bw).expect("SPS 构造失败");
    let len = bw.finish().expect("SPS 构造失败");
    buf[..len].to_vec()
}

fn write_main_profile_sps(bw: &mut BitWriter<'_>) -> YingResult<()> {
    bw.write_u8(0x67)?; // nal_ref_idc=3, nal_unit_type=7
    bw.write_u8(77)?; // profile_idc
    bw.write_u8(0x40)?; // constraint_set1
    bw.write_u8(31)?; // level_idc
    bw.write_ue(0)?; // seq_parameter_set_id
    bw.write_ue(0)?; // log2_max_frame_num_minus4
    bw.write_ue(0)?; // pic_order_cnt_type
    bw.write_ue(2)?; // log2_max_pic_order_cnt_lsb_minus4
    bw.write_ue(3)?; // max_num_ref_frames
    bw.write_flag(false)?; // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(39)?; // pic_width_in_mbs_minus1
    bw.write_ue(22)?; // pic_height_in_map_units_minus1
    bw.write_flag(true)?; // frame_mbs_only_flag
    bw.write_flag(true)?; // direct_8x8_inference_flag
    bw.write_flag(true)?; // frame_cropping_flag
    bw.write_ue(0)?;
    bw.write_ue(0)?;
    bw.write_ue(0)?;
    bw.write_ue(4)?; // frame_crop_bottom_offset
    bw.write_flag(true)?; // vui_parameters_present_flag

    bw.write_flag(false)?; // aspect_ratio_info_present_flag
    bw.write_flag(false)?; // overscan_info_present_flag
    bw.write_flag(false)?; // video_signal_type_present_flag
    bw.write_flag(false)?; // chroma_loc_info_present_flag
    bw.write_flag(true)?; // timing_info_present_flag
    bw.write_bits(1, 32)?; // num_units_in_tick
    bw.write_bits(50, 32)?; // time_scale
    bw.write_flag(true)?; // fixed_frame_rate_flag
    bw.write_flag(false)?; // nal_hrd_parameters_present_flag
    bw.write_flag(false)?; // vcl_hrd_parameters_present_flag
    bw.write_flag(false)?; // pic_struct_present_flag
    bw.write_flag(true)?; // bitstream_restriction_flag
    bw.write_flag(true)?; // motion_vectors_over_pic_boundaries_flag
    bw.write_ue(0)?; // max_bytes_per_pic_denom
    bw.write_ue(0)?; // max_bits_per_mb_denom
    bw.write_ue(15)?; // log2_max_mv_length_horizontal
    bw.write_ue(15)?; // log2_max_mv_length_vertical
    bw.write_ue(2)?; // max_num_reorder_frames
    bw.write_ue(3)?; // max_dec_frame_buffering

    bw.write_bit(1) // rbsp_stop_one_bit
}

/// 以 4 字节起始码拼接 NAL 单元, `short` 中的下标使用 3 字节起始码
fn annex_b(units: &[&[u8]], short: &[usize]) -> Vec<u8> {
    let mut data = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        if short.contains(&i) {
            data.extend_from_slice(&[0x00, 0x00, 0x01]);
        } else {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        }
        data.extend_from_slice(unit);
    }
    data
}

fn key_access_unit() -> Vec<u8> {
    let sps = main_profile_sps();
    annex_b(&[&[0x09, 0xF0], &sps, &PPS, &IDR], &[2])
}

#[test]
fn test_source_sps_fields() {
    let sps_nal = main_profile_sps();
    assert!(
        sps_nal.windows(3).any(|w| w == [0x00, 0x00, 0x03]),
        "构造的 SPS 应含 emulation prevention 字节"
    );
    assert_ne!(
        remove_emulation_prevention(&sps_nal).len(),
        sps_nal.len(),
        "移除后长度应变短"
    );

    let sps = h264::parse_sps(&key_access_unit())
        .expect("SPS 解析失败")
        .expect("应找到 SPS");
    assert_eq!(sps.profile_idc, 77);
    assert_eq!(sps.profile_name(), "Main");
    assert_eq!(sps.mime(), "avc1.4D401F");
    assert_eq!((sps.pic_width(), sps.pic_height()), (640, 368));
    let crop = sps.crop_rect();
    assert_eq!((crop.width, crop.height), (640, 360), "底部裁剪 8 行");
    assert_eq!(sps.fps(), Some(25.0));
    assert_eq!(
        sps.bitstream_restriction().map(|r| r.max_num_reorder_frames),
        Some(2)
    );
    assert!(!sps.is_low_latency(), "源码流允许重排");
}

#[test]
fn test_rewrite_full_pipeline() {
    let data = key_access_unit();
    let frame = CompressedVideo::new(1_000_000, "h264", data.clone());
    let info = get_frame_info(&frame).unwrap();
    assert!(info.is_key_frame, "含 IDR 应为关键帧");
    assert!(info.may_need_rewrite, "含 IDR 应标记可能需要改写");

    let out = rewrite_for_low_latency(&data).expect("应执行改写");
    let sps = h264::parse_sps(&out).unwrap().unwrap();
    assert!(sps.is_low_latency(), "改写后应为低延迟配置");
    let restriction = sps.bitstream_restriction().unwrap();
    assert_eq!(restriction.max_num_reorder_frames, 0);
    assert_eq!(restriction.max_dec_frame_buffering, 3);
    assert_eq!(restriction.log2_max_mv_length_horizontal, 15, "其余字段保持不变");
    assert_eq!(sps.fps(), Some(25.0), "时序信息应保留");
    assert_eq!(sps.crop_rect().height, 360, "裁剪应保留");

    // 非 SPS 单元逐字节保留, 包括 3 字节起始码
    let types: Vec<NaluType> = nal_units(&out)
        .filter_map(|u| u.header_byte().map(NaluType::from_header))
        .collect();
    assert_eq!(
        types,
        vec![NaluType::Aud, NaluType::Sps, NaluType::Pps, NaluType::Idr]
    );
    let pps_unit = nal_units(&out)
        .find(|u| u.header_byte() == Some(PPS[0]))
        .unwrap();
    assert_eq!(pps_unit.start_code_len, 3);
    assert_eq!(pps_unit.data, &PPS);
    assert!(out.ends_with(&IDR));

    // 改写后的帧仍可推导出相同的解码器配置
    let before = create_decoder_config(&frame).unwrap().unwrap();
    let rewritten = CompressedVideo::new(1_000_000, "h264", out.clone());
    let after = create_decoder_config(&rewritten).unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(after.codec, "avc1.4D401F");
    assert_eq!(after.coded_size(), Some((640, 368)));

    assert_eq!(rewrite_for_low_latency(&out), None, "二次改写应无需修改");
}

#[test]
fn test_delta_frame_untouched() {
    let data = annex_b(&[&[0x09, 0x30], &NON_IDR], &[]);
    let frame = CompressedVideo::new(0, "h264", data.clone());
    let info = get_frame_info(&frame).unwrap();
    assert!(!info.is_key_frame);
    assert!(!info.may_need_rewrite);
    assert_eq!(rewrite_for_low_latency(&data), None, "无 SPS 不改写");
    assert_eq!(create_decoder_config(&frame).unwrap(), None);
}

#[test]
fn test_repeated_sps_collapsed() {
    let sps = main_profile_sps();
    let data = annex_b(&[&sps, &PPS, &sps, &IDR], &[]);
    let out = rewrite_for_low_latency(&data).expect("应执行改写");
    let sps_count = nal_units(&out)
        .filter(|u| u.header_byte().map(NaluType::from_header) == Some(NaluType::Sps))
        .count();
    assert_eq!(sps_count, 1, "重复的 SPS 应被丢弃");
}
