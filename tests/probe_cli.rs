//! 基本流探测集成测试.
//!
//! 输入写入临时目录, 经由 `ying::probe` 完成探测与改写.

use std::fs;

use ying::codec::VideoCodec;
use ying::codec::parsers::h264;
use ying::probe::{codec_from_path, probe_file, rewrite_file};

/// Baseline 320x240 SPS (无 VUI) + PPS + IDR
fn h264_key_unit() -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x01];
    // profile 66, constraint 0xC0, level 30, sps_id 0, frame_num 0, poc type 2,
    // ref 1, 20x15 宏块, frame_mbs_only, direct_8x8, 无裁剪, 无 VUI
    data.extend_from_slice(&[0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x05, 0x07, 0xE4]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80]);
    data.extend_from_slice(&[0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21]);
    data
}

#[test]
fn test_probe_h264_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("clip.h264");
    fs::write(&input, h264_key_unit()).unwrap();

    let report = probe_file(&input, None).unwrap();
    assert_eq!(report.codec, VideoCodec::H264, "应按扩展名推断格式");
    assert!(report.annex_b);
    assert!(report.frame_info.is_key_frame);
    assert!(report.frame_info.may_need_rewrite);

    let names: Vec<&str> = report
        .nal_units
        .iter()
        .map(|u| u.type_name.as_str())
        .collect();
    assert_eq!(names, ["SPS", "PPS", "IDR"]);
    assert_eq!(report.nal_units[2].offset, 20, "3 字节起始码的偏移");

    let sps = report.sps.as_ref().expect("应输出 SPS 摘要");
    assert_eq!(sps.codec, "avc1.42C01E");
    assert_eq!((sps.width, sps.height), (320, 240));
    assert!(!sps.low_latency);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["codec"], "h264");
    assert_eq!(json["frame_info"]["isKeyFrame"], true);
    assert_eq!(json["decoder_config"]["codec"], "avc1.42C01E");
    assert_eq!(json["decoder_config"]["codedWidth"], 320);
}

#[test]
fn test_rewrite_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.264");
    let output = dir.path().join("out.264");
    fs::write(&input, h264_key_unit()).unwrap();

    assert!(rewrite_file(&input, &output).unwrap(), "无 VUI 的 SPS 需要改写");
    let rewritten = fs::read(&output).unwrap();
    let sps = h264::parse_sps(&rewritten).unwrap().unwrap();
    assert!(sps.is_low_latency());

    // 对改写结果再次改写: 原样复制
    let copy = dir.path().join("copy.264");
    assert!(!rewrite_file(&output, &copy).unwrap());
    assert_eq!(fs::read(&copy).unwrap(), rewritten);
}

#[test]
fn test_probe_errors() {
    let dir = tempfile::tempdir().unwrap();

    let unknown = dir.path().join("clip.bin");
    fs::write(&unknown, [0x82u8, 0x49]).unwrap();
    assert!(probe_file(&unknown, None).is_err(), "无法推断格式");
    let report = probe_file(&unknown, Some(VideoCodec::Vp9)).unwrap();
    assert!(report.frame_info.is_key_frame, "显式指定格式后可探测");

    let empty = dir.path().join("empty.av1");
    fs::write(&empty, b"").unwrap();
    assert!(probe_file(&empty, None).is_err(), "空文件应报错");

    let missing = dir.path().join("missing.h264");
    let err = probe_file(&missing, None).unwrap_err();
    assert!(format!("{err:#}").contains("missing.h264"), "错误应包含路径");

    assert_eq!(codec_from_path(&dir.path().join("a.hevc")), Some(VideoCodec::H265));
}
