//! 基本流探测.
//!
//! 把整个文件视为一个访问单元, 汇总起始码分帧、NAL 单元、帧分类、
//! 解码器配置与 H.264 SPS 摘要. `ying-probe` 命令行工具以 JSON 输出探测结果.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;

use ying_codec::annexb::{is_annex_b, nal_units};
use ying_codec::parsers::{h264, h265};
use ying_codec::{
    CompressedVideo, DecoderConfig, FrameInfo, VideoCodec, create_decoder_config,
    get_frame_info_for, rewrite_for_low_latency,
};
use ying_core::YingResult;

// ============================================================
// 探测结果
// ============================================================

/// 完整探测结果
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub codec: VideoCodec,
    pub size: usize,
    pub annex_b: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nal_units: Vec<NalUnitInfo>,
    pub frame_info: FrameInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder_config: Option<DecoderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sps: Option<SpsSummary>,
}

/// NAL 单元信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NalUnitInfo {
    pub offset: usize,
    pub type_id: u8,
    pub type_name: String,
    /// NAL 数据长度 (不含起始码)
    pub size: usize,
}

/// H.264 SPS 摘要
#[derive(Debug, Clone, Serialize)]
pub struct SpsSummary {
    pub codec: String,
    pub profile: &'static str,
    pub profile_idc: u8,
    pub level_idc: u8,
    pub seq_parameter_set_id: u32,
    pub coded_width: u32,
    pub coded_height: u32,
    pub width: u32,
    pub height: u32,
    pub chroma_format_idc: u32,
    pub bit_depth: u32,
    pub frame_mbs_only: bool,
    pub max_num_ref_frames: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num_reorder_frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    pub low_latency: bool,
}

impl SpsSummary {
    fn from_sps(sps: &h264::Sps) -> Self {
        let crop = sps.crop_rect();
        Self {
            codec: sps.mime(),
            profile: sps.profile_name(),
            profile_idc: sps.profile_idc,
            level_idc: sps.level_idc,
            seq_parameter_set_id: sps.seq_parameter_set_id,
            coded_width: sps.pic_width(),
            coded_height: sps.pic_height(),
            width: crop.width,
            height: crop.height,
            chroma_format_idc: sps.chroma_format().idc(),
            bit_depth: sps.bit_depth_luma(),
            frame_mbs_only: sps.frame_mbs_only(),
            max_num_ref_frames: sps.max_num_ref_frames,
            max_num_reorder_frames: sps.bitstream_restriction().map(|r| r.max_num_reorder_frames),
            sample_aspect_ratio: sps.sample_aspect_ratio().map(|(w, h)| format!("{w}:{h}")),
            fps: sps.fps(),
            low_latency: sps.is_low_latency(),
        }
    }
}

// ============================================================
// 探测
// ============================================================

/// 按文件扩展名推断编码格式
pub fn codec_from_path(path: &Path) -> Option<VideoCodec> {
    let ext = path.extension()?.to_str()?;
    match ext.to_ascii_lowercase().as_str() {
        "264" | "h264" | "avc" | "jsv" => Some(VideoCodec::H264),
        "265" | "h265" | "hevc" => Some(VideoCodec::H265),
        "vp9" => Some(VideoCodec::Vp9),
        "av1" | "obu" => Some(VideoCodec::Av1),
        _ => None,
    }
}

/// 探测一个访问单元
pub fn probe_bytes(codec: VideoCodec, data: &[u8]) -> YingResult<ProbeReport> {
    let frame = CompressedVideo::new(0, codec.name(), data.to_vec());
    let frame_info = get_frame_info_for(Some(codec), data)?;
    let decoder_config = create_decoder_config(&frame)?;

    let nal_units = if codec.uses_annex_b() {
        collect_nal_units(codec, data)
    } else {
        Vec::new()
    };

    let sps = match codec {
        VideoCodec::H264 => h264::parse_sps(data)?.as_ref().map(SpsSummary::from_sps),
        _ => None,
    };

    Ok(ProbeReport {
        codec,
        size: data.len(),
        annex_b: is_annex_b(data),
        nal_units,
        frame_info,
        decoder_config,
        sps,
    })
}

fn collect_nal_units(codec: VideoCodec, data: &[u8]) -> Vec<NalUnitInfo> {
    nal_units(data)
        .filter_map(|unit| {
            let header = unit.header_byte()?;
            let (type_id, type_name) = match codec {
                VideoCodec::H265 => {
                    let ty = h265::nal_unit_type(header);
                    (ty, h265::nal_type_name(ty).to_string())
                }
                _ => {
                    let ty = h264::NaluType::from_header(header);
                    (ty.type_id(), ty.to_string())
                }
            };
            Some(NalUnitInfo {
                offset: unit.offset,
                type_id,
                type_name,
                size: unit.data.len(),
            })
        })
        .collect()
}

/// 探测文件, `codec` 为空时按扩展名推断
pub fn probe_file(path: &Path, codec: Option<VideoCodec>) -> Result<ProbeReport> {
    let codec = match codec.or_else(|| codec_from_path(path)) {
        Some(c) => c,
        None => bail!("无法推断编码格式, 请使用 --codec 指定: {}", path.display()),
    };
    let data =
        std::fs::read(path).with_context(|| format!("读取输入文件失败: {}", path.display()))?;
    if data.is_empty() {
        bail!("输入文件为空: {}", path.display());
    }
    probe_bytes(codec, &data).with_context(|| format!("探测失败: {}", path.display()))
}

/// 对 H.264 文件做低延迟改写并写出, 返回是否实际发生改写
///
/// 不需要改写时原样复制输入.
pub fn rewrite_file(input: &Path, output: &Path) -> Result<bool> {
    let data =
        std::fs::read(input).with_context(|| format!("读取输入文件失败: {}", input.display()))?;
    let rewritten = rewrite_for_low_latency(&data);
    let changed = rewritten.is_some();
    let bytes = rewritten.unwrap_or(data);
    std::fs::write(output, &bytes)
        .with_context(|| format!("写出改写结果失败: {}", output.display()))?;
    Ok(changed)
}
