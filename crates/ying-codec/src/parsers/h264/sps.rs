//! H.264 SPS (Sequence Parameter Set) 解析与序列化.
//!
//! SPS 包含编码视频序列的全局参数:
//! - Profile / Level 与 constraint_set 标志
//! - 色度格式与位深 (仅 High 系列 profile 携带)
//! - 图像尺寸 (宏块单位) 与裁剪矩形
//! - VUI 时序与缓冲参数 (见 [`super::vui`])
//!
//! 解析结果可以原样写回: `parse → write_to → parse` 得到逐字段相同的记录,
//! 这是低延迟改写 (见 [`super::rewrite`]) 的基础.

use bitflags::bitflags;
use ying_core::{BitReader, BitWriter, YingError, YingResult};

use super::nal::NaluType;
use super::vui::{BitstreamRestriction, VuiParameters};
use crate::annexb::remove_emulation_prevention;

/// 8x8 以下的 scaling list 数量
const SCALING_LISTS_4X4: usize = 6;

bitflags! {
    /// constraint_set0..5 标志, 按码流中的位置排列 (bit 7 为 set0)
    ///
    /// 低 2 位为 reserved_zero_2bits, 恒为 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConstraintFlags: u8 {
        /// constraint_set0_flag
        const SET0 = 0x80;
        /// constraint_set1_flag
        const SET1 = 0x40;
        /// constraint_set2_flag
        const SET2 = 0x20;
        /// constraint_set3_flag
        const SET3 = 0x10;
        /// constraint_set4_flag
        const SET4 = 0x08;
        /// constraint_set5_flag
        const SET5 = 0x04;
    }
}

/// 色度格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    /// 单色 (chroma_format_idc = 0)
    Monochrome,
    /// 4:2:0 (chroma_format_idc = 1)
    Yuv420,
    /// 4:2:2 (chroma_format_idc = 2)
    Yuv422,
    /// 4:4:4 (chroma_format_idc = 3)
    Yuv444 {
        /// separate_colour_plane_flag
        separate_colour_plane: bool,
    },
}

impl ChromaFormat {
    /// chroma_format_idc
    pub fn idc(&self) -> u32 {
        match self {
            Self::Monochrome => 0,
            Self::Yuv420 => 1,
            Self::Yuv422 => 2,
            Self::Yuv444 { .. } => 3,
        }
    }

    /// ChromaArrayType: 分离色彩平面时为 0, 否则等于 chroma_format_idc
    pub fn chroma_array_type(&self) -> u32 {
        match self {
            Self::Yuv444 {
                separate_colour_plane: true,
            } => 0,
            other => other.idc(),
        }
    }

    /// 色度下采样比例 (SubWidthC, SubHeightC)
    pub fn subsampling(&self) -> (u32, u32) {
        match self.chroma_array_type() {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        }
    }
}

/// 一个 scaling list 的码流表示
///
/// 保存原始的 delta_scale 序列 (读到 nextScale 为 0 即停止), 以便逐位写回.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingList {
    /// delta_scale 序列
    pub delta_scales: Vec<i32>,
}

impl ScalingList {
    fn parse(br: &mut BitReader, size: usize) -> YingResult<Self> {
        let mut delta_scales = Vec::new();
        let mut last_scale = 8i64;
        let mut next_scale = 8i64;
        for _ in 0..size {
            if next_scale != 0 {
                let delta = br.read_se()?;
                delta_scales.push(delta);
                next_scale = (last_scale + i64::from(delta) + 256).rem_euclid(256);
            }
            if next_scale != 0 {
                last_scale = next_scale;
            }
        }
        Ok(Self { delta_scales })
    }

    fn write(&self, bw: &mut BitWriter) -> YingResult<()> {
        for &delta in &self.delta_scales {
            bw.write_se(delta)?;
        }
        Ok(())
    }

    /// 是否使用默认矩阵 (首个 nextScale 为 0)
    pub fn uses_default_matrix(&self) -> bool {
        matches!(self.delta_scales.as_slice(), [first] if (8 + i64::from(*first) + 256).rem_euclid(256) == 0)
    }
}

/// 序列级量化矩阵: 8 组 (4:4:4 为 12 组), 未出现的列表为 None
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingMatrix {
    /// 各列表, 下标即 seq_scaling_list_present_flag 的下标
    pub lists: Vec<Option<ScalingList>>,
}

/// High 系列 profile 额外携带的色度与位深参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromaFormatInfo {
    /// 色度格式
    pub chroma_format: ChromaFormat,
    /// bit_depth_luma_minus8 (0-6)
    pub bit_depth_luma_minus8: u32,
    /// bit_depth_chroma_minus8 (0-6)
    pub bit_depth_chroma_minus8: u32,
    /// qpprime_y_zero_transform_bypass_flag
    pub qpprime_y_zero_transform_bypass_flag: bool,
    /// 量化矩阵 (seq_scaling_matrix_present_flag 为 1 时)
    pub scaling_matrix: Option<ScalingMatrix>,
}

/// 图像顺序计数 (POC) 参数, 按 pic_order_cnt_type 区分
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PicOrderCnt {
    /// pic_order_cnt_type = 0
    Type0 {
        /// log2_max_pic_order_cnt_lsb_minus4 (0-12)
        log2_max_pic_order_cnt_lsb_minus4: u32,
    },
    /// pic_order_cnt_type = 1
    Type1 {
        /// delta_pic_order_always_zero_flag
        delta_pic_order_always_zero_flag: bool,
        /// offset_for_non_ref_pic
        offset_for_non_ref_pic: i32,
        /// offset_for_top_to_bottom_field
        offset_for_top_to_bottom_field: i32,
        /// offset_for_ref_frame, 长度为 num_ref_frames_in_pic_order_cnt_cycle
        offset_for_ref_frame: Vec<i32>,
    },
    /// pic_order_cnt_type = 2
    Type2,
}

impl PicOrderCnt {
    /// pic_order_cnt_type
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Type0 { .. } => 0,
            Self::Type1 { .. } => 1,
            Self::Type2 => 2,
        }
    }
}

/// 帧/场编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMbs {
    /// frame_mbs_only_flag = 1
    FrameOnly,
    /// frame_mbs_only_flag = 0, 允许场编码
    FieldsAllowed {
        /// mb_adaptive_frame_field_flag
        mb_adaptive_frame_field_flag: bool,
    },
}

/// 裁剪偏移 (以色度采样单位计)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCropping {
    /// frame_crop_left_offset
    pub left: u32,
    /// frame_crop_right_offset
    pub right: u32,
    /// frame_crop_top_offset
    pub top: u32,
    /// frame_crop_bottom_offset
    pub bottom: u32,
}

/// 裁剪后的可见区域 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    /// 左上角 x
    pub x: u32,
    /// 左上角 y
    pub y: u32,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
}

/// SPS 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sps {
    /// nal_ref_idc (0-3)
    pub nal_ref_idc: u8,
    /// profile_idc (66=Baseline, 77=Main, 100=High, ...)
    pub profile_idc: u8,
    /// constraint_set 标志
    pub constraint_flags: ConstraintFlags,
    /// level_idc (30=3.0, 41=4.1, ...)
    pub level_idc: u8,
    /// seq_parameter_set_id (0-31)
    pub seq_parameter_set_id: u32,
    /// 色度与位深参数, Baseline/Main/Extended 不携带
    pub chroma_format_info: Option<ChromaFormatInfo>,
    /// log2_max_frame_num_minus4 (0-12)
    pub log2_max_frame_num_minus4: u32,
    /// POC 参数
    pub pic_order_cnt: PicOrderCnt,
    /// max_num_ref_frames
    pub max_num_ref_frames: u32,
    /// gaps_in_frame_num_value_allowed_flag
    pub gaps_in_frame_num_value_allowed_flag: bool,
    /// pic_width_in_mbs_minus1
    pub pic_width_in_mbs_minus1: u32,
    /// pic_height_in_map_units_minus1
    pub pic_height_in_map_units_minus1: u32,
    /// 帧/场编码方式
    pub frame_mbs: FrameMbs,
    /// direct_8x8_inference_flag
    pub direct_8x8_inference_flag: bool,
    /// 裁剪偏移 (frame_cropping_flag 为 1 时)
    pub frame_cropping: Option<FrameCropping>,
    /// VUI 参数 (vui_parameters_present_flag 为 1 时)
    pub vui: Option<VuiParameters>,
}

impl Sps {
    /// 从 SPS NAL 单元 (含 1 字节 NAL 头部, 不含起始码) 解析
    ///
    /// NAL 数据中的 emulation prevention 字节会先被移除.
    pub fn parse(nalu: &[u8]) -> YingResult<Self> {
        if nalu.len() < 4 {
            return Err(YingError::InvalidData("H.264: SPS NAL 单元太短".into()));
        }
        let rbsp = remove_emulation_prevention(nalu);
        let mut br = BitReader::new(&rbsp);

        // NAL 头部
        if br.read_flag()? {
            return Err(YingError::InvalidData(
                "H.264: NAL 头部 forbidden_zero_bit 非零".into(),
            ));
        }
        let nal_ref_idc = br.read_bits(2)? as u8;
        let nal_unit_type = br.read_bits(5)? as u8;
        if nal_unit_type != NaluType::Sps.type_id() {
            return Err(YingError::InvalidData(format!(
                "H.264: NAL 单元不是 SPS, nal_unit_type={}",
                nal_unit_type
            )));
        }

        let profile_idc = br.read_u8()?;
        if !is_known_profile(profile_idc) {
            return Err(YingError::InvalidData(format!(
                "H.264: profile_idc 无效, value={}",
                profile_idc
            )));
        }
        let constraint_flags = ConstraintFlags::from_bits_truncate((br.read_bits(6)? as u8) << 2);
        let reserved_zero_2bits = br.read_bits(2)?;
        if reserved_zero_2bits != 0 {
            return Err(YingError::InvalidData(format!(
                "H.264: reserved_zero_2bits 非零, value={}",
                reserved_zero_2bits
            )));
        }
        let level_idc = br.read_u8()?;

        let seq_parameter_set_id = br.read_ue()?;
        if seq_parameter_set_id > 31 {
            return Err(YingError::InvalidData(format!(
                "H.264: seq_parameter_set_id 超出范围, value={}",
                seq_parameter_set_id
            )));
        }

        let chroma_format_info = if has_chroma_format_info(profile_idc) {
            Some(parse_chroma_format_info(&mut br)?)
        } else {
            None
        };

        let log2_max_frame_num_minus4 = br.read_ue()?;
        if log2_max_frame_num_minus4 > 12 {
            return Err(YingError::InvalidData(format!(
                "H.264: log2_max_frame_num_minus4 超出范围, value={}",
                log2_max_frame_num_minus4
            )));
        }

        let pic_order_cnt = parse_pic_order_cnt(&mut br)?;

        let max_num_ref_frames = br.read_ue()?;
        if max_num_ref_frames > 16 {
            return Err(YingError::InvalidData(format!(
                "H.264: max_num_ref_frames 超出范围, value={}",
                max_num_ref_frames
            )));
        }
        let gaps_in_frame_num_value_allowed_flag = br.read_flag()?;
        let pic_width_in_mbs_minus1 = br.read_ue()?;
        let pic_height_in_map_units_minus1 = br.read_ue()?;

        let frame_mbs = if br.read_flag()? {
            FrameMbs::FrameOnly
        } else {
            FrameMbs::FieldsAllowed {
                mb_adaptive_frame_field_flag: br.read_flag()?,
            }
        };
        let direct_8x8_inference_flag = br.read_flag()?;

        let frame_cropping = if br.read_flag()? {
            Some(FrameCropping {
                left: br.read_ue()?,
                right: br.read_ue()?,
                top: br.read_ue()?,
                bottom: br.read_ue()?,
            })
        } else {
            None
        };

        let vui = if br.read_flag()? {
            Some(VuiParameters::parse(&mut br)?)
        } else {
            None
        };

        let sps = Self {
            nal_ref_idc,
            profile_idc,
            constraint_flags,
            level_idc,
            seq_parameter_set_id,
            chroma_format_info,
            log2_max_frame_num_minus4,
            pic_order_cnt,
            max_num_ref_frames,
            gaps_in_frame_num_value_allowed_flag,
            pic_width_in_mbs_minus1,
            pic_height_in_map_units_minus1,
            frame_mbs,
            direct_8x8_inference_flag,
            frame_cropping,
            vui,
        };
        sps.validate_dimensions()?;
        Ok(sps)
    }

    /// 将 SPS (含 NAL 头部与 rbsp_stop_one_bit) 写入比特流
    ///
    /// 调用方负责 `finish()`, 尾部对齐位为 0.
    pub fn write_to(&self, bw: &mut BitWriter) -> YingResult<()> {
        // NAL 头部
        bw.write_bit(0)?;
        bw.write_bits(u32::from(self.nal_ref_idc), 2)?;
        bw.write_bits(u32::from(NaluType::Sps.type_id()), 5)?;

        bw.write_u8(self.profile_idc)?;
        bw.write_bits(u32::from(self.constraint_flags.bits() >> 2), 6)?;
        bw.write_bits(0, 2)?; // reserved_zero_2bits
        bw.write_u8(self.level_idc)?;
        bw.write_ue(self.seq_parameter_set_id)?;

        if let Some(info) = &self.chroma_format_info {
            write_chroma_format_info(bw, info)?;
        }

        bw.write_ue(self.log2_max_frame_num_minus4)?;
        bw.write_ue(self.pic_order_cnt.type_id())?;
        match &self.pic_order_cnt {
            PicOrderCnt::Type0 {
                log2_max_pic_order_cnt_lsb_minus4,
            } => bw.write_ue(*log2_max_pic_order_cnt_lsb_minus4)?,
            PicOrderCnt::Type1 {
                delta_pic_order_always_zero_flag,
                offset_for_non_ref_pic,
                offset_for_top_to_bottom_field,
                offset_for_ref_frame,
            } => {
                bw.write_flag(*delta_pic_order_always_zero_flag)?;
                bw.write_se(*offset_for_non_ref_pic)?;
                bw.write_se(*offset_for_top_to_bottom_field)?;
                bw.write_ue(offset_for_ref_frame.len() as u32)?;
                for &offset in offset_for_ref_frame {
                    bw.write_se(offset)?;
                }
            }
            PicOrderCnt::Type2 => {}
        }

        bw.write_ue(self.max_num_ref_frames)?;
        bw.write_flag(self.gaps_in_frame_num_value_allowed_flag)?;
        bw.write_ue(self.pic_width_in_mbs_minus1)?;
        bw.write_ue(self.pic_height_in_map_units_minus1)?;
        match self.frame_mbs {
            FrameMbs::FrameOnly => bw.write_flag(true)?,
            FrameMbs::FieldsAllowed {
                mb_adaptive_frame_field_flag,
            } => {
                bw.write_flag(false)?;
                bw.write_flag(mb_adaptive_frame_field_flag)?;
            }
        }
        bw.write_flag(self.direct_8x8_inference_flag)?;

        bw.write_flag(self.frame_cropping.is_some())?;
        if let Some(crop) = &self.frame_cropping {
            bw.write_ue(crop.left)?;
            bw.write_ue(crop.right)?;
            bw.write_ue(crop.top)?;
            bw.write_ue(crop.bottom)?;
        }

        bw.write_flag(self.vui.is_some())?;
        if let Some(vui) = &self.vui {
            vui.write(bw)?;
        }

        // rbsp_stop_one_bit
        bw.write_bit(1)
    }

    /// 序列化为完整的 SPS NAL 单元 (不含起始码)
    pub fn to_nal_bytes(&self) -> YingResult<Vec<u8>> {
        let mut buf = vec![0u8; self.max_encoded_size()];
        let mut bw = BitWriter::new(&mut buf);
        self.write_to(&mut bw)?;
        let len = bw.finish()?;
        buf.truncate(len);
        Ok(buf)
    }

    /// 序列化后大小的上界
    fn max_encoded_size(&self) -> usize {
        let poc_offsets = match &self.pic_order_cnt {
            PicOrderCnt::Type1 {
                offset_for_ref_frame,
                ..
            } => offset_for_ref_frame.len(),
            _ => 0,
        };
        let scaling_deltas: usize = self
            .chroma_format_info
            .as_ref()
            .and_then(|info| info.scaling_matrix.as_ref())
            .map(|matrix| {
                matrix
                    .lists
                    .iter()
                    .flatten()
                    .map(|list| list.delta_scales.len())
                    .sum()
            })
            .unwrap_or(0);
        // 每个 Exp-Golomb 值最多 64 位, 再为 emulation prevention 预留一半
        (256 + (poc_offsets + scaling_deltas) * 8) * 3 / 2
    }

    fn validate_dimensions(&self) -> YingResult<()> {
        let overflow = || YingError::InvalidData("H.264: 计算图像尺寸时发生溢出".into());
        let width = self
            .pic_width_in_mbs_minus1
            .checked_add(1)
            .and_then(|v| v.checked_mul(16))
            .ok_or_else(overflow)?;
        let height = self
            .pic_height_in_map_units_minus1
            .checked_add(1)
            .and_then(|v| v.checked_mul(self.frame_height_factor()))
            .and_then(|v| v.checked_mul(16))
            .ok_or_else(overflow)?;

        if let Some(crop) = &self.frame_cropping {
            let (unit_x, unit_y) = self.crop_units();
            let crop_x = crop
                .left
                .checked_add(crop.right)
                .and_then(|v| v.checked_mul(unit_x))
                .ok_or_else(overflow)?;
            let crop_y = crop
                .top
                .checked_add(crop.bottom)
                .and_then(|v| v.checked_mul(unit_y))
                .ok_or_else(overflow)?;
            if crop_x >= width || crop_y >= height {
                return Err(YingError::InvalidData(format!(
                    "H.264: 裁剪参数非法, raw={}x{}, crop_x={}, crop_y={}",
                    width, height, crop_x, crop_y
                )));
            }
        }
        Ok(())
    }

    // ============================================================
    // 派生值
    // ============================================================

    /// MaxFrameNum = 2^(log2_max_frame_num_minus4 + 4)
    pub fn max_frame_num(&self) -> u32 {
        1u32.checked_shl(self.log2_max_frame_num_minus4.saturating_add(4))
            .unwrap_or(u32::MAX)
    }

    /// MaxPicOrderCntLsb (仅 POC type 0)
    pub fn max_pic_order_cnt_lsb(&self) -> Option<u32> {
        match self.pic_order_cnt {
            PicOrderCnt::Type0 {
                log2_max_pic_order_cnt_lsb_minus4,
            } => Some(
                1u32.checked_shl(log2_max_pic_order_cnt_lsb_minus4.saturating_add(4))
                    .unwrap_or(u32::MAX),
            ),
            _ => None,
        }
    }

    /// frame_mbs_only_flag
    pub fn frame_mbs_only(&self) -> bool {
        matches!(self.frame_mbs, FrameMbs::FrameOnly)
    }

    fn frame_height_factor(&self) -> u32 {
        if self.frame_mbs_only() { 1 } else { 2 }
    }

    /// 解码图像宽度 (像素, 未裁剪)
    ///
    /// 字段未经 `parse` 校验时饱和到 `u32::MAX`.
    pub fn pic_width(&self) -> u32 {
        self.pic_width_in_mbs_minus1
            .saturating_add(1)
            .saturating_mul(16)
    }

    /// 解码图像高度 (像素, 未裁剪), 场编码时纵向加倍
    pub fn pic_height(&self) -> u32 {
        self.pic_height_in_map_units_minus1
            .saturating_add(1)
            .saturating_mul(self.frame_height_factor())
            .saturating_mul(16)
    }

    /// 色度格式, 未携带时默认 4:2:0
    pub fn chroma_format(&self) -> ChromaFormat {
        self.chroma_format_info
            .as_ref()
            .map_or(ChromaFormat::Yuv420, |info| info.chroma_format)
    }

    /// ChromaArrayType
    pub fn chroma_array_type(&self) -> u32 {
        self.chroma_format().chroma_array_type()
    }

    /// 亮度位深
    pub fn bit_depth_luma(&self) -> u32 {
        self.chroma_format_info
            .as_ref()
            .map_or(8, |info| info.bit_depth_luma_minus8 + 8)
    }

    /// 裁剪单位 (CropUnitX, CropUnitY)
    fn crop_units(&self) -> (u32, u32) {
        let (sub_width, sub_height) = self.chroma_format().subsampling();
        (sub_width, sub_height.saturating_mul(self.frame_height_factor()))
    }

    /// 裁剪后的可见区域
    pub fn crop_rect(&self) -> CropRect {
        let width = self.pic_width();
        let height = self.pic_height();
        match &self.frame_cropping {
            None => CropRect {
                x: 0,
                y: 0,
                width,
                height,
            },
            Some(crop) => {
                let (unit_x, unit_y) = self.crop_units();
                let crop_x = crop.left.saturating_add(crop.right).saturating_mul(unit_x);
                let crop_y = crop.top.saturating_add(crop.bottom).saturating_mul(unit_y);
                // 裁剪超出图像时宽高归零
                CropRect {
                    x: crop.left.saturating_mul(unit_x),
                    y: crop.top.saturating_mul(unit_y),
                    width: width.saturating_sub(crop_x),
                    height: height.saturating_sub(crop_y),
                }
            }
        }
    }

    /// 像素宽高比 (宽, 高)
    pub fn sample_aspect_ratio(&self) -> Option<(u32, u32)> {
        self.vui
            .as_ref()
            .and_then(|vui| vui.aspect_ratio)
            .and_then(|ar| ar.sar())
    }

    /// 帧率 (VUI timing_info 存在时)
    pub fn fps(&self) -> Option<f64> {
        self.vui
            .as_ref()
            .and_then(|vui| vui.timing_info)
            .and_then(|timing| timing.fps())
    }

    /// 码流限制参数
    pub fn bitstream_restriction(&self) -> Option<&BitstreamRestriction> {
        self.vui
            .as_ref()
            .and_then(|vui| vui.bitstream_restriction.as_ref())
    }

    /// profile 兼容性字节 (constraint_set0..5 位于 bit 7..2)
    pub fn profile_compatibility(&self) -> u8 {
        self.constraint_flags.bits()
    }

    /// codec 字符串, 形如 `avc1.42C01E`
    pub fn mime(&self) -> String {
        format!(
            "avc1.{:02X}{:02X}{:02X}",
            self.profile_idc,
            self.profile_compatibility(),
            self.level_idc
        )
    }

    /// profile 名称
    pub fn profile_name(&self) -> &'static str {
        match self.profile_idc {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            244 => "High 4:4:4 Predictive",
            44 => "CAVLC 4:4:4 Intra",
            83 => "Scalable Baseline",
            86 => "Scalable High",
            118 => "Multiview High",
            128 => "Stereo High",
            138 | 139 => "Multiview Depth High",
            134 => "MFC High",
            _ => "Unknown",
        }
    }

    // ============================================================
    // 低延迟
    // ============================================================

    /// 是否已处于低延迟配置
    ///
    /// 要求存在码流限制参数, 且 `max_num_reorder_frames == 0`,
    /// `max_dec_frame_buffering == max_num_ref_frames`.
    pub fn is_low_latency(&self) -> bool {
        self.bitstream_restriction().is_some_and(|r| {
            r.max_num_reorder_frames == 0 && r.max_dec_frame_buffering == self.max_num_ref_frames
        })
    }

    /// 修改为低延迟配置
    ///
    /// 缺失的 VUI 语法组保持缺失 (写出时标志为 0), 缺失的码流限制参数使用
    /// [`BitstreamRestriction::with_defaults`].
    pub fn apply_low_latency(&mut self) {
        let max_num_ref_frames = self.max_num_ref_frames;
        let restriction = self
            .vui
            .get_or_insert_with(VuiParameters::default)
            .bitstream_restriction
            .get_or_insert_with(|| BitstreamRestriction::with_defaults(max_num_ref_frames));
        restriction.max_num_reorder_frames = 0;
        restriction.max_dec_frame_buffering = max_num_ref_frames;
    }
}

// ============================================================
// 辅助函数
// ============================================================

/// 是否为已知 profile
fn is_known_profile(profile_idc: u8) -> bool {
    matches!(profile_idc, 66 | 77 | 88) || has_chroma_format_info(profile_idc)
}

/// 该 profile 是否携带 chroma_format_idc 等字段
fn has_chroma_format_info(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

fn parse_chroma_format_info(br: &mut BitReader) -> YingResult<ChromaFormatInfo> {
    let chroma_format_idc = br.read_ue()?;
    let chroma_format = match chroma_format_idc {
        0 => ChromaFormat::Monochrome,
        1 => ChromaFormat::Yuv420,
        2 => ChromaFormat::Yuv422,
        3 => ChromaFormat::Yuv444 {
            separate_colour_plane: br.read_flag()?,
        },
        _ => {
            return Err(YingError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={}",
                chroma_format_idc
            )));
        }
    };

    let bit_depth_luma_minus8 = br.read_ue()?;
    if bit_depth_luma_minus8 > 6 {
        return Err(YingError::InvalidData(format!(
            "H.264: bit_depth_luma_minus8 超出范围, value={}",
            bit_depth_luma_minus8
        )));
    }
    let bit_depth_chroma_minus8 = br.read_ue()?;
    if bit_depth_chroma_minus8 > 6 {
        return Err(YingError::InvalidData(format!(
            "H.264: bit_depth_chroma_minus8 超出范围, value={}",
            bit_depth_chroma_minus8
        )));
    }
    let qpprime_y_zero_transform_bypass_flag = br.read_flag()?;

    let scaling_matrix = if br.read_flag()? {
        let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
        let mut lists = Vec::with_capacity(list_count);
        for idx in 0..list_count {
            let list = if br.read_flag()? {
                let size = if idx < SCALING_LISTS_4X4 { 16 } else { 64 };
                Some(ScalingList::parse(br, size)?)
            } else {
                None
            };
            lists.push(list);
        }
        Some(ScalingMatrix { lists })
    } else {
        None
    };

    Ok(ChromaFormatInfo {
        chroma_format,
        bit_depth_luma_minus8,
        bit_depth_chroma_minus8,
        qpprime_y_zero_transform_bypass_flag,
        scaling_matrix,
    })
}

fn write_chroma_format_info(bw: &mut BitWriter, info: &ChromaFormatInfo) -> YingResult<()> {
    bw.write_ue(info.chroma_format.idc())?;
    if let ChromaFormat::Yuv444 {
        separate_colour_plane,
    } = info.chroma_format
    {
        bw.write_flag(separate_colour_plane)?;
    }
    bw.write_ue(info.bit_depth_luma_minus8)?;
    bw.write_ue(info.bit_depth_chroma_minus8)?;
    bw.write_flag(info.qpprime_y_zero_transform_bypass_flag)?;

    bw.write_flag(info.scaling_matrix.is_some())?;
    if let Some(matrix) = &info.scaling_matrix {
        for list in &matrix.lists {
            bw.write_flag(list.is_some())?;
            if let Some(list) = list {
                list.write(bw)?;
            }
        }
    }
    Ok(())
}

fn parse_pic_order_cnt(br: &mut BitReader) -> YingResult<PicOrderCnt> {
    let pic_order_cnt_type = br.read_ue()?;
    match pic_order_cnt_type {
        0 => {
            let log2_max_pic_order_cnt_lsb_minus4 = br.read_ue()?;
            if log2_max_pic_order_cnt_lsb_minus4 > 12 {
                return Err(YingError::InvalidData(format!(
                    "H.264: log2_max_pic_order_cnt_lsb_minus4 超出范围, value={}",
                    log2_max_pic_order_cnt_lsb_minus4
                )));
            }
            Ok(PicOrderCnt::Type0 {
                log2_max_pic_order_cnt_lsb_minus4,
            })
        }
        1 => {
            let delta_pic_order_always_zero_flag = br.read_flag()?;
            let offset_for_non_ref_pic = br.read_se()?;
            let offset_for_top_to_bottom_field = br.read_se()?;
            let num_ref_frames_in_cycle = br.read_ue()?;
            if num_ref_frames_in_cycle > 255 {
                return Err(YingError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={}",
                    num_ref_frames_in_cycle
                )));
            }
            let offset_for_ref_frame = (0..num_ref_frames_in_cycle)
                .map(|_| br.read_se())
                .collect::<YingResult<Vec<_>>>()?;
            Ok(PicOrderCnt::Type1 {
                delta_pic_order_always_zero_flag,
                offset_for_non_ref_pic,
                offset_for_top_to_bottom_field,
                offset_for_ref_frame,
            })
        }
        2 => Ok(PicOrderCnt::Type2),
        _ => Err(YingError::InvalidData(format!(
            "H.264: pic_order_cnt_type 非法, value={}",
            pic_order_cnt_type
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parsers::h264::vui::{AspectRatio, TimingInfo};

    /// 构造一个 Baseline SPS 记录, 供各测试修改
    pub(crate) fn baseline_sps() -> Sps {
        Sps {
            nal_ref_idc: 3,
            profile_idc: 66,
            constraint_flags: ConstraintFlags::SET0 | ConstraintFlags::SET1,
            level_idc: 30,
            seq_parameter_set_id: 0,
            chroma_format_info: None,
            log2_max_frame_num_minus4: 0,
            pic_order_cnt: PicOrderCnt::Type2,
            max_num_ref_frames: 1,
            gaps_in_frame_num_value_allowed_flag: false,
            pic_width_in_mbs_minus1: 19,
            pic_height_in_map_units_minus1: 14,
            frame_mbs: FrameMbs::FrameOnly,
            direct_8x8_inference_flag: true,
            frame_cropping: None,
            vui: None,
        }
    }

    /// 构造一个带裁剪与 VUI 的 1920x1080 High SPS
    pub(crate) fn high_1080p_sps() -> Sps {
        Sps {
            profile_idc: 100,
            constraint_flags: ConstraintFlags::empty(),
            level_idc: 40,
            chroma_format_info: Some(ChromaFormatInfo {
                chroma_format: ChromaFormat::Yuv420,
                bit_depth_luma_minus8: 0,
                bit_depth_chroma_minus8: 0,
                qpprime_y_zero_transform_bypass_flag: false,
                scaling_matrix: None,
            }),
            pic_order_cnt: PicOrderCnt::Type0 {
                log2_max_pic_order_cnt_lsb_minus4: 2,
            },
            max_num_ref_frames: 4,
            pic_width_in_mbs_minus1: 119,
            pic_height_in_map_units_minus1: 67,
            frame_cropping: Some(FrameCropping {
                left: 0,
                right: 0,
                top: 0,
                bottom: 4,
            }),
            vui: Some(VuiParameters {
                aspect_ratio: Some(AspectRatio::Predefined(1)),
                timing_info: Some(TimingInfo {
                    num_units_in_tick: 1001,
                    time_scale: 60000,
                    fixed_frame_rate_flag: false,
                }),
                ..VuiParameters::default()
            }),
            ..baseline_sps()
        }
    }

    fn roundtrip(sps: &Sps) -> Sps {
        let bytes = sps.to_nal_bytes().expect("SPS 序列化失败");
        Sps::parse(&bytes).expect("SPS 重新解析失败")
    }

    #[test]
    fn test_parse_known_bytes() {
        let sps = baseline_sps();
        let bytes = sps.to_nal_bytes().unwrap();
        assert_eq!(bytes[0], 0x67, "NAL 头部应为 0x67");
        assert_eq!(&bytes[1..4], &[0x42, 0xC0, 0x1E]);

        let parsed = Sps::parse(&bytes).unwrap();
        assert_eq!(parsed.profile_idc, 66);
        assert_eq!(parsed.pic_width(), 320);
        assert_eq!(parsed.pic_height(), 240);
        assert_eq!(parsed.max_frame_num(), 16);
        assert_eq!(parsed.chroma_format(), ChromaFormat::Yuv420, "默认 4:2:0");
    }

    #[test]
    fn test_roundtrip_baseline() {
        let sps = baseline_sps();
        assert_eq!(roundtrip(&sps), sps);
    }

    #[test]
    fn test_roundtrip_high_with_vui() {
        let sps = high_1080p_sps();
        assert_eq!(roundtrip(&sps), sps);
    }

    #[test]
    fn test_roundtrip_poc_type1_and_fields() {
        let sps = Sps {
            pic_order_cnt: PicOrderCnt::Type1 {
                delta_pic_order_always_zero_flag: false,
                offset_for_non_ref_pic: -2,
                offset_for_top_to_bottom_field: 1,
                offset_for_ref_frame: vec![0, 3, -7],
            },
            frame_mbs: FrameMbs::FieldsAllowed {
                mb_adaptive_frame_field_flag: true,
            },
            ..baseline_sps()
        };
        let parsed = roundtrip(&sps);
        assert_eq!(parsed, sps);
        assert_eq!(parsed.pic_height(), 480, "场编码高度应加倍");
    }

    #[test]
    fn test_roundtrip_scaling_matrix_444() {
        let mut lists = vec![None; 12];
        lists[0] = Some(ScalingList {
            delta_scales: vec![-8],
        });
        lists[6] = Some(ScalingList {
            delta_scales: vec![0; 64],
        });
        lists[9] = Some(ScalingList {
            delta_scales: vec![2, 3, -5, -8],
        });
        let sps = Sps {
            profile_idc: 244,
            chroma_format_info: Some(ChromaFormatInfo {
                chroma_format: ChromaFormat::Yuv444 {
                    separate_colour_plane: false,
                },
                bit_depth_luma_minus8: 2,
                bit_depth_chroma_minus8: 2,
                qpprime_y_zero_transform_bypass_flag: true,
                scaling_matrix: Some(ScalingMatrix { lists }),
            }),
            ..baseline_sps()
        };
        let parsed = roundtrip(&sps);
        assert_eq!(parsed, sps);
        let matrix = parsed
            .chroma_format_info
            .and_then(|info| info.scaling_matrix)
            .unwrap();
        assert!(matrix.lists[0].as_ref().unwrap().uses_default_matrix());
        assert!(!matrix.lists[6].as_ref().unwrap().uses_default_matrix());
    }

    #[test]
    fn test_crop_rect_1080p() {
        let sps = high_1080p_sps();
        assert_eq!(sps.pic_width(), 1920);
        assert_eq!(sps.pic_height(), 1088);
        assert_eq!(
            sps.crop_rect(),
            CropRect {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            }
        );
    }

    #[test]
    fn test_crop_rect_422() {
        let sps = Sps {
            profile_idc: 122,
            chroma_format_info: Some(ChromaFormatInfo {
                chroma_format: ChromaFormat::Yuv422,
                bit_depth_luma_minus8: 0,
                bit_depth_chroma_minus8: 0,
                qpprime_y_zero_transform_bypass_flag: false,
                scaling_matrix: None,
            }),
            frame_cropping: Some(FrameCropping {
                left: 1,
                right: 1,
                top: 2,
                bottom: 2,
            }),
            ..baseline_sps()
        };
        let rect = sps.crop_rect();
        assert_eq!((rect.x, rect.y), (2, 2), "4:2:2 横向裁剪单位为 2, 纵向为 1");
        assert_eq!((rect.width, rect.height), (316, 236));
    }

    #[test]
    fn test_derived_sizes_saturate() {
        // 直接构造的记录未经 parse 校验
        let sps = Sps {
            log2_max_frame_num_minus4: 40,
            pic_width_in_mbs_minus1: u32::MAX,
            pic_height_in_map_units_minus1: u32::MAX / 4,
            frame_mbs: FrameMbs::FieldsAllowed {
                mb_adaptive_frame_field_flag: false,
            },
            frame_cropping: Some(FrameCropping {
                left: u32::MAX,
                right: 1,
                top: 0,
                bottom: u32::MAX,
            }),
            ..baseline_sps()
        };
        assert_eq!(sps.max_frame_num(), u32::MAX);
        assert_eq!(sps.pic_width(), u32::MAX);
        assert_eq!(sps.pic_height(), u32::MAX);

        let rect = sps.crop_rect();
        assert_eq!(rect.x, u32::MAX);
        assert_eq!((rect.width, rect.height), (0, 0), "越界裁剪应归零而非溢出");
    }

    #[test]
    fn test_mime() {
        let sps = baseline_sps();
        assert_eq!(sps.mime(), "avc1.42C01E");
        assert_eq!(high_1080p_sps().mime(), "avc1.640028");

        let sps = Sps {
            constraint_flags: ConstraintFlags::SET5,
            ..baseline_sps()
        };
        assert_eq!(sps.profile_compatibility(), 0x04);
    }

    #[test]
    fn test_derived_values() {
        let sps = high_1080p_sps();
        assert_eq!(sps.max_pic_order_cnt_lsb(), Some(64));
        assert_eq!(sps.sample_aspect_ratio(), Some((1, 1)));
        let fps = sps.fps().unwrap();
        assert!((fps - 29.97).abs() < 0.01, "fps={fps}");
        assert_eq!(sps.profile_name(), "High");
        assert_eq!(sps.bit_depth_luma(), 8);
    }

    #[test]
    fn test_reject_not_sps() {
        let mut bytes = baseline_sps().to_nal_bytes().unwrap();
        bytes[0] = 0x68;
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("nal_unit_type"), "err={err}");
    }

    #[test]
    fn test_reject_forbidden_bit() {
        let mut bytes = baseline_sps().to_nal_bytes().unwrap();
        bytes[0] |= 0x80;
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("forbidden_zero_bit"), "err={err}");
    }

    #[test]
    fn test_reject_unknown_profile() {
        let mut bytes = baseline_sps().to_nal_bytes().unwrap();
        bytes[1] = 99;
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("profile_idc"), "err={err}");
    }

    #[test]
    fn test_reject_reserved_bits() {
        let mut bytes = baseline_sps().to_nal_bytes().unwrap();
        bytes[2] |= 0x01;
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("reserved_zero_2bits"), "err={err}");
    }

    #[test]
    fn test_reject_sps_id_out_of_range() {
        let sps = Sps {
            seq_parameter_set_id: 32,
            ..baseline_sps()
        };
        let bytes = sps.to_nal_bytes().unwrap();
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("seq_parameter_set_id"), "err={err}");
    }

    #[test]
    fn test_reject_bit_depth_out_of_range() {
        let sps = Sps {
            profile_idc: 110,
            chroma_format_info: Some(ChromaFormatInfo {
                chroma_format: ChromaFormat::Yuv420,
                bit_depth_luma_minus8: 7,
                bit_depth_chroma_minus8: 0,
                qpprime_y_zero_transform_bypass_flag: false,
                scaling_matrix: None,
            }),
            ..baseline_sps()
        };
        let bytes = sps.to_nal_bytes().unwrap();
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("bit_depth_luma_minus8"), "err={err}");
    }

    #[test]
    fn test_reject_invalid_crop() {
        let sps = Sps {
            frame_cropping: Some(FrameCropping {
                left: 100,
                right: 100,
                top: 0,
                bottom: 0,
            }),
            ..baseline_sps()
        };
        let bytes = sps.to_nal_bytes().unwrap();
        let err = Sps::parse(&bytes).unwrap_err();
        assert!(err.to_string().contains("裁剪"), "err={err}");
    }

    #[test]
    fn test_reject_truncated() {
        let bytes = high_1080p_sps().to_nal_bytes().unwrap();
        assert!(Sps::parse(&bytes[..6]).is_err(), "截断的 SPS 应失败");
        assert!(Sps::parse(&bytes[..2]).is_err());
    }

    #[test]
    fn test_low_latency_apply() {
        let mut sps = high_1080p_sps();
        assert!(!sps.is_low_latency());
        sps.apply_low_latency();
        assert!(sps.is_low_latency());

        let restriction = sps.bitstream_restriction().unwrap();
        assert_eq!(restriction.max_num_reorder_frames, 0);
        assert_eq!(restriction.max_dec_frame_buffering, 4);
        assert_eq!(restriction.max_bytes_per_pic_denom, 2, "缺失字段使用默认值");

        let parsed = roundtrip(&sps);
        assert!(parsed.is_low_latency());
        assert_eq!(parsed.fps(), sps.fps(), "原有 VUI 字段应保留");
    }
}
