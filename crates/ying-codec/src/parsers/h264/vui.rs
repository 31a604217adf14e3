//! H.264 VUI (Video Usability Information) 与 HRD 参数.
//!
//! 每个条件出现的语法组建模为 `Option<..>`, 对应的 `*_present_flag` 由 `is_some()` 推出,
//! 因此不存在 "标志为 1 但字段缺失" 的状态.

use ying_core::{BitReader, BitWriter, YingError, YingResult};

/// 预定义的 SAR 表 (ITU-T H.264 表 E-1), 下标为 aspect_ratio_idc
const SAR_TABLE: [(u32, u32); 17] = [
    (0, 1),    // 0: 未指定
    (1, 1),    // 1: 1:1
    (12, 11),  // 2: 12:11
    (10, 11),  // 3: 10:11
    (16, 11),  // 4: 16:11
    (40, 33),  // 5: 40:33
    (24, 11),  // 6: 24:11
    (20, 11),  // 7: 20:11
    (32, 11),  // 8: 32:11
    (80, 33),  // 9: 80:33
    (18, 11),  // 10: 18:11
    (15, 11),  // 11: 15:11
    (64, 33),  // 12: 64:33
    (160, 99), // 13: 160:99
    (4, 3),    // 14: 4:3
    (3, 2),    // 15: 3:2
    (2, 1),    // 16: 2:1
];

/// aspect_ratio_idc 中表示显式 SAR 的取值
const EXTENDED_SAR: u8 = 255;

/// HRD 中 cpb_cnt_minus1 的上限
const MAX_CPB_CNT_MINUS1: u32 = 31;

/// 像素宽高比信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    /// 表 E-1 中的预定义值 (不含 255)
    Predefined(u8),
    /// Extended_SAR, 显式给出宽高
    Extended {
        /// sar_width
        sar_width: u16,
        /// sar_height
        sar_height: u16,
    },
}

impl AspectRatio {
    /// aspect_ratio_idc
    pub fn idc(&self) -> u8 {
        match self {
            Self::Predefined(idc) => *idc,
            Self::Extended { .. } => EXTENDED_SAR,
        }
    }

    /// SAR (宽, 高), 未指定或保留值返回 None
    pub fn sar(&self) -> Option<(u32, u32)> {
        match *self {
            Self::Predefined(idc) => SAR_TABLE
                .get(idc as usize)
                .copied()
                .filter(|&(w, h)| w > 0 && h > 0),
            Self::Extended {
                sar_width,
                sar_height,
            } if sar_width > 0 && sar_height > 0 => {
                Some((u32::from(sar_width), u32::from(sar_height)))
            }
            Self::Extended { .. } => None,
        }
    }
}

/// 色彩描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourDescription {
    /// colour_primaries
    pub colour_primaries: u8,
    /// transfer_characteristics
    pub transfer_characteristics: u8,
    /// matrix_coefficients
    pub matrix_coefficients: u8,
}

/// 视频信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSignalType {
    /// video_format (3 bits)
    pub video_format: u8,
    /// video_full_range_flag
    pub video_full_range_flag: bool,
    /// 色彩描述
    pub colour_description: Option<ColourDescription>,
}

/// 色度采样位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaLocInfo {
    /// chroma_sample_loc_type_top_field
    pub top_field: u32,
    /// chroma_sample_loc_type_bottom_field
    pub bottom_field: u32,
}

/// 时序信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInfo {
    /// num_units_in_tick
    pub num_units_in_tick: u32,
    /// time_scale
    pub time_scale: u32,
    /// fixed_frame_rate_flag
    pub fixed_frame_rate_flag: bool,
}

impl TimingInfo {
    /// 帧率: `time_scale / (2 * num_units_in_tick)`
    pub fn fps(&self) -> Option<f64> {
        if self.num_units_in_tick == 0 || self.time_scale == 0 {
            return None;
        }
        Some(f64::from(self.time_scale) / (2.0 * f64::from(self.num_units_in_tick)))
    }
}

/// 单个 CPB 的码率与缓冲区规格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpbSpec {
    /// bit_rate_value_minus1
    pub bit_rate_value_minus1: u32,
    /// cpb_size_value_minus1
    pub cpb_size_value_minus1: u32,
    /// cbr_flag
    pub cbr_flag: bool,
}

/// HRD (Hypothetical Reference Decoder) 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrdParameters {
    /// bit_rate_scale (4 bits)
    pub bit_rate_scale: u8,
    /// cpb_size_scale (4 bits)
    pub cpb_size_scale: u8,
    /// 每个 CPB 的规格, 长度为 cpb_cnt_minus1 + 1
    pub cpb_specs: Vec<CpbSpec>,
    /// initial_cpb_removal_delay_length_minus1 (5 bits)
    pub initial_cpb_removal_delay_length_minus1: u8,
    /// cpb_removal_delay_length_minus1 (5 bits)
    pub cpb_removal_delay_length_minus1: u8,
    /// dpb_output_delay_length_minus1 (5 bits)
    pub dpb_output_delay_length_minus1: u8,
    /// time_offset_length (5 bits)
    pub time_offset_length: u8,
}

impl HrdParameters {
    fn parse(br: &mut BitReader) -> YingResult<Self> {
        let cpb_cnt_minus1 = br.read_ue()?;
        if cpb_cnt_minus1 > MAX_CPB_CNT_MINUS1 {
            return Err(YingError::InvalidData(format!(
                "H.264: HRD cpb_cnt_minus1 超出范围, value={}",
                cpb_cnt_minus1
            )));
        }
        let bit_rate_scale = br.read_bits(4)? as u8;
        let cpb_size_scale = br.read_bits(4)? as u8;

        let mut cpb_specs = Vec::with_capacity(cpb_cnt_minus1 as usize + 1);
        for _ in 0..=cpb_cnt_minus1 {
            cpb_specs.push(CpbSpec {
                bit_rate_value_minus1: br.read_ue()?,
                cpb_size_value_minus1: br.read_ue()?,
                cbr_flag: br.read_flag()?,
            });
        }

        Ok(Self {
            bit_rate_scale,
            cpb_size_scale,
            cpb_specs,
            initial_cpb_removal_delay_length_minus1: br.read_bits(5)? as u8,
            cpb_removal_delay_length_minus1: br.read_bits(5)? as u8,
            dpb_output_delay_length_minus1: br.read_bits(5)? as u8,
            time_offset_length: br.read_bits(5)? as u8,
        })
    }

    fn write(&self, bw: &mut BitWriter) -> YingResult<()> {
        let cpb_cnt_minus1 = self
            .cpb_specs
            .len()
            .checked_sub(1)
            .ok_or_else(|| YingError::InvalidArgument("H.264: HRD 至少需要一个 CPB".into()))?;
        bw.write_ue(cpb_cnt_minus1 as u32)?;
        bw.write_bits(u32::from(self.bit_rate_scale), 4)?;
        bw.write_bits(u32::from(self.cpb_size_scale), 4)?;
        for spec in &self.cpb_specs {
            bw.write_ue(spec.bit_rate_value_minus1)?;
            bw.write_ue(spec.cpb_size_value_minus1)?;
            bw.write_flag(spec.cbr_flag)?;
        }
        bw.write_bits(u32::from(self.initial_cpb_removal_delay_length_minus1), 5)?;
        bw.write_bits(u32::from(self.cpb_removal_delay_length_minus1), 5)?;
        bw.write_bits(u32::from(self.dpb_output_delay_length_minus1), 5)?;
        bw.write_bits(u32::from(self.time_offset_length), 5)
    }
}

/// 码流限制参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitstreamRestriction {
    /// motion_vectors_over_pic_boundaries_flag
    pub motion_vectors_over_pic_boundaries_flag: bool,
    /// max_bytes_per_pic_denom
    pub max_bytes_per_pic_denom: u32,
    /// max_bits_per_mb_denom
    pub max_bits_per_mb_denom: u32,
    /// log2_max_mv_length_horizontal
    pub log2_max_mv_length_horizontal: u32,
    /// log2_max_mv_length_vertical
    pub log2_max_mv_length_vertical: u32,
    /// max_num_reorder_frames
    pub max_num_reorder_frames: u32,
    /// max_dec_frame_buffering
    pub max_dec_frame_buffering: u32,
}

impl BitstreamRestriction {
    /// 源码流未携带码流限制时写出的默认值
    ///
    /// motion_vectors_over_pic_boundaries_flag=1, max_bytes_per_pic_denom=2,
    /// max_bits_per_mb_denom=1, log2_max_mv_length_*=16, max_num_reorder_frames=0,
    /// max_dec_frame_buffering=max_num_ref_frames.
    pub fn with_defaults(max_num_ref_frames: u32) -> Self {
        Self {
            motion_vectors_over_pic_boundaries_flag: true,
            max_bytes_per_pic_denom: 2,
            max_bits_per_mb_denom: 1,
            log2_max_mv_length_horizontal: 16,
            log2_max_mv_length_vertical: 16,
            max_num_reorder_frames: 0,
            max_dec_frame_buffering: max_num_ref_frames,
        }
    }
}

/// VUI 参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VuiParameters {
    /// 像素宽高比
    pub aspect_ratio: Option<AspectRatio>,
    /// overscan_appropriate_flag (overscan_info_present_flag 为 1 时)
    pub overscan_appropriate: Option<bool>,
    /// 视频信号类型
    pub video_signal_type: Option<VideoSignalType>,
    /// 色度采样位置
    pub chroma_loc_info: Option<ChromaLocInfo>,
    /// 时序信息
    pub timing_info: Option<TimingInfo>,
    /// NAL HRD 参数
    pub nal_hrd: Option<HrdParameters>,
    /// VCL HRD 参数
    pub vcl_hrd: Option<HrdParameters>,
    /// low_delay_hrd_flag, 仅在任一 HRD 存在时编码
    pub low_delay_hrd_flag: bool,
    /// pic_struct_present_flag
    pub pic_struct_present_flag: bool,
    /// 码流限制参数
    pub bitstream_restriction: Option<BitstreamRestriction>,
}

impl VuiParameters {
    /// 是否存在任一 HRD 参数块
    pub fn has_hrd(&self) -> bool {
        self.nal_hrd.is_some() || self.vcl_hrd.is_some()
    }

    pub(crate) fn parse(br: &mut BitReader) -> YingResult<Self> {
        let mut vui = Self::default();

        if br.read_flag()? {
            let idc = br.read_u8()?;
            vui.aspect_ratio = Some(if idc == EXTENDED_SAR {
                AspectRatio::Extended {
                    sar_width: br.read_bits(16)? as u16,
                    sar_height: br.read_bits(16)? as u16,
                }
            } else {
                AspectRatio::Predefined(idc)
            });
        }

        if br.read_flag()? {
            vui.overscan_appropriate = Some(br.read_flag()?);
        }

        if br.read_flag()? {
            let video_format = br.read_bits(3)? as u8;
            let video_full_range_flag = br.read_flag()?;
            let colour_description = if br.read_flag()? {
                Some(ColourDescription {
                    colour_primaries: br.read_u8()?,
                    transfer_characteristics: br.read_u8()?,
                    matrix_coefficients: br.read_u8()?,
                })
            } else {
                None
            };
            vui.video_signal_type = Some(VideoSignalType {
                video_format,
                video_full_range_flag,
                colour_description,
            });
        }

        if br.read_flag()? {
            vui.chroma_loc_info = Some(ChromaLocInfo {
                top_field: br.read_ue()?,
                bottom_field: br.read_ue()?,
            });
        }

        if br.read_flag()? {
            vui.timing_info = Some(TimingInfo {
                num_units_in_tick: br.read_bits(32)?,
                time_scale: br.read_bits(32)?,
                fixed_frame_rate_flag: br.read_flag()?,
            });
        }

        if br.read_flag()? {
            vui.nal_hrd = Some(HrdParameters::parse(br)?);
        }
        if br.read_flag()? {
            vui.vcl_hrd = Some(HrdParameters::parse(br)?);
        }
        if vui.has_hrd() {
            vui.low_delay_hrd_flag = br.read_flag()?;
        }

        vui.pic_struct_present_flag = br.read_flag()?;

        if br.read_flag()? {
            vui.bitstream_restriction = Some(BitstreamRestriction {
                motion_vectors_over_pic_boundaries_flag: br.read_flag()?,
                max_bytes_per_pic_denom: br.read_ue()?,
                max_bits_per_mb_denom: br.read_ue()?,
                log2_max_mv_length_horizontal: br.read_ue()?,
                log2_max_mv_length_vertical: br.read_ue()?,
                max_num_reorder_frames: br.read_ue()?,
                max_dec_frame_buffering: br.read_ue()?,
            });
        }

        Ok(vui)
    }

    pub(crate) fn write(&self, bw: &mut BitWriter) -> YingResult<()> {
        bw.write_flag(self.aspect_ratio.is_some())?;
        if let Some(aspect_ratio) = self.aspect_ratio {
            bw.write_u8(aspect_ratio.idc())?;
            if let AspectRatio::Extended {
                sar_width,
                sar_height,
            } = aspect_ratio
            {
                bw.write_bits(u32::from(sar_width), 16)?;
                bw.write_bits(u32::from(sar_height), 16)?;
            }
        }

        bw.write_flag(self.overscan_appropriate.is_some())?;
        if let Some(appropriate) = self.overscan_appropriate {
            bw.write_flag(appropriate)?;
        }

        bw.write_flag(self.video_signal_type.is_some())?;
        if let Some(signal) = &self.video_signal_type {
            bw.write_bits(u32::from(signal.video_format), 3)?;
            bw.write_flag(signal.video_full_range_flag)?;
            bw.write_flag(signal.colour_description.is_some())?;
            if let Some(colour) = &signal.colour_description {
                bw.write_u8(colour.colour_primaries)?;
                bw.write_u8(colour.transfer_characteristics)?;
                bw.write_u8(colour.matrix_coefficients)?;
            }
        }

        bw.write_flag(self.chroma_loc_info.is_some())?;
        if let Some(loc) = &self.chroma_loc_info {
            bw.write_ue(loc.top_field)?;
            bw.write_ue(loc.bottom_field)?;
        }

        bw.write_flag(self.timing_info.is_some())?;
        if let Some(timing) = &self.timing_info {
            bw.write_bits(timing.num_units_in_tick, 32)?;
            bw.write_bits(timing.time_scale, 32)?;
            bw.write_flag(timing.fixed_frame_rate_flag)?;
        }

        bw.write_flag(self.nal_hrd.is_some())?;
        if let Some(hrd) = &self.nal_hrd {
            hrd.write(bw)?;
        }
        bw.write_flag(self.vcl_hrd.is_some())?;
        if let Some(hrd) = &self.vcl_hrd {
            hrd.write(bw)?;
        }
        if self.has_hrd() {
            bw.write_flag(self.low_delay_hrd_flag)?;
        }

        bw.write_flag(self.pic_struct_present_flag)?;

        bw.write_flag(self.bitstream_restriction.is_some())?;
        if let Some(restriction) = &self.bitstream_restriction {
            bw.write_flag(restriction.motion_vectors_over_pic_boundaries_flag)?;
            bw.write_ue(restriction.max_bytes_per_pic_denom)?;
            bw.write_ue(restriction.max_bits_per_mb_denom)?;
            bw.write_ue(restriction.log2_max_mv_length_horizontal)?;
            bw.write_ue(restriction.log2_max_mv_length_vertical)?;
            bw.write_ue(restriction.max_num_reorder_frames)?;
            bw.write_ue(restriction.max_dec_frame_buffering)?;
        }

        Ok(())
    }
}
