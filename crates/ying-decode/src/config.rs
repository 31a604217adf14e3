//! 调度器配置.

use serde::{Deserialize, Serialize};
use ying_codec::HardwareAcceleration;

/// 调度器配置
///
/// 所有字段都有默认值, JSON 中可只给出需要覆盖的字段.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 在途帧数上限 (首个输出到达前使用, 之后使用学习值, 不超过该值)
    pub max_queue_size: usize,
    /// 是否限制在途帧数
    pub limit_queue_size: bool,
    /// 配置解码器时设置 `optimize_for_latency`
    pub optimize_for_latency: bool,
    /// 硬件加速偏好, `no-preference` 时保留解码器配置中的原值
    pub hardware_acceleration: HardwareAcceleration,
    /// 两次 tick 之间的最短间隔 (毫秒)
    pub tick_interval_ms: u64,
    /// 未配置时占位帧的宽度
    pub placeholder_width: u32,
    /// 未配置时占位帧的高度
    pub placeholder_height: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 30,
            limit_queue_size: true,
            optimize_for_latency: true,
            hardware_acceleration: HardwareAcceleration::NoPreference,
            tick_interval_ms: 16,
            placeholder_width: 32,
            placeholder_height: 32,
        }
    }
}

impl SchedulerConfig {
    /// 从 JSON 字符串解析
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
