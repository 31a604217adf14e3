//! 工作线程消息协议.
//!
//! 入站: [`WorkerCommand`] (调用方) 与解码原语回调, 统一为 [`WorkerInput`].
//! 出站: [`WorkerEvent`]. 帧以所有权转移的方式发出, 不复制.

use ying_codec::{CompressedVideo, DecoderConfig, FrameInfo};

use crate::error::DecodeError;

/// 调用方命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    /// 更新播放头 (纳秒, 与帧时间戳同一时基)
    SetPlayheadTimeNanos(i64),
    /// 排队解码一帧
    QueueDecode {
        /// 压缩帧
        frame: CompressedVideo,
        /// 帧分类结果
        info: FrameInfo,
    },
    /// 设置输出帧的目标宽度
    SetResizeWidth(u32),
    /// seek 前重置
    ResetForSeek,
    /// 关闭, 释放全部资源
    Close,
}

/// 调度器输入
#[derive(Debug)]
pub enum WorkerInput<F> {
    /// 调用方命令
    Command(WorkerCommand),
    /// 解码原语输出
    Output(F),
    /// 解码原语异步错误
    DecoderError(DecodeError),
}

/// 占位帧: 尚无可显示的解码帧时发出的空白图像尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderFrame {
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
}

/// 调度器事件
#[derive(Debug)]
pub enum WorkerEvent<F> {
    /// 新的待显示帧
    Frame(F),
    /// 没有可显示的帧
    NoFrame(PlaceholderFrame),
    /// 解码器配置已生效
    Configured(DecoderConfig),
    /// 显示帧落后播放头的时间 (毫秒)
    Delay {
        /// 落后毫秒数
        millis: i64,
    },
    /// 调试信息
    Debug(String),
    /// 警告
    Warn(String),
    /// 致命错误, 当前流的解码已终止
    Error(DecodeError),
    /// 非致命错误, 播放继续
    NonBlockingError(String),
}

impl<F> WorkerEvent<F> {
    /// 事件名称, 用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame",
            Self::NoFrame(_) => "noFrame",
            Self::Configured(_) => "configured",
            Self::Delay { .. } => "delay",
            Self::Debug(_) => "debug",
            Self::Warn(_) => "warn",
            Self::Error(_) => "error",
            Self::NonBlockingError(_) => "nonBlockingError",
        }
    }
}
