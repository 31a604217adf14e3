//! 解码调度错误类型.

use thiserror::Error;
use ying_core::YingError;

/// 调度器错误
///
/// 除 [`DecodeError::Resize`] 外均为致命错误: 解码原语被关闭, 调度状态被重置.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// 解码原语拒绝配置
    #[error("配置解码器失败: {0}")]
    Configure(String),

    /// 解码原语解码失败
    #[error("解码失败: {0}")]
    Decode(String),

    /// 配置期间解码原语报错, 当前平台不支持该编码
    #[error("当前平台不支持该编码 ({0})")]
    UnsupportedCodec(String),

    /// 关键帧无法推导解码器配置
    #[error("关键帧不含可用于配置解码器的参数集 (H.264 关键帧须携带 SPS)")]
    MissingDecoderConfig,

    /// 码流解析错误
    #[error("码流解析失败: {0}")]
    Codec(#[from] YingError),

    /// 输出帧缩放失败
    #[error("缩放输出帧失败: {0}")]
    Resize(String),

    /// 解码线程无法启动
    #[error("启动解码线程失败: {0}")]
    Spawn(String),

    /// 解码线程已退出
    #[error("解码线程已关闭")]
    WorkerClosed,
}
