//! 统一错误类型定义.
//!
//! 码流层 (读写器、扫描器、头部解析器) 共用的错误类型.

use thiserror::Error;

/// Ying 码流层统一错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YingError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的语法或码流特性
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流, 保留位非零等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 读取越过缓冲区末尾
    #[error("已到达码流末尾")]
    Eof,

    /// 写入超出缓冲区容量
    #[error("写入缓冲区空间不足")]
    OutOfSpace,

    /// finish() 之后继续写入
    #[error("写入器已结束, 不允许继续写入")]
    WriteAfterFinish,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Ying 码流层统一 Result 类型
pub type YingResult<T> = Result<T, YingError>;
