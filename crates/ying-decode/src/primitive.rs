//! 解码原语能力接口.
//!
//! 具体的硬件/软件解码器不在本 crate 中实现. 调度器只依赖以下约定:
//! - `configure` / `decode` / `reset` / `close` 同步调用, 可能失败
//! - 解码输出与异步错误通过 [`OutputSink`] 送回调度器所在的工作线程
//! - `state()` 随时反映原语当前状态

use std::sync::mpsc::Sender;

use bytes::Bytes;
use ying_codec::DecoderConfig;

use crate::error::DecodeError;
use crate::messages::WorkerInput;

/// 解码原语状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// 未配置
    Unconfigured,
    /// 已提交配置, 等待生效
    Configuring,
    /// 可以解码
    Configured,
    /// 已关闭, 不可再使用
    Closed,
}

/// 压缩块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// 关键帧
    Key,
    /// 增量帧
    Delta,
}

/// 送入解码原语的压缩块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// 块类型
    pub chunk_type: ChunkType,
    /// 压缩数据 (H.264 可能已经过低延迟改写)
    pub data: Bytes,
    /// 相对首帧的时间戳 (微秒)
    pub timestamp_micros: i64,
}

/// 解码输出帧
///
/// 解码帧是稀缺资源, 释放即 drop. 调度器保证每一帧恰好被 drop 或发出一次.
pub trait DecodedFrame: Send + 'static {
    /// 相对首帧的时间戳 (微秒)
    fn timestamp_micros(&self) -> i64;

    /// 缩放到指定宽度 (保持宽高比)
    ///
    /// 失败时帧被消耗 (即释放).
    fn resize_to_width(self, _width: u32) -> Result<Self, DecodeError>
    where
        Self: Sized,
    {
        Ok(self)
    }
}

/// 外部解码原语
pub trait DecodePrimitive {
    /// 输出帧类型
    type Frame: DecodedFrame;

    /// 应用配置, 配置无效时返回错误
    fn configure(&mut self, config: &DecoderConfig) -> Result<(), DecodeError>;

    /// 提交一个压缩块
    fn decode(&mut self, chunk: EncodedChunk) -> Result<(), DecodeError>;

    /// 丢弃所有在途工作, 回到未配置状态
    fn reset(&mut self);

    /// 关闭原语
    fn close(&mut self);

    /// 当前状态
    fn state(&self) -> DecoderState;
}

/// 解码原语的输出回调
///
/// 输出与错误被投递到调度器的输入通道. 调度器已退出时输出帧被直接 drop.
pub struct OutputSink<F> {
    tx: Sender<WorkerInput<F>>,
}

impl<F> Clone for OutputSink<F> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<F> OutputSink<F> {
    /// 包装调度器输入通道
    pub fn new(tx: Sender<WorkerInput<F>>) -> Self {
        Self { tx }
    }

    /// 投递一个解码输出
    pub fn output(&self, frame: F) {
        // 接收端已关闭时 SendError 携带的帧随之释放
        let _ = self.tx.send(WorkerInput::Output(frame));
    }

    /// 投递一个异步解码错误
    pub fn error(&self, err: DecodeError) {
        let _ = self.tx.send(WorkerInput::DecoderError(err));
    }
}

impl<F> std::fmt::Debug for OutputSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink").finish_non_exhaustive()
    }
}
