//! # ying-decode
//!
//! 自适应解码调度器.
//!
//! 调度器接收可能乱序到达的压缩帧, 在关键帧到达前丢弃增量帧, 按到达顺序送入
//! 外部解码原语 ([`DecodePrimitive`]), 将解码输出保存在按时间排序的缓存中,
//! 并在每次 tick 时把播放头投影到最近的可用帧.
//!
//! - [`DecodeScheduler`]: 纯状态机, 由 [`WorkerInput`] 驱动, 产生 [`WorkerEvent`]
//! - [`DecodeWorker`]: 在独立线程中运行调度器的句柄

pub mod config;
pub mod error;
pub mod messages;
pub mod primitive;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use config::SchedulerConfig;
pub use error::DecodeError;
pub use messages::{PlaceholderFrame, WorkerCommand, WorkerEvent, WorkerInput};
pub use primitive::{ChunkType, DecodePrimitive, DecodedFrame, DecoderState, EncodedChunk, OutputSink};
pub use scheduler::DecodeScheduler;
pub use store::DecodedFrameStore;
pub use worker::DecodeWorker;
