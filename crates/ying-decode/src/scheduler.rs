//! 解码调度状态机.
//!
//! # 状态
//!
//! ```text
//! unconfigured ──keyframe──▶ configuring ──primitive ready──▶ configured
//!       ▲                                                         │
//!       └──────────────── reset_for_seek / 致命错误 ◀──────────────┘
//! 任意状态 ──close──▶ closed
//! ```
//!
//! 调度器不持有线程, 也不直接阻塞. 输入通过 [`DecodeScheduler::handle`] 送入,
//! 需要刷新时 [`DecodeScheduler::tick_pending`] 为 true, 由驱动方择机调用
//! [`DecodeScheduler::tick`]. 产生的事件通过 [`DecodeScheduler::drain_events`] 取出.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use log::{debug, warn};
use ying_codec::{
    CompressedVideo, DecoderConfig, FrameInfo, HardwareAcceleration, VideoCodec,
    create_decoder_config, rewrite_for_low_latency,
};

use crate::config::SchedulerConfig;
use crate::error::DecodeError;
use crate::messages::{PlaceholderFrame, WorkerCommand, WorkerEvent, WorkerInput};
use crate::primitive::{
    ChunkType, DecodePrimitive, DecodedFrame, DecoderState, EncodedChunk, OutputSink,
};
use crate::store::DecodedFrameStore;

/// 重复时间戳提示
const DUPLICATE_TIMESTAMP_MESSAGE: &str =
    "检测到时间戳重复的视频帧, 播放可能受影响. 视频帧时间戳应唯一且递增.";

/// 解码原语工厂, 关闭后重建时再次调用
pub type PrimitiveFactory<P> =
    Box<dyn FnMut(OutputSink<<P as DecodePrimitive>::Frame>) -> P + Send>;

/// 共享的解码器配置, 配置过程全程持锁
pub type SharedDecoderConfig = Arc<Mutex<Option<DecoderConfig>>>;

pub(crate) fn lock_config(shared: &SharedDecoderConfig) -> MutexGuard<'_, Option<DecoderConfig>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 等待送入解码原语的帧
#[derive(Debug)]
struct PendingFrame {
    frame: CompressedVideo,
    info: FrameInfo,
}

/// 解码调度器
pub struct DecodeScheduler<P: DecodePrimitive> {
    config: SchedulerConfig,
    primitive: P,
    factory: PrimitiveFactory<P>,
    sink: OutputSink<P::Frame>,
    decoder_config: SharedDecoderConfig,

    decoded: DecodedFrameStore<P::Frame>,
    pending: VecDeque<PendingFrame>,
    /// 已提交但尚未输出的时间戳, 按提交顺序
    in_flight: VecDeque<i64>,
    /// 自上次锚定以来提交过的时间戳
    processed: HashSet<i64>,

    need_keyframe: bool,
    /// 首帧时间 (纳秒), 所有微秒时间戳相对于它
    anchor_nanos: Option<i64>,
    playhead_nanos: Option<i64>,
    last_rendered: Option<i64>,
    /// 最近一次提交的帧时间 (纳秒)
    last_submitted_nanos: Option<i64>,
    /// 首个输出到达时学习的在途上限
    learned_queue_size: Option<usize>,
    resize_width: Option<u32>,

    configuring: bool,
    needs_render: bool,
    tick_pending: bool,
    placeholder_sent: bool,
    closed: bool,

    events: Vec<WorkerEvent<P::Frame>>,
}

impl<P: DecodePrimitive> DecodeScheduler<P> {
    /// 创建调度器并通过工厂创建首个解码原语
    pub fn new(
        config: SchedulerConfig,
        decoder_config: SharedDecoderConfig,
        sink: OutputSink<P::Frame>,
        mut factory: PrimitiveFactory<P>,
    ) -> Self {
        let primitive = factory(sink.clone());
        Self {
            config,
            primitive,
            factory,
            sink,
            decoder_config,
            decoded: DecodedFrameStore::new(),
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
            processed: HashSet::new(),
            need_keyframe: true,
            anchor_nanos: None,
            playhead_nanos: None,
            last_rendered: None,
            last_submitted_nanos: None,
            learned_queue_size: None,
            resize_width: None,
            configuring: false,
            needs_render: false,
            tick_pending: false,
            placeholder_sent: false,
            closed: false,
            events: Vec::new(),
        }
    }

    // ============================================================
    // 查询
    // ============================================================

    /// 是否有待执行的 tick
    pub fn tick_pending(&self) -> bool {
        self.tick_pending
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 是否在等待关键帧
    pub fn needs_keyframe(&self) -> bool {
        self.need_keyframe
    }

    /// 缓存中的解码帧数
    pub fn decoded_len(&self) -> usize {
        self.decoded.len()
    }

    /// 等待提交的帧数
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 在途帧数
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// 当前解码原语
    pub fn primitive(&self) -> &P {
        &self.primitive
    }

    /// 取出累积的事件
    pub fn drain_events(&mut self) -> Vec<WorkerEvent<P::Frame>> {
        std::mem::take(&mut self.events)
    }

    // ============================================================
    // 输入
    // ============================================================

    /// 处理一条输入
    pub fn handle(&mut self, input: WorkerInput<P::Frame>) {
        match input {
            WorkerInput::Command(cmd) => self.handle_command(cmd),
            WorkerInput::Output(frame) => self.on_output(frame),
            WorkerInput::DecoderError(err) => self.on_decoder_error(err),
        }
    }

    /// 处理一条命令, 关闭后只接受 `Close`
    pub fn handle_command(&mut self, cmd: WorkerCommand) {
        if self.closed && cmd != WorkerCommand::Close {
            debug!("解码调度器已关闭, 忽略命令");
            return;
        }
        match cmd {
            WorkerCommand::SetPlayheadTimeNanos(nanos) => self.set_playhead_time_nanos(nanos),
            WorkerCommand::QueueDecode { frame, info } => self.queue_decode(frame, info),
            WorkerCommand::SetResizeWidth(width) => self.set_resize_width(width),
            WorkerCommand::ResetForSeek => self.reset_for_seek(),
            WorkerCommand::Close => self.close(),
        }
    }

    /// 更新播放头
    pub fn set_playhead_time_nanos(&mut self, nanos: i64) {
        self.playhead_nanos = Some(nanos);
        self.needs_render = true;
        self.schedule_update();
    }

    /// 设置输出帧目标宽度
    pub fn set_resize_width(&mut self, width: u32) {
        self.resize_width = Some(width);
    }

    /// 排队解码一帧
    pub fn queue_decode(&mut self, frame: CompressedVideo, info: FrameInfo) {
        if self.anchor_nanos.is_none() {
            self.anchor_nanos = Some(frame.timestamp_nanos);
            self.processed.clear();
        }

        if self.primitive.state() == DecoderState::Closed {
            self.recreate_primitive();
            self.need_keyframe = true;
            self.pending.clear();
        }

        if !info.is_key_frame && self.need_keyframe {
            return;
        }
        if info.is_key_frame {
            self.pending.clear();
        }

        if self.primitive.state() != DecoderState::Unconfigured {
            self.pending.push_back(PendingFrame { frame, info });
            self.schedule_update();
            return;
        }

        if lock_config(&self.decoder_config).is_none() {
            let derived = match create_decoder_config(&frame) {
                Ok(Some(config)) => Ok(config),
                Ok(None) => Err(DecodeError::MissingDecoderConfig),
                Err(err) => Err(DecodeError::Codec(err)),
            };
            match derived {
                Ok(config) => *lock_config(&self.decoder_config) = Some(config),
                Err(err) => {
                    self.need_keyframe = true;
                    self.pending.clear();
                    self.emit_error(err);
                    return;
                }
            }
        }

        self.need_keyframe = false;
        self.pending.push_back(PendingFrame { frame, info });
        self.configure_decoder();
        self.schedule_update();
    }

    /// seek 前重置: 清空队列与缓存, 重新等待关键帧, 立即发出占位帧
    pub fn reset_for_seek(&mut self) {
        if matches!(
            self.primitive.state(),
            DecoderState::Configured | DecoderState::Configuring
        ) {
            self.primitive.reset();
        }
        self.reset_state();
        let placeholder = self.placeholder();
        self.placeholder_sent = true;
        self.emit(WorkerEvent::NoFrame(placeholder));
    }

    /// 关闭解码原语并释放全部帧, 可重复调用
    pub fn close(&mut self) {
        if self.primitive.state() != DecoderState::Closed {
            self.primitive.close();
        }
        self.reset_state();
        self.closed = true;
    }

    // ============================================================
    // 解码原语回调
    // ============================================================

    fn on_output(&mut self, frame: P::Frame) {
        if self.closed {
            return;
        }
        let timestamp = frame.timestamp_micros();
        if let Some(index) = self.in_flight.iter().position(|&ts| ts == timestamp) {
            self.in_flight.drain(..=index);
        }
        if self.learned_queue_size.is_none() {
            let learned = (self.in_flight.len() + 1).min(self.config.max_queue_size);
            debug!("在途帧上限学习为 {}", learned);
            self.learned_queue_size = Some(learned);
        }

        if self.last_rendered.is_some_and(|last| timestamp < last) {
            debug!("丢弃过期的解码帧, timestamp={}us", timestamp);
            return;
        }
        self.decoded.insert(timestamp, frame);
        self.schedule_update();
    }

    fn on_decoder_error(&mut self, err: DecodeError) {
        if self.closed {
            return;
        }
        let err = match (err, self.last_submitted_nanos) {
            (DecodeError::Decode(message), Some(nanos)) => DecodeError::Decode(format!(
                "{} @ 帧时间戳: {:.6}s",
                message,
                nanos as f64 / 1e9
            )),
            (err, _) => err,
        };
        let err = if self.configuring {
            DecodeError::UnsupportedCodec(err.to_string())
        } else {
            err
        };
        self.fail(err);
    }

    // ============================================================
    // tick
    // ============================================================

    /// 执行一次刷新: 检查配置状态, 投影播放头, 提交队列
    pub fn tick(&mut self) {
        self.tick_pending = false;
        if self.closed {
            return;
        }

        if self.anchor_nanos.is_some()
            && !self.need_keyframe
            && self.primitive.state() != DecoderState::Configured
        {
            self.schedule_update();
        }
        self.poll_configured();

        if self.needs_render || !self.decoded.is_empty() {
            self.needs_render = false;
            self.render_current_frame();
        }

        self.process_queue();
    }

    fn schedule_update(&mut self) {
        self.tick_pending = true;
    }

    fn render_current_frame(&mut self) {
        let Some(playhead) = self.playhead_micros() else {
            return;
        };
        let Some(timestamp) = self.decoded.nearest_at_or_before(playhead) else {
            self.handle_empty_frame();
            return;
        };

        if self.last_rendered != Some(timestamp) {
            self.emit(WorkerEvent::Delay {
                millis: (playhead - timestamp).div_euclid(1000),
            });
            self.last_rendered = Some(timestamp);
            if let Some(frame) = self.decoded.remove(timestamp) {
                self.emit_frame(frame);
            }
        }

        // 已显示及更早的帧释放
        self.decoded.remove_up_to(timestamp);
    }

    fn emit_frame(&mut self, frame: P::Frame) {
        let Some(width) = self.resize_width else {
            self.emit(WorkerEvent::Frame(frame));
            return;
        };
        match frame.resize_to_width(width) {
            Ok(resized) => self.emit(WorkerEvent::Frame(resized)),
            Err(err) => {
                warn!("{}", err);
                self.emit(WorkerEvent::NonBlockingError(err.to_string()));
            }
        }
    }

    fn handle_empty_frame(&mut self) {
        if self.last_rendered.is_none() && !self.placeholder_sent {
            let placeholder = self.placeholder();
            self.placeholder_sent = true;
            self.emit(WorkerEvent::NoFrame(placeholder));
        }
    }

    fn placeholder(&self) -> PlaceholderFrame {
        let coded = lock_config(&self.decoder_config)
            .as_ref()
            .and_then(DecoderConfig::coded_size);
        let (width, height) =
            coded.unwrap_or((self.config.placeholder_width, self.config.placeholder_height));

        match self.resize_width {
            Some(resize) if width > 0 => {
                let scaled = (u64::from(height) * u64::from(resize) + u64::from(width) / 2)
                    / u64::from(width);
                PlaceholderFrame {
                    width: resize,
                    height: u32::try_from(scaled).unwrap_or(u32::MAX).max(1),
                }
            }
            _ => PlaceholderFrame { width, height },
        }
    }

    fn process_queue(&mut self) {
        while let Some(front) = self.pending.front() {
            if self.primitive.state() != DecoderState::Configured {
                break;
            }
            let limit = self.learned_queue_size.unwrap_or(self.config.max_queue_size);
            if self.config.limit_queue_size
                && !front.info.is_key_frame
                && self.in_flight.len() > limit
            {
                break;
            }
            let Some(PendingFrame { frame, info }) = self.pending.pop_front() else {
                break;
            };
            let Some(timestamp) = self.to_micros(frame.timestamp_nanos) else {
                continue;
            };

            if !self.processed.insert(timestamp) {
                self.emit(WorkerEvent::NonBlockingError(
                    DUPLICATE_TIMESTAMP_MESSAGE.to_string(),
                ));
            }

            let data = if info.may_need_rewrite && frame.codec() == Some(VideoCodec::H264) {
                rewrite_for_low_latency(&frame.data).map_or_else(|| frame.data.clone(), Bytes::from)
            } else {
                frame.data.clone()
            };
            let chunk = EncodedChunk {
                chunk_type: if info.is_key_frame {
                    ChunkType::Key
                } else {
                    ChunkType::Delta
                },
                data,
                timestamp_micros: timestamp,
            };

            self.last_submitted_nanos = Some(frame.timestamp_nanos);
            self.in_flight.push_back(timestamp);
            if let Err(err) = self.primitive.decode(chunk) {
                self.fail(err);
                return;
            }
        }
    }

    // ============================================================
    // 配置
    // ============================================================

    fn configure_decoder(&mut self) {
        let shared = Arc::clone(&self.decoder_config);
        let mut guard = lock_config(&shared);
        let Some(config) = guard.as_mut() else {
            drop(guard);
            self.fail(DecodeError::MissingDecoderConfig);
            return;
        };

        config.optimize_for_latency = self.config.optimize_for_latency;
        if self.config.hardware_acceleration != HardwareAcceleration::NoPreference {
            config.hardware_acceleration = self.config.hardware_acceleration;
        }

        if self.primitive.state() == DecoderState::Closed {
            self.emit_debug("解码器已关闭, 重新创建".to_string());
            self.recreate_primitive();
        }

        self.emit_debug(format!("配置解码器: {}", describe(config)));
        if let Err(err) = self.primitive.configure(config) {
            self.emit_warn(format!("配置解码器失败 ({}), 尝试放宽硬件加速要求", err));
            config.hardware_acceleration = HardwareAcceleration::NoPreference;
            self.emit_debug(format!("配置解码器: {}", describe(config)));
            if let Err(err) = self.primitive.configure(config) {
                drop(guard);
                self.fail(err);
                return;
            }
        }
        self.configuring = true;
        drop(guard);
        self.poll_configured();
    }

    fn poll_configured(&mut self) {
        if !self.configuring || self.primitive.state() != DecoderState::Configured {
            return;
        }
        self.configuring = false;
        let config = lock_config(&self.decoder_config).clone();
        if let Some(config) = config {
            self.emit(WorkerEvent::Configured(config));
        }
    }

    fn recreate_primitive(&mut self) {
        self.primitive = (self.factory)(self.sink.clone());
        self.configuring = false;
    }

    // ============================================================
    // 状态维护
    // ============================================================

    fn playhead_micros(&self) -> Option<i64> {
        self.playhead_nanos.and_then(|nanos| self.to_micros(nanos))
    }

    fn to_micros(&self, nanos: i64) -> Option<i64> {
        self.anchor_nanos
            .map(|anchor| nanos.saturating_sub(anchor).div_euclid(1000))
    }

    fn reset_state(&mut self) {
        self.anchor_nanos = None;
        self.last_submitted_nanos = None;
        self.need_keyframe = true;
        self.playhead_nanos = None;
        self.needs_render = false;
        self.last_rendered = None;
        self.learned_queue_size = None;
        self.configuring = false;
        self.placeholder_sent = false;
        self.pending.clear();
        self.in_flight.clear();
        self.processed.clear();
        // 缓存中的帧在此释放
        self.decoded.clear();
    }

    /// 致命错误: 关闭原语, 重置状态, 发出错误
    fn fail(&mut self, err: DecodeError) {
        if self.primitive.state() != DecoderState::Closed {
            self.primitive.close();
        }
        self.reset_state();
        self.emit_error(err);
    }

    fn emit(&mut self, event: WorkerEvent<P::Frame>) {
        self.events.push(event);
    }

    fn emit_debug(&mut self, message: String) {
        debug!("{}", message);
        self.emit(WorkerEvent::Debug(message));
    }

    fn emit_warn(&mut self, message: String) {
        warn!("{}", message);
        self.emit(WorkerEvent::Warn(message));
    }

    fn emit_error(&mut self, err: DecodeError) {
        log::error!("{}", err);
        self.emit(WorkerEvent::Error(err));
    }
}

fn describe(config: &DecoderConfig) -> String {
    serde_json::to_string(config).unwrap_or_else(|_| config.codec.clone())
}
