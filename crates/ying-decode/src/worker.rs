//! 解码工作线程.
//!
//! 调度器运行在独立线程中, 调用方通过 [`DecodeWorker`] 句柄发送命令并接收事件.
//! 线程在收到 `Close` 或句柄被 drop 时退出; 句柄必须显式关闭或 drop,
//! 不依赖任何隐式回收.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};
use ying_codec::{CompressedVideo, DecoderConfig, FrameInfo, get_frame_info, validate_frame};

use crate::config::SchedulerConfig;
use crate::error::DecodeError;
use crate::messages::{WorkerCommand, WorkerEvent, WorkerInput};
use crate::primitive::{DecodePrimitive, DecodedFrame, OutputSink};
use crate::scheduler::{DecodeScheduler, SharedDecoderConfig, lock_config};

/// 解码工作线程句柄
pub struct DecodeWorker<F: DecodedFrame> {
    input_tx: Sender<WorkerInput<F>>,
    event_rx: Receiver<WorkerEvent<F>>,
    decoder_config: SharedDecoderConfig,
    handle: Option<JoinHandle<()>>,
}

impl<F: DecodedFrame> DecodeWorker<F> {
    /// 启动工作线程
    ///
    /// `factory` 在工作线程中被调用, 用于创建 (以及关闭后重建) 解码原语.
    /// 解码原语通过收到的 [`OutputSink`] 投递输出.
    pub fn spawn<P, PF>(config: SchedulerConfig, factory: PF) -> Result<Self, DecodeError>
    where
        P: DecodePrimitive<Frame = F> + 'static,
        PF: FnMut(OutputSink<F>) -> P + Send + 'static,
    {
        let (input_tx, input_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let decoder_config: SharedDecoderConfig = Arc::new(Mutex::new(None));

        let sink = OutputSink::new(input_tx.clone());
        let shared = Arc::clone(&decoder_config);
        let tick_interval = Duration::from_millis(config.tick_interval_ms);
        let handle = thread::Builder::new()
            .name("ying-decode".into())
            .spawn(move || {
                let scheduler = DecodeScheduler::new(config, shared, sink, Box::new(factory));
                run_worker(scheduler, input_rx, event_tx, tick_interval);
            })
            .map_err(|e| DecodeError::Spawn(e.to_string()))?;

        Ok(Self {
            input_tx,
            event_rx,
            decoder_config,
            handle: Some(handle),
        })
    }

    fn send(&self, cmd: WorkerCommand) -> Result<(), DecodeError> {
        self.input_tx
            .send(WorkerInput::Command(cmd))
            .map_err(|_| DecodeError::WorkerClosed)
    }

    /// 更新播放头 (纳秒)
    pub fn set_playhead_time_nanos(&self, nanos: i64) -> Result<(), DecodeError> {
        self.send(WorkerCommand::SetPlayheadTimeNanos(nanos))
    }

    /// 排队解码一帧
    pub fn queue_decode(&self, frame: CompressedVideo, info: FrameInfo) -> Result<(), DecodeError> {
        self.send(WorkerCommand::QueueDecode { frame, info })
    }

    /// 设置输出帧目标宽度
    pub fn set_resize_width(&self, width: u32) -> Result<(), DecodeError> {
        self.send(WorkerCommand::SetResizeWidth(width))
    }

    /// seek 前重置
    pub fn reset_for_seek(&self) -> Result<(), DecodeError> {
        self.send(WorkerCommand::ResetForSeek)
    }

    /// 校验、分类并排队一帧, 同时把播放头推进到该帧
    pub fn submit_frame(&self, frame: &CompressedVideo) -> Result<FrameInfo, DecodeError> {
        validate_frame(frame)?;
        let info = get_frame_info(frame)?;
        self.queue_decode(frame.clone(), info)?;
        self.set_playhead_time_nanos(frame.timestamp_nanos)?;
        Ok(info)
    }

    /// 阻塞等待下一个事件
    pub fn recv_event(&self) -> Result<WorkerEvent<F>, DecodeError> {
        self.event_rx.recv().map_err(|_| DecodeError::WorkerClosed)
    }

    /// 等待下一个事件, 超时返回 `Ok(None)`
    pub fn recv_event_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<WorkerEvent<F>>, DecodeError> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(DecodeError::WorkerClosed),
        }
    }

    /// 非阻塞读取事件
    pub fn try_recv_event(&self) -> Option<WorkerEvent<F>> {
        self.event_rx.try_recv().ok()
    }

    /// 当前解码器配置, 配置进行中时等待其完成
    pub fn decoder_config(&self) -> Option<DecoderConfig> {
        lock_config(&self.decoder_config).clone()
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// 关闭工作线程并等待其退出, 可重复调用
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // 线程已退出时发送失败, 直接 join
        let _ = self.send(WorkerCommand::Close);
        if handle.join().is_err() {
            error!("解码线程异常退出");
        }
    }
}

impl<F: DecodedFrame> Drop for DecodeWorker<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// 工作线程主循环
///
/// 先处理所有已到达的输入, 再按 `tick_interval` 节流执行至多一次 tick.
/// 没有待执行的 tick 时阻塞在输入通道上.
fn run_worker<P: DecodePrimitive>(
    mut scheduler: DecodeScheduler<P>,
    input_rx: Receiver<WorkerInput<P::Frame>>,
    event_tx: Sender<WorkerEvent<P::Frame>>,
    tick_interval: Duration,
) {
    debug!("解码线程启动");
    let mut last_tick: Option<Instant> = None;

    loop {
        let first = if scheduler.tick_pending() {
            let wait = last_tick.map_or(Duration::ZERO, |t| {
                tick_interval.saturating_sub(t.elapsed())
            });
            match input_rx.recv_timeout(wait) {
                Ok(input) => Some(input),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match input_rx.recv() {
                Ok(input) => Some(input),
                Err(_) => break,
            }
        };

        let mut next = first;
        while let Some(input) = next {
            scheduler.handle(input);
            if scheduler.is_closed() {
                break;
            }
            next = match input_rx.try_recv() {
                Ok(input) => Some(input),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            };
        }

        let tick_due = last_tick.is_none_or(|t| t.elapsed() >= tick_interval);
        if scheduler.tick_pending() && tick_due {
            scheduler.tick();
            last_tick = Some(Instant::now());
        }

        for event in scheduler.drain_events() {
            if event_tx.send(event).is_err() {
                // 句柄已释放
                scheduler.close();
                return;
            }
        }

        if scheduler.is_closed() {
            break;
        }
    }

    scheduler.close();
    debug!("解码线程退出");
}
