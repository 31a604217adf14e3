//! 日志初始化模块.
//!
//! 库 crate 只通过 `log` 门面输出, 由这里安装的 tracing 订阅器统一收集.
//!
//! 双输出 (统一级别):
//! - console: 彩色, 输出到 stderr (stdout 留给探测结果)
//! - file: 无色, 按天滚动, 可关闭
//!
//! 级别体系 (优先级: YING_LOG 环境变量 > 配置 > 默认):
//! - 默认:   info
//! - `-v`:   debug
//! - `-vv`:  trace (仅 ying 项目 crate, 第三方依赖保持 info)
//! - `-vvv`: trace (全局)
//!
//! 日志文件输出到 {log_dir}/{prefix}.{date}.log

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 覆盖日志级别的环境变量
pub const LOG_ENV: &str = "YING_LOG";

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 本项目所有 crate 的 target 前缀 (用于 -vv 级别的定向 trace)
const YING_CRATE_TARGETS: &[&str] = &[
    "ying",
    "ying_core",
    "ying_codec",
    "ying_decode",
    "ying_probe",
];

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 指令, 如 "info" 或 "ying_decode=debug,info"
    pub level: String,
    /// 日志目录
    pub log_dir: String,
    /// 日志文件前缀
    pub file_prefix: String,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否写日志文件, 关闭时不创建日志目录
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            log_dir: "logs".into(),
            file_prefix: "ying".into(),
            console: true,
            file: true,
        }
    }
}

impl LoggingConfig {
    /// 以 `-v` 次数设置级别
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.level = verbosity_directive(verbosity);
        self
    }
}

/// verbosity 对应的 EnvFilter 指令
///
/// - 0: info
/// - 1: debug
/// - 2: trace (仅 ying crate)
/// - 3+: trace
pub fn verbosity_directive(verbosity: u8) -> String {
    match verbosity {
        0 => "info".into(),
        1 => "debug".into(),
        2 => {
            let mut directives = YING_CRATE_TARGETS
                .iter()
                .map(|t| format!("{t}=trace"))
                .collect::<Vec<_>>();
            directives.push("info".to_string());
            directives.join(",")
        }
        _ => "trace".into(),
    }
}

/// 根据 verbosity 构建 EnvFilter
pub fn verbosity_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::new(verbosity_directive(verbosity))
}

/// 构建过滤器: YING_LOG 环境变量优先, 其次为配置级别
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("无效的日志级别: {level}"))
}

/// 初始化日志系统
///
/// 全局订阅器只能安装一次, 重复调用返回错误.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let console_layer = if config.console {
        Some(
            fmt::Layer::default()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .event_format(ConsoleFormatter)
                .with_filter(build_filter(&config.level)?),
        )
    } else {
        None
    };

    let (file_layer, guard) = if config.file {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("创建日志目录失败: {}", config.log_dir))?;

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(&config.log_dir)
            .context("创建日志文件失败")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::Layer::default()
            .with_writer(non_blocking)
            .with_ansi(false)
            .event_format(FileFormatter)
            .with_filter(build_filter(&config.level)?);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已初始化")?;

    if let Some(guard) = guard {
        LOG_GUARD.set(guard).ok();
    }
    Ok(())
}

fn write_timestamp(writer: &mut Writer<'_>) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )
}

/// Console 格式: 彩色, 带时间戳
struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write_timestamp(&mut writer)?;
        write!(writer, "{}{:5}\x1b[0m > ", color, meta.level())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 时间戳 + 级别 + target + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_timestamp(&mut writer)?;
        write!(writer, "{:5} {} > ", meta.level(), meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
