//! ying-probe - 视频基本流探测工具
//!
//! 把整个输入文件视为一个访问单元, 输出帧分类、NAL 单元、解码器配置
//! 与 H.264 SPS 摘要 (JSON). 可选地写出 H.264 低延迟改写结果.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use std::process;

use ying::codec::VideoCodec;
use ying::logging::{self, LoggingConfig};
use ying::probe;

/// Ying 视频基本流探测工具
#[derive(Parser, Debug)]
#[command(name = "ying-probe", version, about = "纯 Rust 视频基本流探测工具")]
struct Cli {
    /// 输入文件路径
    input: PathBuf,

    /// 编码格式 (h264/h265/vp9/av1), 缺省时按扩展名推断
    #[arg(long)]
    codec: Option<VideoCodec>,

    /// 写出 H.264 低延迟改写结果到指定文件
    #[arg(long, value_name = "OUT")]
    rewrite: Option<PathBuf>,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// 不写日志文件, 只输出到控制台
    #[arg(long)]
    no_log_file: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    logging::init(&LoggingConfig {
        file_prefix: "ying-probe".into(),
        file: !cli.no_log_file,
        ..LoggingConfig::default().with_verbosity(cli.verbose)
    })?;
    debug!("ying-probe {} 启动, 输入: {}", ying::version(), cli.input.display());

    let report = probe::probe_file(&cli.input, cli.codec)?;
    let json = serde_json::to_string_pretty(&report).context("序列化探测结果失败")?;
    println!("{json}");

    if let Some(out) = &cli.rewrite {
        if report.codec != VideoCodec::H264 {
            anyhow::bail!("--rewrite 仅支持 H.264, 当前为 {}", report.codec);
        }
        let changed = probe::rewrite_file(&cli.input, out)?;
        if changed {
            info!("已写出低延迟改写结果: {}", out.display());
        } else {
            info!("无需改写, 已原样复制到: {}", out.display());
        }
    }
    Ok(())
}
