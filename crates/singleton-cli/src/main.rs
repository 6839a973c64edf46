//! 单实例检测命令行工具（诊断与脚本集成）。
//!
//! 职责：
//! - `check`：判断指定进程是否为其可执行文件的唯一实例
//! - `index`：输出当前进程快照（可执行文件路径 -> PID 集合），JSON 格式
//! - `strategy`：输出按平台能力选中的检测策略
//! - `stub`：按路径/进程名的占位检测（未实现，始终为 false）
//!
//! 退出码约定（`check`）：
//! - 0：唯一
//! - 3：检测到重复实例
//! - 2：查询失败，结论未知
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use singleton_core::{
    is_unique_name, is_unique_path, Config, ProcessIndex, Procfs, Singleton, Strictness,
    Uniqueness,
};
use tracing::{info, warn};

const EXIT_DUPLICATE: u8 = 3;
const EXIT_UNKNOWN: u8 = 2;

/// 命令行参数。
///
/// 说明：
/// - `config` 指向 JSON 配置文件（可选）；其余全局参数覆盖配置文件中的同名字段
#[derive(Debug, Parser)]
#[command(name = "singleton", version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    proc_root: Option<PathBuf>,

    #[arg(long, value_enum)]
    strictness: Option<StrictnessArg>,

    #[arg(long)]
    fallback_timeout_ms: Option<u64>,

    #[arg(long, default_value_t = false)]
    force_fallback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrictnessArg {
    Strict,
    AnyMember,
}

impl From<StrictnessArg> for Strictness {
    fn from(arg: StrictnessArg) -> Self {
        match arg {
            StrictnessArg::Strict => Strictness::Strict,
            StrictnessArg::AnyMember => Strictness::AnyMember,
        }
    }
}

/// 支持的子命令。
#[derive(Debug, Subcommand)]
enum Commands {
    /// 检查进程是否为唯一实例。
    Check {
        #[arg(long)]
        pid: u32,
        /// 目标可执行文件名（仅外部 ps 管道降级时使用）。
        #[arg(long)]
        name: Option<String>,
    },
    /// 输出进程快照 JSON。
    Index {
        #[arg(long, default_value_t = false)]
        duplicates_only: bool,
    },
    /// 输出选中的检测策略。
    Strategy,
    /// 占位检测（未实现）。
    Stub {
        #[command(subcommand)]
        target: StubTarget,
    },
}

#[derive(Debug, Subcommand)]
enum StubTarget {
    Path { path: PathBuf },
    Name { name: String },
}

/// 程序入口：初始化日志、合并配置并分发子命令。
fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    match &cli.command {
        Commands::Check { pid, name } => Ok(check(&config, *pid, name.as_deref())),
        Commands::Index { duplicates_only } => index(&config, *duplicates_only),
        Commands::Strategy => {
            let singleton = Singleton::new(&config).context("探测检测策略失败")?;
            println!("{}", singleton.strategy_name());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stub { target } => {
            let unique = match target {
                StubTarget::Path { path } => is_unique_path(path),
                StubTarget::Name { name } => is_unique_name(name),
            };
            println!("{unique}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 合并配置：默认值 <- 配置文件 <- 命令行参数。
///
/// 异常处理：
/// - 指定的配置文件读取/解析失败会返回错误
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(root) = &cli.proc_root {
        config.proc_root = root.clone();
    }
    if let Some(strictness) = cli.strictness {
        config.strictness = strictness.into();
    }
    if let Some(ms) = cli.fallback_timeout_ms {
        config.fallback_timeout_ms = ms;
    }
    if cli.force_fallback {
        config.force_fallback = true;
    }
    Ok(config)
}

/// 执行唯一性检查并输出结论。
///
/// 返回值：
/// - 退出码（见模块文档）
fn check(config: &Config, pid: u32, name: Option<&str>) -> ExitCode {
    match Singleton::new(config).and_then(|singleton| singleton.check(pid, name)) {
        Ok(Uniqueness::Unique { path }) => {
            println!("unique {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(Uniqueness::Duplicate { path, pids }) => {
            let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
            println!("duplicate {} pids={}", path.display(), pids.join(","));
            info!("检测到重复实例: {}", path.display());
            ExitCode::from(EXIT_DUPLICATE)
        }
        Err(e) => {
            warn!("唯一性检查失败，结论未知: {e}");
            println!("unknown");
            ExitCode::from(EXIT_UNKNOWN)
        }
    }
}

/// 输出进程快照。
///
/// 异常处理：
/// - 进程注册表不可列出时返回错误
fn index(config: &Config, duplicates_only: bool) -> Result<ExitCode> {
    let procfs = Procfs::new(&config.proc_root);
    let index = ProcessIndex::build(&procfs, &procfs).context("构建进程快照失败")?;
    let groups: Vec<_> = if duplicates_only {
        index.duplicates().collect()
    } else {
        index.iter().collect()
    };
    let out = serde_json::json!({
        "captured_at": index.captured_at().unix_timestamp(),
        "groups": groups,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("序列化进程快照失败")?
    );
    Ok(ExitCode::SUCCESS)
}
