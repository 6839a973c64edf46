//! 检测策略：procfs（主路径）与外部 `ps` 管道（降级路径）。
//!
//! 选择时机：
//! - 启动时按平台能力探测一次（[`detect_strategy`]），之后每次查询不再分支判断
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::{Config, Strictness};
use crate::error::{EnumerationError, QueryError};
use crate::fallback;
use crate::registry::{Capability, Pid, Procfs};
use crate::query::{check_with, Uniqueness};

/// 唯一性检测策略。
pub trait InstanceStrategy: Send + Sync {
    /// 策略名称（用于日志与诊断输出）。
    fn name(&self) -> &'static str;

    /// 检查 `pid` 是否为其可执行文件的唯一实例。
    ///
    /// 参数：
    /// - `name`：目标可执行文件名；procfs 策略忽略该参数
    fn check(&self, pid: Pid, name: Option<&str>) -> Result<Uniqueness, QueryError>;
}

/// 基于 procfs 的检测。
#[derive(Debug, Clone)]
pub struct ProcfsStrategy {
    procfs: Procfs,
    strictness: Strictness,
}

impl ProcfsStrategy {
    pub fn new(procfs: Procfs, strictness: Strictness) -> Self {
        Self { procfs, strictness }
    }
}

impl InstanceStrategy for ProcfsStrategy {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn check(&self, pid: Pid, _name: Option<&str>) -> Result<Uniqueness, QueryError> {
        check_with(&self.procfs, &self.procfs, pid, self.strictness)
    }
}

/// 基于外部 `ps | grep name | grep -v grep` 管道的检测。
///
/// 注意：
/// - 子串匹配，存在误报（见 [`crate::fallback`]）
/// - 只要有命中行即报告重复（含调用方自身）
#[derive(Debug, Clone)]
pub struct PsPipelineStrategy {
    timeout: Duration,
}

impl PsPipelineStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl InstanceStrategy for PsPipelineStrategy {
    fn name(&self) -> &'static str {
        "ps-pipeline"
    }

    fn check(&self, pid: Pid, name: Option<&str>) -> Result<Uniqueness, QueryError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => own_binary_name(pid)?,
        };
        let lines = fallback::matching_lines(&name, self.timeout)?;
        let path = PathBuf::from(&name);
        if lines.is_empty() {
            Ok(Uniqueness::Unique { path })
        } else {
            Ok(Uniqueness::Duplicate {
                path,
                pids: fallback::parse_pids(&lines),
            })
        }
    }
}

/// 未指定目标名时，仅当查询的是自身 PID 才能从当前可执行文件推导名称。
fn own_binary_name(pid: Pid) -> Result<String, QueryError> {
    if pid != std::process::id() {
        return Err(QueryError::FallbackPipelineFailed(format!(
            "未指定目标名称，且无法推导进程 {pid} 的可执行文件名"
        )));
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .ok_or_else(|| QueryError::FallbackPipelineFailed("无法获取当前可执行文件名".to_string()))
}

/// 按平台能力选择检测策略。
///
/// 规则：
/// - `force_fallback` 为真：外部管道
/// - procfs 探测可用：procfs
/// - 注册表不存在或不提供 `exe` 链接：外部管道
///
/// 异常处理：
/// - 注册表存在但无法列出（如权限不足）：返回 [`EnumerationError`]，不降级
pub fn detect_strategy(config: &Config) -> Result<Box<dyn InstanceStrategy>, EnumerationError> {
    let strategy: Box<dyn InstanceStrategy> = if config.force_fallback {
        Box::new(PsPipelineStrategy::new(config.fallback_timeout()))
    } else {
        let procfs = Procfs::new(&config.proc_root);
        match procfs.probe() {
            Capability::Supported => Box::new(ProcfsStrategy::new(procfs, config.strictness)),
            Capability::Unsupported => Box::new(PsPipelineStrategy::new(config.fallback_timeout())),
            Capability::Unreadable(e) => return Err(e),
        }
    };
    debug!(strategy = strategy.name(), "已选择唯一性检测策略");
    Ok(strategy)
}
