//! 唯一性查询（对外入口）。
//!
//! 流程：
//! 1) 解析被查询 PID 自身的可执行文件路径；失败即返回 `SelfResolutionFailed`
//! 2) 构建进程快照索引，按路径查找分组；找不到返回 `UnknownBinaryPath`
//! 3) 分组恰好一个进程（严格口径下还要求就是被查询的 PID）即为唯一
//!
//! 结果契约：
//! - 只会是“唯一”“重复（附路径）”“查询错误”三者之一，错误路径上绝不返回“唯一”
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;

use crate::config::{Config, Strictness};
use crate::error::QueryError;
use crate::index::ProcessIndex;
use crate::registry::{ExePathResolver, Pid, ProcessSource};
use crate::strategy::{detect_strategy, InstanceStrategy};

/// 唯一性判定结果。
///
/// 说明：
/// - `path` 为可执行文件路径；外部管道降级路径下为目标名称
/// - `pids` 为运行同一可执行文件的全部进程（降级路径下为尽力解析的结果，可能为空）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Uniqueness {
    Unique { path: PathBuf },
    Duplicate { path: PathBuf, pids: BTreeSet<Pid> },
}

impl Uniqueness {
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Unique { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Unique { path } | Self::Duplicate { path, .. } => path,
        }
    }
}

/// 在已构建的快照上判定唯一性。
///
/// 参数：
/// - `index`：进程快照
/// - `path`：被查询进程的可执行文件路径
/// - `pid`：被查询进程 ID
/// - `strictness`：判定口径
///
/// 异常处理：
/// - 快照中没有该路径：返回 [`QueryError::UnknownBinaryPath`]
pub fn evaluate(
    index: &ProcessIndex,
    path: &Path,
    pid: Pid,
    strictness: Strictness,
) -> Result<Uniqueness, QueryError> {
    let pids = index
        .pids_for(path)
        .ok_or_else(|| QueryError::UnknownBinaryPath(path.to_path_buf()))?;

    let unique = match strictness {
        Strictness::Strict => pids.len() == 1 && pids.contains(&pid),
        Strictness::AnyMember => pids.len() == 1,
    };
    let path = path.to_path_buf();
    if unique {
        Ok(Uniqueness::Unique { path })
    } else {
        Ok(Uniqueness::Duplicate {
            path,
            pids: pids.iter().copied().collect(),
        })
    }
}

/// 基于给定的进程来源与解析器执行完整查询（步骤 1-3）。
pub fn check_with<S, R>(
    source: &S,
    resolver: &R,
    pid: Pid,
    strictness: Strictness,
) -> Result<Uniqueness, QueryError>
where
    S: ProcessSource + ?Sized,
    R: ExePathResolver + ?Sized,
{
    let path = resolver
        .resolve(pid)
        .map_err(|source| QueryError::SelfResolutionFailed { pid, source })?;
    let index = ProcessIndex::build(source, resolver)?;
    evaluate(&index, &path, pid, strictness)
}

/// 持有已选定检测策略的查询句柄。
///
/// 说明：
/// - 构造时按平台能力探测一次策略，之后的每次检查直接复用
/// - 不缓存任何进程快照，每次检查都会重新扫描
pub struct Singleton {
    strategy: Box<dyn InstanceStrategy>,
}

impl Singleton {
    /// 按配置探测并选定检测策略。
    ///
    /// 异常处理：
    /// - 进程注册表存在但无法列出：返回 `EnumerationFailed`
    pub fn new(config: &Config) -> Result<Self, QueryError> {
        Ok(Self {
            strategy: detect_strategy(config)?,
        })
    }

    /// 使用指定策略（测试或自定义注册表）。
    pub fn with_strategy(strategy: Box<dyn InstanceStrategy>) -> Self {
        Self { strategy }
    }

    /// 选中的策略名称。
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 检查 `pid` 是否为其可执行文件的唯一实例。
    pub fn check(&self, pid: Pid, name: Option<&str>) -> Result<Uniqueness, QueryError> {
        self.strategy.check(pid, name)
    }
}

/// 默认配置下的句柄，进程内只探测一次。
fn default_singleton() -> Result<&'static Singleton, QueryError> {
    static DEFAULT: OnceLock<Singleton> = OnceLock::new();

    if let Some(singleton) = DEFAULT.get() {
        return Ok(singleton);
    }
    let singleton = Singleton::new(&Config::default())?;
    Ok(DEFAULT.get_or_init(|| singleton))
}

/// 检查是否已有同一可执行文件的其他实例在运行（默认配置）。
///
/// 参数：
/// - `pid`：被查询进程 ID（通常为 `std::process::id()`）
/// - `name`：目标可执行文件名，仅在降级到外部 `ps` 管道时使用
///
/// 返回值：
/// - `Ok(Uniqueness::Unique)`：唯一
/// - `Ok(Uniqueness::Duplicate)`：检测到重复实例
///
/// 异常处理：
/// - 任何 [`QueryError`] 表示结论未知，由调用方决定如何处理
pub fn check_unique_binary(pid: Pid, name: Option<&str>) -> Result<Uniqueness, QueryError> {
    default_singleton()?.check(pid, name)
}

/// 同 [`check_unique_binary`]，使用指定配置（单次探测；重复检查请复用 [`Singleton`]）。
pub fn check_unique_binary_with(
    config: &Config,
    pid: Pid,
    name: Option<&str>,
) -> Result<Uniqueness, QueryError> {
    Singleton::new(config)?.check(pid, name)
}

/// 布尔形式的唯一性查询。
pub fn is_unique(pid: Pid) -> Result<bool, QueryError> {
    Ok(check_unique_binary(pid, None)?.is_unique())
}

/// 按路径判断是否唯一。
///
/// 未实现：始终返回 `false`。
pub fn is_unique_path(_path: &Path) -> bool {
    false
}

/// 按进程名判断是否唯一。
///
/// 未实现：始终返回 `false`。
pub fn is_unique_name(_name: &str) -> bool {
    false
}
