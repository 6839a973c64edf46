//! 进程快照索引：可执行文件路径 -> 进程 ID 集合。
//!
//! 约束：
//! - 每次查询现场构建，只读使用，查询结束即丢弃；不缓存、不落盘
//! - 索引中任一路径对应的每个 PID，在扫描时都解析到了该路径
//! - 不存在空集合条目
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::error::EnumerationError;
use crate::registry::{ExePathResolver, Pid, ProcessSource};

/// 进程快照索引。
#[derive(Debug, Clone)]
pub struct ProcessIndex {
    groups: HashMap<PathBuf, HashSet<Pid>>,
    captured_at: OffsetDateTime,
}

/// 索引中的一组进程（用于序列化输出）。
#[derive(Debug, Clone, Serialize)]
pub struct ProcessGroup<'a> {
    pub path: &'a Path,
    pub pids: BTreeSet<Pid>,
}

impl ProcessIndex {
    /// 枚举并解析全部进程，构建索引。
    ///
    /// 参数：
    /// - `source`：进程 ID 来源
    /// - `resolver`：可执行文件路径解析器
    ///
    /// 异常处理：
    /// - 枚举失败：返回 [`EnumerationError`]，整个构建中止
    /// - 单个 PID 解析失败：跳过该 PID 并记录日志，继续扫描（进程在扫描期间退出属于正常情况）
    pub fn build<S, R>(source: &S, resolver: &R) -> Result<Self, EnumerationError>
    where
        S: ProcessSource + ?Sized,
        R: ExePathResolver + ?Sized,
    {
        let captured_at = OffsetDateTime::now_utc();
        let pids = source.pids()?;

        // 顺序逐个解析，尽量缩短枚举与解析之间的时间窗口
        let entries = pids.into_iter().filter_map(|pid| {
            match resolver.resolve(pid) {
                Ok(path) => Some((path, pid)),
                Err(e) if e.is_skippable() => {
                    debug!(pid, error = %e, "跳过无法解析的进程");
                    None
                }
                Err(e) => {
                    warn!(pid, error = %e, "解析进程可执行文件路径异常，已跳过");
                    None
                }
            }
        });
        let index = Self::assemble(entries, captured_at);

        debug!(groups = index.len(), "进程索引构建完成");
        Ok(index)
    }

    /// 由 (路径, PID) 对直接构造索引。
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Pid)>,
    {
        Self::assemble(entries, OffsetDateTime::now_utc())
    }

    fn assemble<I>(entries: I, captured_at: OffsetDateTime) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Pid)>,
    {
        let mut groups: HashMap<PathBuf, HashSet<Pid>> = HashMap::new();
        for (path, pid) in entries {
            groups.entry(path).or_default().insert(pid);
        }
        Self {
            groups,
            captured_at,
        }
    }

    /// 查询运行指定可执行文件的进程集合。
    pub fn pids_for(&self, path: &Path) -> Option<&HashSet<Pid>> {
        self.groups.get(path)
    }

    /// 不同可执行文件路径的数量。
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn captured_at(&self) -> OffsetDateTime {
        self.captured_at
    }

    /// 按路径排序遍历全部分组。
    pub fn iter(&self) -> impl Iterator<Item = ProcessGroup<'_>> {
        let mut groups: Vec<_> = self
            .groups
            .iter()
            .map(|(path, pids)| ProcessGroup {
                path: path.as_path(),
                pids: pids.iter().copied().collect(),
            })
            .collect();
        groups.sort_by(|a, b| a.path.cmp(b.path));
        groups.into_iter()
    }

    /// 同一可执行文件存在多个进程的分组。
    pub fn duplicates(&self) -> impl Iterator<Item = ProcessGroup<'_>> {
        self.iter().filter(|g| g.pids.len() > 1)
    }
}
