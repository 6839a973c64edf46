//! 进程注册表访问（Linux `/proc`，基于 `procfs` crate）。
//!
//! 实现策略：
//! - 枚举：`procfs::process::all_processes_with_root` 列出注册表根目录下的数字条目
//! - 解析：读取 `<root>/<pid>/exe` 符号链接，得到进程对应的可执行文件路径
//! - 只解引用一次符号链接，不校验目标文件是否仍存在（被删除的二进制会带 ` (deleted)` 后缀）
//!
//! 抽象：
//! - [`ProcessSource`] 与 [`ExePathResolver`] 两个 trait 分离“枚举”与“解析”，便于测试替换
//! - 非 Linux 平台上 [`Procfs`] 恒为不可用，由上层选择外部管道降级
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::PathBuf;

use tracing::debug;

use crate::error::{EnumerationError, ResolutionError};

/// 进程 ID（与 [`std::process::id`] 保持一致的类型）。
pub type Pid = u32;

/// 默认的进程注册表根目录。
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// 可枚举当前可见进程 ID 的来源。
pub trait ProcessSource {
    /// 列出当前可见的全部进程 ID（顺序不保证）。
    fn pids(&self) -> Result<Vec<Pid>, EnumerationError>;
}

/// 进程 ID -> 可执行文件路径的解析器。
pub trait ExePathResolver {
    /// 解析进程对应的可执行文件绝对路径。
    fn resolve(&self, pid: Pid) -> Result<PathBuf, ResolutionError>;
}

/// 注册表能力探测结果。
#[derive(Debug)]
pub enum Capability {
    /// 可列出，且存在 `exe` 链接。
    Supported,
    /// 根目录不存在，或没有任何条目提供 `exe` 链接（非 Linux、被沙箱屏蔽等）。
    Unsupported,
    /// 根目录存在但无法列出（权限等），属于致命错误。
    Unreadable(EnumerationError),
}

/// 基于 procfs 目录的进程注册表。
#[derive(Debug, Clone)]
pub struct Procfs {
    root: PathBuf,
}

impl Default for Procfs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl Procfs {
    /// 以指定目录作为注册表根目录。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 探测该注册表是否可用。
    ///
    /// 返回值：
    /// - [`Capability::Supported`]：至少一个数字条目的 `exe` 链接可读取（或因权限拒绝而确知存在）
    /// - [`Capability::Unsupported`]：根目录不存在，或没有任何条目提供 `exe` 链接
    /// - [`Capability::Unreadable`]：根目录存在但无法列出，不得降级为“平台不支持”
    pub fn probe(&self) -> Capability {
        let pids = match self.pids() {
            Ok(pids) => pids,
            Err(EnumerationError::NotFound(_)) => {
                debug!(root = %self.root.display(), "进程注册表不存在");
                return Capability::Unsupported;
            }
            Err(e) => return Capability::Unreadable(e),
        };
        let supported = pids.iter().any(|&pid| {
            matches!(
                self.resolve(pid),
                Ok(_) | Err(ResolutionError::PermissionDenied { .. })
            )
        });
        debug!(root = %self.root.display(), supported, "探测进程注册表");
        if supported {
            Capability::Supported
        } else {
            Capability::Unsupported
        }
    }
}

#[cfg(target_os = "linux")]
impl ProcessSource for Procfs {
    fn pids(&self) -> Result<Vec<Pid>, EnumerationError> {
        let processes = ::procfs::process::all_processes_with_root(&self.root)
            .map_err(|e| enumeration_error(&self.root, e))?;

        let mut pids = Vec::new();
        for process in processes {
            match process {
                Ok(process) => {
                    if let Some(pid) = Pid::try_from(process.pid()).ok().filter(|&pid| pid > 0) {
                        pids.push(pid);
                    }
                }
                // 列出之后、打开之前退出的进程
                Err(e) => debug!(error = %e, "跳过无法打开的注册表条目"),
            }
        }
        Ok(pids)
    }
}

#[cfg(target_os = "linux")]
impl ExePathResolver for Procfs {
    fn resolve(&self, pid: Pid) -> Result<PathBuf, ResolutionError> {
        ::procfs::process::Process::new_with_root(self.root.join(pid.to_string()))
            .and_then(|process| process.exe())
            .map_err(|e| resolution_error(pid, e))
    }
}

#[cfg(not(target_os = "linux"))]
impl ProcessSource for Procfs {
    fn pids(&self) -> Result<Vec<Pid>, EnumerationError> {
        Err(EnumerationError::NotFound(self.root.clone()))
    }
}

#[cfg(not(target_os = "linux"))]
impl ExePathResolver for Procfs {
    fn resolve(&self, pid: Pid) -> Result<PathBuf, ResolutionError> {
        Err(ResolutionError::Unsupported { pid })
    }
}

#[cfg(target_os = "linux")]
fn enumeration_error(root: &std::path::Path, e: ::procfs::ProcError) -> EnumerationError {
    use ::procfs::ProcError;

    let root = root.to_path_buf();
    match e {
        ProcError::NotFound(_) => EnumerationError::NotFound(root),
        ProcError::PermissionDenied(_) => EnumerationError::PermissionDenied(root),
        ProcError::Io(source, _) => EnumerationError::Io { root, source },
        other => EnumerationError::Other {
            root,
            reason: other.to_string(),
        },
    }
}

/// `Incomplete` 出现在进程退出过程中，与 `NotFound` 同样处理。
#[cfg(target_os = "linux")]
fn resolution_error(pid: Pid, e: ::procfs::ProcError) -> ResolutionError {
    use ::procfs::ProcError;

    match e {
        ProcError::NotFound(_) | ProcError::Incomplete(_) => ResolutionError::NotFound { pid },
        ProcError::PermissionDenied(_) => ResolutionError::PermissionDenied { pid },
        ProcError::Io(source, _) => ResolutionError::Io { pid, source },
        other => ResolutionError::Other {
            pid,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 根目录不存在时，枚举应返回 `NotFound`，探测应判定为不支持。
    fn missing_root_is_unsupported() {
        let procfs = Procfs::new("/nonexistent/singleton-proc-root");
        let err = procfs.pids().unwrap_err();
        assert!(matches!(err, EnumerationError::NotFound(_)));
        assert!(matches!(procfs.probe(), Capability::Unsupported));
    }

    #[cfg(target_os = "linux")]
    #[test]
    /// 在真实 `/proc` 上，当前进程应能解析到自身可执行文件。
    fn resolves_own_pid_on_linux() {
        let procfs = Procfs::default();
        assert!(matches!(procfs.probe(), Capability::Supported));
        let path = procfs.resolve(std::process::id()).unwrap();
        let current = std::env::current_exe().unwrap();
        assert_eq!(path, current);
        assert!(procfs.pids().unwrap().contains(&std::process::id()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn vanished_pid_is_not_found() {
        let procfs = Procfs::default();
        // 大于内核 pid_max 上限，必然不存在
        let err = procfs.resolve(1_073_741_823).unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound { .. }));
    }
}
