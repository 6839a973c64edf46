//! 错误类型定义。
//!
//! 分层：
//! - [`ResolutionError`]：单个进程的路径解析失败（扫描期间属于预期竞态，跳过即可）
//! - [`EnumerationError`]：无法列出进程注册表本身（致命，终止本次查询）
//! - [`QueryError`]：对调用方暴露的查询失败（结论未知，绝不折算为“唯一”）
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::Pid;

/// 单个进程可执行文件路径解析失败的原因。
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// 进程已退出（枚举与解析之间的正常竞态）。
    #[error("进程 {pid} 不存在")]
    NotFound { pid: Pid },
    /// 无权查看该进程。
    #[error("无权读取进程 {pid} 的可执行文件路径")]
    PermissionDenied { pid: Pid },
    /// 当前平台/沙箱不提供该机制。
    #[error("当前平台不支持读取进程 {pid} 的可执行文件路径")]
    Unsupported { pid: Pid },
    /// 其他 IO 错误。
    #[error("读取进程 {pid} 的可执行文件路径失败: {source}")]
    Io {
        pid: Pid,
        #[source]
        source: io::Error,
    },
    /// 注册表内容不完整或无法识别。
    #[error("读取进程 {pid} 的可执行文件路径失败: {reason}")]
    Other { pid: Pid, reason: String },
}

impl ResolutionError {
    /// 扫描期间是否可以安全跳过该进程。
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::PermissionDenied { .. })
    }
}

/// 无法列出进程注册表。
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// 注册表根目录不存在。
    #[error("进程注册表 {} 不存在", .0.display())]
    NotFound(PathBuf),
    /// 无权列出注册表根目录。
    #[error("无权列出进程注册表 {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("无法列出进程注册表 {}: {source}", .root.display())]
    Io {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("无法列出进程注册表 {}: {reason}", .root.display())]
    Other { root: PathBuf, reason: String },
}

/// 唯一性查询失败（结论未知）。
#[derive(Debug, Error)]
pub enum QueryError {
    /// 无法解析查询进程自身的可执行文件路径。
    #[error("无法解析进程 {pid} 自身的可执行文件路径: {source}")]
    SelfResolutionFailed {
        pid: Pid,
        #[source]
        source: ResolutionError,
    },
    /// 快照中找不到该路径（查询进程在两步之间退出）。
    #[error("未知的可执行文件路径 {}", .0.display())]
    UnknownBinaryPath(PathBuf),
    /// 枚举进程注册表失败。
    #[error(transparent)]
    EnumerationFailed(#[from] EnumerationError),
    /// 外部 `ps` 管道执行失败或超时。
    #[error("外部进程列表管道执行失败: {0}")]
    FallbackPipelineFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_races_and_permissions_are_skippable() {
        assert!(ResolutionError::NotFound { pid: 1 }.is_skippable());
        assert!(ResolutionError::PermissionDenied { pid: 1 }.is_skippable());
        assert!(!ResolutionError::Unsupported { pid: 1 }.is_skippable());
        assert!(!ResolutionError::Other {
            pid: 1,
            reason: "incomplete".to_string()
        }
        .is_skippable());
    }

    #[test]
    /// 枚举失败透传为查询错误，消息中保留注册表路径。
    fn enumeration_failure_converts_into_query_error() {
        let err: QueryError = EnumerationError::PermissionDenied(PathBuf::from("/proc")).into();
        assert!(matches!(
            err,
            QueryError::EnumerationFailed(EnumerationError::PermissionDenied(_))
        ));
        assert!(err.to_string().contains("/proc"));
    }
}
