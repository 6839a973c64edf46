//! 单实例守护核心库（进程唯一性判定）。
//!
//! 功能：
//! - 通过 `procfs` 枚举本机进程注册表（Linux `/proc`），解析每个进程的可执行文件路径
//! - 构建“可执行文件路径 -> 进程 ID 集合”的时间点快照（[`index::ProcessIndex`]）
//! - 判定指定进程是否为同一可执行文件的唯一实例（[`query::check_unique_binary`]）
//! - 平台不支持 `/proc` 时，自动降级为外部 `ps | grep` 管道检测
//!
//! 使用约定：
//! - 结果只是调用瞬间的快照，返回“唯一”后仍可能有新实例启动
//! - 任何 [`error::QueryError`] 都表示“结论未知”，由调用方自行决定放行或拒绝
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

pub mod config;
pub mod error;
pub mod fallback;
pub mod index;
pub mod query;
pub mod registry;
pub mod strategy;

pub use config::{Config, Strictness};
pub use error::{EnumerationError, QueryError, ResolutionError};
pub use index::ProcessIndex;
pub use query::{
    check_unique_binary, check_unique_binary_with, is_unique, is_unique_name, is_unique_path,
    Singleton, Uniqueness,
};
pub use registry::{Capability, ExePathResolver, Pid, ProcessSource, Procfs};
pub use strategy::{detect_strategy, InstanceStrategy, ProcfsStrategy, PsPipelineStrategy};
