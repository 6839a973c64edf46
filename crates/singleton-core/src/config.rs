//! 运行配置（JSON 文件 + 默认值）。
//!
//! 字段均可省略，省略时取 [`Config::default`] 中的默认值。
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::registry::DEFAULT_PROC_ROOT;

/// “唯一”的判定口径。
///
/// 说明：
/// - `Strict`：路径分组恰好一个进程，且该进程就是被查询的 PID
/// - `AnyMember`：路径分组恰好一个进程即可，不要求是被查询的 PID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    #[default]
    Strict,
    AnyMember,
}

/// 唯一性检测配置。
///
/// 字段说明：
/// - `proc_root`：进程注册表根目录（默认 `/proc`）
/// - `strictness`：唯一性判定口径
/// - `fallback_timeout_ms`：外部 `ps` 管道的超时时间（毫秒）
/// - `force_fallback`：跳过 procfs 探测，直接使用外部管道
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proc_root: PathBuf,
    pub strictness: Strictness,
    pub fallback_timeout_ms: u64,
    pub force_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            strictness: Strictness::Strict,
            fallback_timeout_ms: 5_000,
            force_fallback: false,
        }
    }
}

impl Config {
    /// 读取并解析 JSON 配置文件。
    ///
    /// 异常处理：
    /// - 文件读取失败（不存在/权限/IO）返回错误
    /// - JSON 解析失败返回错误
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("读取配置失败: {}", path.display()))?;
        let config: Config = serde_json::from_slice(&bytes)
            .with_context(|| format!("解析配置 JSON 失败: {}", path.display()))?;
        Ok(config)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 空对象应全部取默认值。
    fn empty_json_uses_defaults() {
        let c: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(c.proc_root, PathBuf::from("/proc"));
        assert_eq!(c.strictness, Strictness::Strict);
        assert_eq!(c.fallback_timeout(), Duration::from_secs(5));
        assert!(!c.force_fallback);
    }

    #[test]
    fn strictness_is_snake_case() {
        let c: Config =
            serde_json::from_str(r#"{ "strictness": "any_member", "fallback_timeout_ms": 250 }"#)
                .unwrap();
        assert_eq!(c.strictness, Strictness::AnyMember);
        assert_eq!(c.fallback_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(Config::load(Path::new("/nonexistent/singleton.json")).is_err());
    }
}
