//! 外部进程列表管道（`/proc` 不可用时的降级检测）。
//!
//! 等价于：
//! - `ps -axw | grep <name> | grep -v grep`
//! - 输出非空即视为已有实例在运行
//!
//! 已知限制（保留原有语义，不做“修正”）：
//! - `grep` 按子串匹配整条命令行，目标名 `app` 也会命中 `myapp-helper`
//! - 调用方自身的命令行通常也包含目标名，因此在自身查询时几乎总会报告重复
//!
//! 作者：单实例守护项目组
//! 创建时间：2026-10-19
//! 修改时间：2026-10-19

use std::collections::BTreeSet;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::QueryError;
use crate::registry::Pid;

/// 运行管道并返回命中的进程列表行（已去除首尾空白，不含空行）。
///
/// 参数：
/// - `name`：目标可执行文件名（按 `grep` 基本正则匹配）
/// - `timeout`：整个管道的最长执行时间
///
/// 异常处理：
/// - 任一命令启动失败、`ps` 非零退出、`grep` 报错（退出码 2）：返回 `FallbackPipelineFailed`
/// - 超时：终止全部子进程并返回 `FallbackPipelineFailed`
pub fn matching_lines(name: &str, timeout: Duration) -> Result<Vec<String>, QueryError> {
    if name.is_empty() {
        return Err(pipeline_error("目标名称为空"));
    }

    let mut children: Vec<Child> = Vec::with_capacity(3);
    let result = run_pipeline(name, timeout, &mut children);

    if result.is_err() {
        for child in &mut children {
            let _ = child.kill();
        }
    }
    for child in &mut children {
        let _ = child.wait();
    }
    result
}

fn run_pipeline(
    name: &str,
    timeout: Duration,
    children: &mut Vec<Child>,
) -> Result<Vec<String>, QueryError> {
    let mut ps = Command::new("ps")
        .arg("-axw")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| pipeline_error(format!("启动 ps 失败: {e}")))?;
    let ps_out = ps.stdout.take();
    children.push(ps);
    let ps_out = ps_out.ok_or_else(|| pipeline_error("无法获取 ps 输出"))?;

    let mut grep = Command::new("grep")
        .arg("-e")
        .arg(name)
        .stdin(Stdio::from(ps_out))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| pipeline_error(format!("启动 grep 失败: {e}")))?;
    let grep_out = grep.stdout.take();
    children.push(grep);
    let grep_out = grep_out.ok_or_else(|| pipeline_error("无法获取 grep 输出"))?;

    let mut exclude = Command::new("grep")
        .arg("-v")
        .arg("grep")
        .stdin(Stdio::from(grep_out))
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| pipeline_error(format!("启动 grep -v 失败: {e}")))?;
    let mut out = exclude.stdout.take();
    children.push(exclude);

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        let res = match out.as_mut() {
            Some(out) => out.read_to_string(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(res);
    });

    let output = match rx.recv_timeout(timeout) {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(pipeline_error(format!("读取管道输出失败: {e}"))),
        Err(_) => {
            warn!(?timeout, name, "外部进程列表管道超时");
            return Err(pipeline_error(format!("执行超时（{} ms）", timeout.as_millis())));
        }
    };

    let [ps, grep, exclude] = children.as_mut_slice() else {
        return Err(pipeline_error("管道子进程数量异常"));
    };
    let ps_status = ps
        .wait()
        .map_err(|e| pipeline_error(format!("等待 ps 失败: {e}")))?;
    if !ps_status.success() {
        return Err(pipeline_error(format!("ps 退出码异常: {ps_status}")));
    }
    for (label, child) in [("grep", grep), ("grep -v", exclude)] {
        let status = child
            .wait()
            .map_err(|e| pipeline_error(format!("等待 {label} 失败: {e}")))?;
        // grep 约定：0 有匹配，1 无匹配，其余为错误
        if !matches!(status.code(), Some(0) | Some(1)) {
            return Err(pipeline_error(format!("{label} 退出码异常: {status}")));
        }
    }

    let lines: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    debug!(name, matches = lines.len(), "外部进程列表管道完成");
    Ok(lines)
}

/// 从 `ps` 输出行的首列尽力解析 PID（无法解析的行忽略）。
pub fn parse_pids(lines: &[String]) -> BTreeSet<Pid> {
    lines
        .iter()
        .filter_map(|l| l.split_whitespace().next())
        .filter_map(|tok| tok.parse::<Pid>().ok())
        .collect()
}

fn pipeline_error(msg: impl Into<String>) -> QueryError {
    QueryError::FallbackPipelineFailed(msg.into())
}
