//! Shell 能力：白名单命令，禁止危险操作
//!
//! 仅允许配置中的命令名（首词，如 ls、grep、echo）；禁止 rm -rf、wget、chmod 777 等子串，
//! 以及命令替换、重定向和多行命令；
//! 执行通过 sh -c / cmd /C，带超时与 tracing 审计。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:",
];

/// 命令替换、重定向与多行命令：sh -c 下会绕过逐段白名单
const SHELL_META: &[(&str, &str)] = &[
    ("$(", "command substitution"),
    ("${", "parameter expansion"),
    ("`", "command substitution"),
    ("\n", "multi-line command"),
    ("\r", "multi-line command"),
    (">", "redirection"),
    ("<", "redirection"),
];

/// 路由时保留在 query 中的执行前缀（"运行 ls" -> "ls"）
const RUN_PREFIXES: &[&str] = &["运行", "执行", "run ", "bash ", "$"];

fn strip_run_prefix(query: &str) -> &str {
    let trimmed = query.trim();
    RUN_PREFIXES
        .iter()
        .find_map(|p| trimmed.strip_prefix(p))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub struct ShellTool {
    allowed_commands: HashSet<String>,
    timeout_secs: u64,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            allowed_commands: allowed_commands
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            timeout_secs,
        }
    }

    fn check(&self, raw: &str) -> Result<(), String> {
        let lower = raw.to_lowercase();
        if let Some(forbidden) = FORBIDDEN_SUBSTR.iter().find(|f| lower.contains(*f)) {
            return Err(format!("Forbidden pattern: {forbidden}"));
        }
        if let Some((_, what)) = SHELL_META.iter().find(|(m, _)| lower.contains(*m)) {
            return Err(format!("Forbidden shell syntax: {what}"));
        }
        // 管道、串联命令中的每一段都要在白名单内
        for segment in lower.split(['|', ';', '&']) {
            let Some(name) = segment.split_whitespace().next() else {
                continue;
            };
            if !self.allowed_commands.contains(name) {
                return Err(format!("Command '{name}' not in allowlist"));
            }
        }
        if lower.split_whitespace().next().is_none() {
            return Err("Empty command".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Capability for ShellTool {
    fn name(&self) -> &str {
        "shell_agent"
    }

    fn description(&self) -> &str {
        "Run an allowlisted shell command and return its output. Args: {\"query\": \"...\", \"command\": \"the command line\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let command = args
            .str_arg("command")
            .unwrap_or_else(|| strip_run_prefix(&args.query));
        self.check(command)?;
        tracing::info!(command = %command, "shell tool execute");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| format!("Command timed out after {}s", self.timeout_secs))?
            .map_err(|e| format!("Execution failed: {e}"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(format!("Exit {:?}\nstderr: {}", output.status.code(), stderr.trim()));
        }
        Ok(if stderr.trim().is_empty() {
            stdout
        } else {
            format!("{}\nstderr: {}", stdout.trim(), stderr.trim())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ShellTool {
        ShellTool::new(vec!["echo".into(), "ls".into(), "wc".into()], 5)
    }

    #[test]
    fn test_allowlist_and_forbidden() {
        let t = tool();
        assert!(t.check("echo hi").is_ok());
        assert!(t.check("ls | wc -l").is_ok());
        assert!(t.check("cat /etc/passwd").is_err());
        assert!(t.check("echo hi; curl x").is_err());
        assert!(t.check("ls && rm -rf /").unwrap_err().contains("Forbidden"));
        assert!(t.check("   ").is_err());
    }

    #[test]
    fn test_substitution_redirection_and_newlines_rejected() {
        let t = tool();
        for cmd in [
            "echo $(id)",
            "echo `id`",
            "echo ${HOME}",
            "echo hi\nid",
            "echo hi\r\nid",
            "echo x > ~/.bashrc",
            "echo x >> ~/.bashrc",
            "wc -l < /etc/shadow",
        ] {
            let err = t.check(cmd).unwrap_err();
            assert!(err.starts_with("Forbidden shell syntax"), "{cmd:?}: {err}");
        }
        assert!(t.check("echo plain text").is_ok());
    }

    #[tokio::test]
    async fn test_routed_substitution_is_not_executed() {
        use std::sync::Arc;

        use crate::tools::CapabilityRegistry;

        let registry = Arc::new(CapabilityRegistry::builder().build().unwrap());
        let dispatcher = Dispatcher::new(registry, 5);
        let args = CapabilityArgs::new("run it").with_arg("command", "echo $(id)");
        let err = tool().call(&dispatcher, args).await.unwrap_err();
        assert!(err.contains("command substitution"));
    }

    #[test]
    fn test_strip_run_prefix() {
        assert_eq!(strip_run_prefix("运行 ls -la"), "ls -la");
        assert_eq!(strip_run_prefix("$ echo hi"), "echo hi");
        assert_eq!(strip_run_prefix("echo hi"), "echo hi");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_command() {
        use std::sync::Arc;

        use crate::tools::CapabilityRegistry;

        let registry = Arc::new(CapabilityRegistry::builder().build().unwrap());
        let dispatcher = Dispatcher::new(registry, 5);
        let out = tool()
            .call(&dispatcher, CapabilityArgs::new("echo hello"))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }
}
