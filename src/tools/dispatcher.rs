//! 能力调度器
//!
//! 持有只读注册表与单次调用超时：call(target, args) 在超时内调用能力，
//! 未知目标、能力报错、超时都转为 status=failed 的 CapabilityResult，失败详情写入 output，
//! 交给下一轮反思处理而不是中止循环。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::core::{AgentError, Status};
use crate::structured::CapabilityArgs;
use crate::tools::CapabilityRegistry;

/// 一次能力调用的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub output: String,
    pub status: Status,
}

impl CapabilityResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status: Status::Ok,
        }
    }

    pub fn failed(err: &AgentError) -> Self {
        Self {
            output: err.to_string(),
            status: Status::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// 调度器：对叶子能力施加超时，并将结果映射为 CapabilityResult
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    timeout: Duration,
    default_target: String,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            default_target: "executor".to_string(),
        }
    }

    /// 未指定目标时使用的能力（默认 executor）
    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn default_target(&self) -> &str {
        &self.default_target
    }

    /// 以步骤描述为参数调用目标能力；target 为 None 时交给默认目标
    pub async fn dispatch(&self, step: &str, target: Option<&str>) -> CapabilityResult {
        let target = target.unwrap_or(&self.default_target);
        self.call(target, CapabilityArgs::new(step)).await
    }

    /// 调用指定能力；任何失败都折叠为 status=failed
    pub async fn call(&self, target: &str, args: CapabilityArgs) -> CapabilityResult {
        let start = Instant::now();
        let query_preview = preview(&args.query);
        let result = self.invoke(target, args).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::CapabilityTimeout(_)) => "timeout",
            Err(AgentError::UnknownCapability(_)) => "unknown",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": target,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "query_preview": query_preview,
        });
        tracing::info!(audit = %audit, "capability");

        match result {
            Ok(output) => CapabilityResult::ok(output),
            Err(e) => CapabilityResult::failed(&e),
        }
    }

    async fn invoke(&self, target: &str, args: CapabilityArgs) -> Result<String, AgentError> {
        let capability = self
            .registry
            .get(target)
            .ok_or_else(|| AgentError::UnknownCapability(target.to_string()))?;

        let to_failure = |reason: String| AgentError::CapabilityFailed {
            name: target.to_string(),
            reason,
        };

        // 组合能力内部会再次经过调度器，外层不加超时
        if !capability.sub_capabilities().is_empty() {
            return capability.call(self, args).await.map_err(to_failure);
        }

        match timeout(self.timeout, capability.call(self, args)).await {
            Ok(result) => result.map_err(to_failure),
            Err(_) => Err(AgentError::CapabilityTimeout(target.to_string())),
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::tools::Capability;

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the query"
        }

        async fn call(&self, _d: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
            Ok(args.query)
        }
    }

    struct Broken;

    #[async_trait]
    impl Capability for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn call(&self, _d: &Dispatcher, _args: CapabilityArgs) -> Result<String, String> {
            Err("disk on fire".to_string())
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Capability for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Never finishes in time"
        }

        async fn call(&self, _d: &Dispatcher, _args: CapabilityArgs) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = CapabilityRegistry::builder()
            .register(Echo)
            .register(Broken)
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(registry), 30).with_default_target("echo")
    }

    #[tokio::test]
    async fn test_dispatch_to_default_target() {
        let result = dispatcher().dispatch("hello", None).await;
        assert_eq!(result, CapabilityResult::ok("hello"));
    }

    #[tokio::test]
    async fn test_handler_error_is_folded() {
        let result = dispatcher().dispatch("x", Some("broken")).await;
        assert_eq!(result.status, Status::Failed);
        assert!(result.output.contains("disk on fire"));
        assert!(result.output.contains("broken"));
    }

    #[tokio::test]
    async fn test_unknown_target_is_folded() {
        let result = dispatcher().dispatch("x", Some("nope")).await;
        assert_eq!(result.status, Status::Failed);
        assert!(result.output.contains("Unknown capability: nope"));
    }

    #[tokio::test]
    async fn test_timeout_is_folded() {
        let registry = CapabilityRegistry::builder().register(Sleepy).build().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(registry), 0);
        let result = dispatcher.dispatch("x", Some("sleepy")).await;
        assert_eq!(result.status, Status::Failed);
        assert!(result.output.contains("timed out"));
    }
}
