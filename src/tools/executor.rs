//! 步骤执行器（能力名 executor）
//!
//! 针对计划中的单个步骤跑一个小型 ReAct 循环：LLM 输出路由记录即调用对应下级能力，
//! 观察结果写回对话；输出纯文本即视为本步答案。最多调用 max_steps 次工具。
//! 下级能力必须是 sub_capabilities 中声明过的名字，其它名字作为观察反馈给 LLM 而不调用。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message};
use crate::solver::prompts;
use crate::structured::{parse_routing, CapabilityArgs};
use crate::tools::{Capability, Dispatcher};

/// 默认单步内最多工具调用次数
pub const DEFAULT_EXECUTOR_MAX_STEPS: usize = 6;
/// Observation 写回对话时的最大字符数
const OBSERVATION_MAX_CHARS: usize = 4000;

pub struct StepExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Vec<String>,
    max_steps: usize,
}

impl StepExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Vec<String>) -> Self {
        Self {
            llm,
            tools,
            max_steps: DEFAULT_EXECUTOR_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    fn tool_descriptions(&self, dispatcher: &Dispatcher) -> Vec<(String, String)> {
        dispatcher
            .registry()
            .descriptions()
            .into_iter()
            .filter(|(name, _)| self.tools.contains(name))
            .collect()
    }
}

fn clip(s: &str) -> String {
    if s.chars().count() > OBSERVATION_MAX_CHARS {
        format!("{}...[truncated]", s.chars().take(OBSERVATION_MAX_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}

#[async_trait]
impl Capability for StepExecutor {
    fn name(&self) -> &str {
        "executor"
    }

    fn description(&self) -> &str {
        "Execute a single plan step by choosing and calling the most appropriate tool. Args: {\"query\": \"the step\", \"history\": \"optional previous results\"}"
    }

    fn sub_capabilities(&self) -> Vec<String> {
        self.tools.clone()
    }

    async fn call(&self, dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let system = prompts::executor_system(&self.tool_descriptions(dispatcher));
        let mut messages = vec![
            Message::system(system),
            Message::user(prompts::executor_request(&args.query, args.str_arg("history"))),
        ];
        let mut last_observation = None;

        for step in 0..self.max_steps {
            let output = self
                .llm
                .complete(&messages)
                .await
                .map_err(|e| format!("executor LLM call failed: {e}"))?;

            let decision = match parse_routing(&output) {
                Ok(decision) => decision,
                // 没有工具调用记录：纯文本即答案
                Err(_) => return Ok(output.trim().to_string()),
            };

            let observation = if self.tools.contains(&decision.tool_name) {
                tracing::debug!(step, tool = %decision.tool_name, "executor tool call");
                let result = dispatcher.call(&decision.tool_name, decision.arguments).await;
                let status = if result.is_ok() { "ok" } else { "failed" };
                format!(
                    "Observation from {} [{status}]: {}",
                    decision.tool_name,
                    clip(&result.output)
                )
            } else {
                tracing::warn!(tool = %decision.tool_name, "executor chose unavailable tool");
                format!(
                    "Tool '{}' is not available. Choose one of: {}",
                    decision.tool_name,
                    self.tools.join(", ")
                )
            };
            messages.push(Message::assistant(output));
            messages.push(Message::user(observation.clone()));
            last_observation = Some(observation);
        }

        Err(format!(
            "step not completed within {} tool calls; last observation: {}",
            self.max_steps,
            last_observation.unwrap_or_default()
        ))
    }
}
