//! Plan–Execute–Reflect 主循环
//!
//! 状态机：Planning -> Executing ⇄ Reflecting -> Terminated，轮数用尽或计划为空时经 Fallback 终止。
//! - Planning：规划调用，解析 Plan；解析失败直接终止（携带错误与原始文本），不重试
//! - Executing：弹出计划首步交给调度器，结果（含失败）追加到历史
//! - Reflecting：反思调用，解析 Action；FinalResponse 终止，Plan 替换剩余计划并计一轮
//! - Fallback：FallbackSummarizer 根据历史给出答案
//!
//! 每次求解独占自己的计划、历史与轮数，求解结束即丢弃；所有 await 顺序执行，没有并发调用。
//! 可选 events：向 CLI / Web 推送 SolverEvent。

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::core::{AgentError, Status};
use crate::llm::{LlmClient, LlmError};
use crate::solver::{ExecutionRecord, FallbackSummarizer, History, Planner, SolverEvent};
use crate::structured::{parse_action, parse_plan, Action, CapabilityArgs};
use crate::tools::Dispatcher;

/// 默认最大反思轮数
pub const DEFAULT_MAX_ROUNDS: usize = 5;
/// 步骤输出预览最大字符数
const PREVIEW_CHARS: usize = 200;

/// 求解结果：循环唯一的输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub status: Status,
    pub output: String,
}

impl SolveOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            output: output.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// 成功时为纯文本，失败时为 `{"status": "failed", "output": ...}`
    pub fn render(&self) -> String {
        if self.is_ok() {
            self.output.clone()
        } else {
            serde_json::to_string(self).unwrap_or_else(|_| self.output.clone())
        }
    }

    fn structured_error(err: AgentError, raw: &str) -> Self {
        Self::failed(format!("{err}\nRaw output:\n{raw}"))
    }

    fn llm_error(stage: &str, err: LlmError) -> Self {
        Self::failed(format!("{stage} call failed: {}", AgentError::from(err)))
    }
}

#[derive(Debug)]
enum LoopState {
    Planning,
    Executing,
    Reflecting,
    Fallback(&'static str),
    Terminated(SolveOutcome),
}

/// 单次求解的私有状态
struct Run<'a> {
    objective: &'a str,
    plan: VecDeque<String>,
    history: History,
    round: usize,
    tools: Vec<(String, String)>,
    events: Option<&'a UnboundedSender<SolverEvent>>,
}

impl Run<'_> {
    fn emit(&self, event: SolverEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn remaining(&self) -> Vec<String> {
        self.plan.iter().cloned().collect()
    }
}

pub struct LoopController {
    planner: Planner,
    summarizer: FallbackSummarizer,
    max_rounds: usize,
    executor: String,
}

impl LoopController {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            planner: Planner::new(llm.clone()),
            summarizer: FallbackSummarizer::new(llm),
            max_rounds: DEFAULT_MAX_ROUNDS,
            executor: "executor".to_string(),
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// 执行每一步所用的能力（默认 executor）
    pub fn with_executor(mut self, target: impl Into<String>) -> Self {
        self.executor = target.into();
        self
    }

    pub fn executor(&self) -> &str {
        &self.executor
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub async fn run(&self, dispatcher: &Dispatcher, objective: &str) -> SolveOutcome {
        self.run_with_events(dispatcher, objective, None).await
    }

    pub async fn run_with_events(
        &self,
        dispatcher: &Dispatcher,
        objective: &str,
        events: Option<&UnboundedSender<SolverEvent>>,
    ) -> SolveOutcome {
        let mut run = Run {
            objective,
            plan: VecDeque::new(),
            history: History::new(),
            round: 0,
            tools: self.step_tools(dispatcher),
            events,
        };
        let mut state = LoopState::Planning;
        loop {
            state = match state {
                LoopState::Planning => self.plan(&mut run).await,
                LoopState::Executing => self.execute(dispatcher, &mut run).await,
                LoopState::Reflecting => self.reflect(&mut run).await,
                LoopState::Fallback(reason) => {
                    tracing::info!(reason, records = run.history.len(), "fallback");
                    run.emit(SolverEvent::Fallback {
                        reason: reason.to_string(),
                    });
                    LoopState::Terminated(
                        self.summarizer.summarize(run.objective, &run.history).await,
                    )
                }
                LoopState::Terminated(outcome) => {
                    tracing::info!(
                        status = ?outcome.status,
                        rounds = run.round,
                        steps = run.history.len(),
                        total_tokens = self.planner.token_usage().2,
                        "solve finished"
                    );
                    run.emit(SolverEvent::Finished {
                        status: outcome.status,
                        output: outcome.output.clone(),
                    });
                    return outcome;
                }
            };
        }
    }

    /// 规划 / 反思 prompt 中列出的工具：执行能力的下级能力
    fn step_tools(&self, dispatcher: &Dispatcher) -> Vec<(String, String)> {
        let registry = dispatcher.registry();
        let Some(executor) = registry.get(&self.executor) else {
            return Vec::new();
        };
        let subs = executor.sub_capabilities();
        if subs.is_empty() {
            return vec![(self.executor.clone(), executor.description().to_string())];
        }
        registry
            .descriptions()
            .into_iter()
            .filter(|(name, _)| subs.contains(name))
            .collect()
    }

    async fn plan(&self, run: &mut Run<'_>) -> LoopState {
        let raw = match self.planner.plan(run.objective, &run.tools).await {
            Ok(raw) => raw,
            Err(e) => return LoopState::Terminated(SolveOutcome::llm_error("plan", e)),
        };
        match parse_plan(&raw) {
            Ok(plan) => {
                tracing::info!(steps = plan.steps.len(), "plan created");
                run.emit(SolverEvent::Planned {
                    steps: plan.steps.clone(),
                });
                run.plan = plan.steps.into();
                LoopState::Executing
            }
            Err(e) => {
                tracing::warn!(error = %e, "plan could not be parsed");
                LoopState::Terminated(SolveOutcome::structured_error(e, &raw))
            }
        }
    }

    async fn execute(&self, dispatcher: &Dispatcher, run: &mut Run<'_>) -> LoopState {
        let Some(step) = run.plan.pop_front() else {
            return LoopState::Fallback("plan is empty");
        };
        tracing::info!(round = run.round, step = %step, "executing step");
        run.emit(SolverEvent::StepStarted {
            round: run.round,
            step: step.clone(),
        });

        let mut args = CapabilityArgs::new(step.clone());
        if !run.history.is_empty() {
            args = args.with_arg("history", run.history.render());
        }
        let result = dispatcher.call(&self.executor, args).await;
        if !result.is_ok() {
            tracing::warn!(step = %step, output = %result.output, "step failed");
        }

        run.emit(SolverEvent::StepFinished {
            step: step.clone(),
            success: result.is_ok(),
            preview: result.output.chars().take(PREVIEW_CHARS).collect(),
        });
        run.history.push(ExecutionRecord {
            step,
            output: result.output,
            success: result.status.is_ok(),
        });
        LoopState::Reflecting
    }

    async fn reflect(&self, run: &mut Run<'_>) -> LoopState {
        let history = run.history.render();
        let remaining = run.remaining();
        let raw = match self
            .planner
            .reflect(run.objective, &history, &remaining, &run.tools)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return LoopState::Terminated(SolveOutcome::llm_error("reflect", e)),
        };
        match parse_action(&raw) {
            Ok(Action::FinalResponse(text)) => {
                tracing::info!(round = run.round, "final response");
                LoopState::Terminated(SolveOutcome::ok(text))
            }
            Ok(Action::Plan(steps)) => {
                run.round += 1;
                tracing::info!(round = run.round, steps = steps.len(), "replanned");
                run.emit(SolverEvent::Replanned {
                    round: run.round,
                    steps: steps.clone(),
                });
                run.plan = steps.into();
                if run.round < self.max_rounds {
                    LoopState::Executing
                } else {
                    LoopState::Fallback("round budget exhausted")
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reflection could not be parsed");
                LoopState::Terminated(SolveOutcome::structured_error(e, &raw))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{Capability, CapabilityRegistry};

    struct FixedExecutor(&'static str);

    #[async_trait]
    impl Capability for FixedExecutor {
        fn name(&self) -> &str {
            "executor"
        }

        fn description(&self) -> &str {
            "runs a step"
        }

        async fn call(&self, _d: &Dispatcher, _args: CapabilityArgs) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    fn dispatcher() -> Dispatcher {
        let registry = CapabilityRegistry::builder()
            .register(FixedExecutor("4"))
            .build()
            .unwrap();
        Dispatcher::new(Arc::new(registry), 5)
    }

    #[tokio::test]
    async fn test_final_response_after_one_step() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"steps": ["evaluate 2+2"]}"#,
            r#"{"action": {"response": "4"}}"#,
        ]));
        let outcome = LoopController::new(llm.clone())
            .run(&dispatcher(), "compute 2+2")
            .await;
        assert_eq!(outcome, SolveOutcome::ok("4"));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_replan_goes_to_fallback() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"steps": ["evaluate 2+2"]}"#,
            r#"{"action": {"steps": []}}"#,
            "The answer is 4.",
        ]));
        let outcome = LoopController::new(llm.clone())
            .run(&dispatcher(), "compute 2+2")
            .await;
        assert_eq!(outcome, SolveOutcome::ok("The answer is 4."));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_schema_error_in_reflection_terminates() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"steps": ["evaluate 2+2"]}"#,
            r#"{"action": {"answer": "4"}}"#,
        ]));
        let outcome = LoopController::new(llm)
            .run(&dispatcher(), "compute 2+2")
            .await;
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.output.contains("SchemaError"));
        assert!(outcome.output.contains("\"answer\""));
    }

    #[tokio::test]
    async fn test_llm_failure_terminates_with_error() {
        let llm = Arc::new(
            ScriptedLlmClient::new([r#"{"steps": ["a"]}"#])
                .then_error(LlmError::Api("rate limited".into())),
        );
        let outcome = LoopController::new(llm).run(&dispatcher(), "x").await;
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.output.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"steps": ["evaluate 2+2"]}"#,
            r#"{"action": {"response": "4"}}"#,
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        LoopController::new(llm)
            .run_with_events(&dispatcher(), "compute 2+2", Some(&tx))
            .await;
        drop(tx);
        let mut kinds = Vec::new();
        while let Some(ev) = rx.recv().await {
            kinds.push(serde_json::to_value(&ev).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds, ["planned", "step_started", "step_finished", "finished"]);
    }

    #[test]
    fn test_failed_outcome_renders_as_record() {
        let out = SolveOutcome::failed("boom");
        assert_eq!(out.render(), r#"{"status":"failed","output":"boom"}"#);
        assert_eq!(SolveOutcome::ok("4").render(), "4");
    }
}
