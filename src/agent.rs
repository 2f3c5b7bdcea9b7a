//! Headless 运行时
//!
//! 供 CLI / HTTP 前端调用：Runtime::from_config 构建受限并发的 LLM、能力注册表、调度器、路由器与规划循环；
//! handle 对单条请求执行 路由 -> 调度 -> 带观察结果再路由 …（最多 max_hops 跳）；
//! solve 直接对目标跑规划循环。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::{AdmissionGate, AgentError};
use crate::llm::{LimitedLlmClient, LlmClient, OpenAiClient};
use crate::router::{IntentRouter, RouteOutcome};
use crate::solver::{LoopController, SolveOutcome, SolverEvent};
use crate::tools::{
    Capability, CapabilityRegistry, ChatCapability, Dispatcher, FileTool, HttpTool, MathTool,
    SearchTool, ShellTool, StepExecutor, SystemTool, TaskSolverCapability, TextTool, TimeTool,
};

/// 按配置创建 OpenAI 兼容客户端；vision 段存在时额外创建视觉模型客户端
pub fn create_llm_from_config(cfg: &AppConfig) -> (Arc<dyn LlmClient>, Option<Arc<dyn LlmClient>>) {
    let llm = &cfg.llm;
    let api_key = llm.api_key();
    if api_key.is_none() {
        tracing::warn!(env = %llm.api_key_env, "API key not set, LLM calls will fail");
    }
    let timeout = Duration::from_secs(llm.request_timeout_secs);
    let build = |base_url: Option<&str>, model: &str, key: Option<&str>| {
        let mut client = OpenAiClient::new(base_url, model, key).with_request_timeout(timeout);
        if let Some(t) = llm.temperature {
            client = client.with_temperature(t);
        }
        client
    };

    tracing::info!(model = %llm.model, base_url = ?llm.base_url, "using OpenAI-compatible LLM");
    let main: Arc<dyn LlmClient> = Arc::new(build(
        llm.base_url.as_deref(),
        &llm.model,
        api_key.as_deref(),
    ));

    let vision = llm.vision.as_ref().map(|v| {
        let key = v
            .api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .or_else(|| api_key.clone());
        let base = v.base_url.as_deref().or(llm.base_url.as_deref());
        tracing::info!(model = %v.model, "using vision model for multimodal_agent");
        Arc::new(build(base, &v.model, key.as_deref())) as Arc<dyn LlmClient>
    });
    (main, vision)
}

/// 运行时：多请求共享，内部无可变状态
pub struct Runtime {
    dispatcher: Dispatcher,
    router: IntentRouter,
    solver: Arc<LoopController>,
    max_hops: usize,
}

impl Runtime {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let (llm, vision) = create_llm_from_config(cfg);
        Self::with_llm(cfg, llm, vision)
    }

    /// 用给定的推理引擎构建（测试中传入脚本化客户端）；主模型与视觉模型共用同一个准入闸门
    pub fn with_llm(
        cfg: &AppConfig,
        llm: Arc<dyn LlmClient>,
        vision: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self, AgentError> {
        cfg.validate()?;
        let gate = AdmissionGate::new(cfg.llm.max_concurrency);
        let llm: Arc<dyn LlmClient> = Arc::new(LimitedLlmClient::new(llm, gate.clone()));
        let vision: Arc<dyn LlmClient> = match vision {
            Some(v) => Arc::new(LimitedLlmClient::new(v, gate)),
            None => llm.clone(),
        };

        let workspace = &cfg.app.workspace_root;
        if let Err(e) = std::fs::create_dir_all(workspace) {
            tracing::warn!(path = %workspace.display(), error = %e, "cannot create workspace root");
        }

        let tools = &cfg.tools;
        let leaves: Vec<Arc<dyn Capability>> = vec![
            Arc::new(MathTool::new()),
            Arc::new(TimeTool::new()),
            Arc::new(TextTool::new()),
            Arc::new(FileTool::new(workspace)),
            Arc::new(ShellTool::new(
                tools.shell.allowed_commands.clone(),
                tools.shell.timeout_secs,
            )),
            Arc::new(HttpTool::new(
                tools.http.allowed_domains.clone(),
                tools.http.timeout_secs,
                tools.http.max_result_chars,
            )),
            Arc::new(SearchTool::new(
                tools.search.endpoint.clone(),
                tools.search.timeout_secs,
                tools.search.max_result_chars,
            )),
            Arc::new(SystemTool::new()),
        ];
        let leaf_names: Vec<String> = leaves.iter().map(|c| c.name().to_string()).collect();

        let solver = Arc::new(
            LoopController::new(llm.clone())
                .with_max_rounds(cfg.solver.max_rounds)
                .with_executor(cfg.solver.executor.clone()),
        );

        let mut builder = CapabilityRegistry::builder();
        for leaf in leaves {
            builder = builder.register_arc(leaf);
        }
        let registry = builder
            .register(ChatCapability::master(llm.clone()))
            .register(ChatCapability::multimodal(vision))
            .register(
                StepExecutor::new(llm.clone(), leaf_names)
                    .with_max_steps(cfg.solver.executor_max_steps),
            )
            .register(TaskSolverCapability::new(solver.clone()))
            .build()?;
        tracing::info!(capabilities = registry.len(), "capability registry built");

        let dispatcher = Dispatcher::new(Arc::new(registry), tools.tool_timeout_secs)
            .with_default_target(cfg.solver.executor.clone());
        let router_llm = cfg.router.llm_classify.then(|| llm.clone());
        let router = IntentRouter::new(router_llm).with_fast_match(cfg.router.fast_match);

        Ok(Self {
            dispatcher,
            router,
            solver,
            max_hops: cfg.router.max_hops,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// (name, description) 列表
    pub fn capabilities(&self) -> Vec<(String, String)> {
        self.dispatcher.registry().descriptions()
    }

    /// 处理单轮请求：路由 -> 调度 -> 带观察结果再路由，直到得到最终答案或用尽跳数
    pub async fn handle(&self, query: &str, attachments: &[String]) -> SolveOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %request_id);
        self.handle_inner(query, attachments).instrument(span).await
    }

    async fn handle_inner(&self, query: &str, attachments: &[String]) -> SolveOutcome {
        let mut observation: Option<String> = None;
        let mut hops = 0;
        let mut last_target = String::new();
        loop {
            let mut decision = match self.router.route(query, observation.as_deref()).await {
                RouteOutcome::Final(text) => {
                    tracing::info!(hops, "request answered");
                    return SolveOutcome::ok(text);
                }
                RouteOutcome::Route(decision) => decision,
            };
            if hops >= self.max_hops {
                tracing::warn!(hops, target = %decision.tool_name, "hop limit reached");
                return SolveOutcome::failed(format!(
                    "hop limit ({}) reached; last target: {last_target}",
                    self.max_hops
                ));
            }
            if !attachments.is_empty() && !decision.arguments.extra.contains_key("attachments") {
                decision.arguments.extra.insert(
                    "attachments".to_string(),
                    Value::from(attachments.to_vec()),
                );
            }
            tracing::info!(
                hop = hops,
                target = %decision.tool_name,
                intent = decision.arguments.meta.as_ref().map(|m| m.intent.as_str()).unwrap_or(""),
                "routing"
            );

            let result = self
                .dispatcher
                .call(&decision.tool_name, decision.arguments)
                .await;
            hops += 1;
            last_target = decision.tool_name;
            if !result.is_ok() {
                return SolveOutcome::failed(result.output);
            }
            observation = Some(result.output);
        }
    }

    /// 直接对目标跑规划循环
    pub async fn solve(&self, objective: &str) -> SolveOutcome {
        self.solve_with_events(objective, None).await
    }

    pub async fn solve_with_events(
        &self,
        objective: &str,
        events: Option<&UnboundedSender<SolverEvent>>,
    ) -> SolveOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("solve", id = %request_id);
        self.solver
            .run_with_events(&self.dispatcher, objective, events)
            .instrument(span)
            .await
    }
}
