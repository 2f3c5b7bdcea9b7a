//! 意图路由
//!
//! route(query, observation)：
//! - 有观察结果且其中没有路由记录：观察结果就是最终答案，原样返回
//! - 观察结果本身是路由记录：按该记录继续路由
//! - 否则对 query 分类：先快速关键词匹配（不调用 LLM），再可选地让 LLM 输出路由记录；
//!   分类失败或标签未知时归为 multi_step（task_solver）
//!
//! 路由器无状态，从不向用户追问。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, Message};
use crate::solver::prompts;
use crate::structured::{decode_routing, extract_record, parse_routing, CapabilityArgs, RoutingDecision};

/// 固定的意图标签表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FileOps,
    Math,
    HttpFetch,
    WebSearch,
    CodeExec,
    NlpText,
    SysCheck,
    TimeQuery,
    Fallback,
    MultiStep,
    Multimedia,
}

impl Intent {
    pub const ALL: [Intent; 11] = [
        Intent::FileOps,
        Intent::Math,
        Intent::HttpFetch,
        Intent::WebSearch,
        Intent::CodeExec,
        Intent::NlpText,
        Intent::SysCheck,
        Intent::TimeQuery,
        Intent::Fallback,
        Intent::MultiStep,
        Intent::Multimedia,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Intent::FileOps => "file_ops",
            Intent::Math => "math",
            Intent::HttpFetch => "http_fetch",
            Intent::WebSearch => "web_search",
            Intent::CodeExec => "code_exec",
            Intent::NlpText => "nlp_text",
            Intent::SysCheck => "sys_check",
            Intent::TimeQuery => "time_query",
            Intent::Fallback => "fallback",
            Intent::MultiStep => "multi_step",
            Intent::Multimedia => "multimedia",
        }
    }

    /// 意图对应的能力名
    pub fn target(self) -> &'static str {
        match self {
            Intent::FileOps => "file_agent",
            Intent::Math => "math_agent",
            Intent::HttpFetch => "http_agent",
            Intent::WebSearch => "search_agent",
            Intent::CodeExec => "shell_agent",
            Intent::NlpText => "string_agent",
            Intent::SysCheck => "system_agent",
            Intent::TimeQuery => "time_agent",
            Intent::Fallback => "master",
            Intent::MultiStep => "task_solver",
            Intent::Multimedia => "multimodal_agent",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|i| i.label() == label)
    }

    pub fn from_target(target: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.target() == target)
    }
}

/// 路由结果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// 最终答案，原样返回
    Final(String),
    /// 交给某个能力处理
    Route(RoutingDecision),
}

pub struct IntentRouter {
    llm: Option<Arc<dyn LlmClient>>,
    /// 启用快速规则匹配（不调用 LLM）
    enable_fast_match: bool,
}

impl IntentRouter {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            llm,
            enable_fast_match: true,
        }
    }

    pub fn with_fast_match(mut self, enabled: bool) -> Self {
        self.enable_fast_match = enabled;
        self
    }

    pub async fn route(&self, query: &str, observation: Option<&str>) -> RouteOutcome {
        if let Some(obs) = observation {
            return match extract_record(obs).and_then(decode_routing) {
                Ok(decision) => RouteOutcome::Route(decision),
                Err(_) => RouteOutcome::Final(obs.to_string()),
            };
        }
        RouteOutcome::Route(self.classify(query).await)
    }

    /// 分类并生成路由决策；决策总是携带原始 query
    pub async fn classify(&self, query: &str) -> RoutingDecision {
        if self.enable_fast_match {
            if let Some((intent, reason)) = fast_match(query) {
                return decision(intent, query, reason);
            }
        }
        match self.llm_classify(query).await {
            Ok((intent, reason)) => decision(intent, query, &reason),
            Err(e) => {
                tracing::warn!(error = %e, "intent classification failed, using multi_step");
                decision(Intent::MultiStep, query, "classification unavailable")
            }
        }
    }

    async fn llm_classify(&self, query: &str) -> Result<(Intent, String), String> {
        let llm = self.llm.as_ref().ok_or("no reasoning engine configured")?;
        let messages = [
            Message::system(prompts::router_system()),
            Message::user(query.to_string()),
        ];
        let output = llm.complete(&messages).await.map_err(|e| e.to_string())?;
        let routed = parse_routing(&output).map_err(|e| e.to_string())?;

        let meta = routed.arguments.meta.unwrap_or_default();
        let intent = Intent::from_label(&meta.intent)
            .or_else(|| Intent::from_target(&routed.tool_name))
            .ok_or_else(|| format!("unknown intent '{}'", meta.intent))?;
        let reason = if meta.reason.trim().is_empty() {
            "classified by reasoning engine".to_string()
        } else {
            meta.reason
        };
        Ok((intent, reason))
    }
}

fn decision(intent: Intent, query: &str, reason: &str) -> RoutingDecision {
    RoutingDecision::new(
        intent.target(),
        CapabilityArgs::new(query).with_meta(intent.label(), reason),
    )
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 快速规则匹配（不调用 LLM）；只处理明确的单一意图，拿不准就交给 LLM
fn fast_match(input: &str) -> Option<(Intent, &'static str)> {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    const GREETINGS: &[&str] = &["hi", "hello", "hey", "你好", "您好", "嗨", "早上好", "晚上好"];
    let bare = lower.trim_end_matches(['!', '！', '.', '。', '~']);
    if GREETINGS.contains(&bare) {
        return Some((Intent::Fallback, "greeting"));
    }

    if contains_any(&lower, &["图片", "音频", "视频", ".pdf", ".png", ".jpg", "image", "audio", "video"]) {
        return Some((Intent::Multimedia, "mentions media content"));
    }

    if lower.contains("http://") || lower.contains("https://") {
        return Some((Intent::HttpFetch, "contains a URL"));
    }

    if lower.starts_with("搜索")
        || lower.starts_with("search")
        || lower.starts_with("百度")
        || lower.starts_with("查一下")
        || lower.starts_with("帮我查")
    {
        return Some((Intent::WebSearch, "explicit search request"));
    }

    if lower.starts_with("运行")
        || lower.starts_with("执行")
        || lower.starts_with("run ")
        || lower.starts_with("bash")
        || lower.starts_with('$')
    {
        return Some((Intent::CodeExec, "explicit command execution"));
    }

    if contains_any(&lower, &["读取文件", "写入文件", "read file", "write file", "data.txt"]) {
        return Some((Intent::FileOps, "file operation keywords"));
    }

    if contains_any(&lower, &["提取url", "提取链接", "找出邮箱", "提取邮箱", "extract url", "extract email"]) {
        return Some((Intent::NlpText, "text extraction keywords"));
    }

    if contains_any(&lower, &["系统信息", "cpu", "内存使用", "system info"]) {
        return Some((Intent::SysCheck, "system inspection keywords"));
    }

    if contains_any(&lower, &["现在几点", "几点了", "转换时区", "what time", "timezone"]) {
        return Some((Intent::TimeQuery, "time keywords"));
    }

    if lower.starts_with("计算") || lower.starts_with("calculate") || lower.starts_with("compute") {
        return Some((Intent::Math, "explicit calculation"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn router() -> IntentRouter {
        IntentRouter::new(None)
    }

    #[tokio::test]
    async fn test_plain_observation_is_final_verbatim() {
        let out = router().route("Numpy random.rand 分布?", Some("均匀分布")).await;
        assert_eq!(out, RouteOutcome::Final("均匀分布".to_string()));
    }

    #[tokio::test]
    async fn test_non_routing_record_observation_is_final() {
        let obs = r#"{"status": 200, "content": "ok"}"#;
        let out = router().route("fetch", Some(obs)).await;
        assert_eq!(out, RouteOutcome::Final(obs.to_string()));
    }

    #[tokio::test]
    async fn test_routing_record_observation_is_routed() {
        let obs = r#"{"tool_name": "task_solver", "arguments": {"query": "re-plan the search"}}"#;
        match router().route("q", Some(obs)).await {
            RouteOutcome::Route(d) => {
                assert_eq!(d.tool_name, "task_solver");
                assert_eq!(d.arguments.query, "re-plan the search");
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[test]
    fn test_fast_match_table() {
        let cases = [
            ("你好", Intent::Fallback),
            ("Hello!", Intent::Fallback),
            ("打开 https://example.com", Intent::HttpFetch),
            ("搜索 Rust 异步编程", Intent::WebSearch),
            ("运行 ls -la", Intent::CodeExec),
            ("读取文件 data.txt", Intent::FileOps),
            ("找出邮箱 a@b.com", Intent::NlpText),
            ("查看系统信息", Intent::SysCheck),
            ("现在几点", Intent::TimeQuery),
            ("计算 3*7", Intent::Math),
            ("这张图片里有什么", Intent::Multimedia),
        ];
        for (input, expected) in cases {
            assert_eq!(fast_match(input).map(|(i, _)| i), Some(expected), "{input}");
        }
        assert!(fast_match("京东金融提供了哪些服务？").is_none());
    }

    #[tokio::test]
    async fn test_unmatched_without_llm_goes_to_task_solver() {
        let query = "京东金融提供了哪些服务？";
        match router().route(query, None).await {
            RouteOutcome::Route(d) => {
                assert_eq!(d.tool_name, "task_solver");
                assert_eq!(d.arguments.query, query);
                assert_eq!(d.arguments.meta.unwrap().intent, "multi_step");
            }
            other => panic!("expected route, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_llm_classification() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool_name": "search_agent", "arguments": {"query": "x", "meta": {"intent": "web_search", "reason": "needs lookup"}}}"#,
        ]));
        let router = IntentRouter::new(Some(llm));
        let d = router.classify("谁是 Rust 的作者").await;
        assert_eq!(d.tool_name, "search_agent");
        assert_eq!(d.arguments.query, "谁是 Rust 的作者");
        assert_eq!(d.arguments.meta.unwrap().reason, "needs lookup");
    }

    #[tokio::test]
    async fn test_llm_unknown_label_goes_to_multi_step() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool_name": "python_agent", "arguments": {"query": "x", "meta": {"intent": "python"}}}"#,
        ]));
        let d = IntentRouter::new(Some(llm)).classify("something").await;
        assert_eq!(d.tool_name, "task_solver");
    }

    #[test]
    fn test_label_target_table() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
            assert_eq!(Intent::from_target(intent.target()), Some(intent));
        }
    }
}
