//! 记录 schema：Plan / Action / RoutingDecision 的解码与格式说明
//!
//! - Plan：`{"steps": [...]}`，非空且每步非空
//! - Action：`{"action": {"response": ...}}` 或 `{"action": {"steps": [...]}}`，按 response、steps 顺序尝试
//! - RoutingDecision：`{"tool_name": ..., "arguments": {"query": ..., "meta": {...}, ...}}`
//!
//! 格式说明由 schemars 从线上格式类型生成，拼入 prompt，减少推理引擎输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::structured::extract_record;

/// 按顺序执行的步骤列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// different steps to follow, should be in sorted order
    pub steps: Vec<String>,
}

impl Plan {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }

    /// 线上格式（紧凑 JSON）
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"steps\": []}".to_string())
    }

    fn validate(&self) -> Result<(), AgentError> {
        if self.steps.is_empty() {
            return Err(AgentError::Schema("plan has no steps".to_string()));
        }
        validate_steps(&self.steps)
    }
}

fn validate_steps(steps: &[String]) -> Result<(), AgentError> {
    match steps.iter().position(|s| s.trim().is_empty()) {
        Some(i) => Err(AgentError::Schema(format!("step {} is empty", i + 1))),
        None => Ok(()),
    }
}

/// 反思结果：要么给出最终回复，要么给出新的计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    FinalResponse(String),
    /// 新计划；可以为空，表示没有剩余步骤
    Plan(Vec<String>),
}

/// Action 的线上格式（解码与 schema 生成共用）
#[derive(Debug, Deserialize, JsonSchema)]
struct ActionRecord {
    /// Action to perform. If you want to respond to user, use Response.
    /// If you need to further use tools to get the answer, use Plan.
    action: ActionBody,
}

/// untagged：按声明顺序尝试，response 优先于 steps
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
enum ActionBody {
    /// Response to user.
    Response { response: String },
    /// Plan to follow in future.
    Plan { steps: Vec<String> },
}

/// 路由决策附带的元信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteMeta {
    /// one of the intent labels
    #[serde(default)]
    pub intent: String,
    /// short one-line justification
    #[serde(default)]
    pub reason: String,
}

/// 能力调用参数：query 必带，其余参数（url、path、headers 等）平铺在 extra 中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RouteMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CapabilityArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, intent: impl Into<String>, reason: impl Into<String>) -> Self {
        self.meta = Some(RouteMeta {
            intent: intent.into(),
            reason: reason.into(),
        });
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// 读取字符串参数；空白视为缺省
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 路由决策 / 工具调用记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tool_name: String,
    pub arguments: CapabilityArgs,
}

impl RoutingDecision {
    pub fn new(tool_name: impl Into<String>, arguments: CapabilityArgs) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 路由决策的格式说明类型（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct RoutingFormat {
    /// name of the agent or tool to call
    tool_name: String,
    arguments: RoutingArgumentsFormat,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct RoutingArgumentsFormat {
    /// the user query or next-step instruction
    query: String,
    meta: Option<RouteMeta>,
}

pub fn decode_plan(record: &str) -> Result<Plan, AgentError> {
    let plan: Plan = serde_json::from_str(record)
        .map_err(|e| AgentError::Schema(format!("invalid plan record: {e}")))?;
    plan.validate()?;
    Ok(plan)
}

pub fn decode_action(record: &str) -> Result<Action, AgentError> {
    let parsed: ActionRecord = serde_json::from_str(record).map_err(|e| {
        AgentError::Schema(format!(
            "action matches neither response nor steps: {e}"
        ))
    })?;
    match parsed.action {
        ActionBody::Response { response } => Ok(Action::FinalResponse(response)),
        ActionBody::Plan { steps } => {
            validate_steps(&steps)?;
            Ok(Action::Plan(steps))
        }
    }
}

pub fn decode_routing(record: &str) -> Result<RoutingDecision, AgentError> {
    let decision: RoutingDecision = serde_json::from_str(record)
        .map_err(|e| AgentError::Schema(format!("invalid routing record: {e}")))?;
    if decision.tool_name.trim().is_empty() {
        return Err(AgentError::Schema("tool_name is empty".to_string()));
    }
    Ok(decision)
}

/// extract + decode_plan
pub fn parse_plan(text: &str) -> Result<Plan, AgentError> {
    decode_plan(extract_record(text)?)
}

/// extract + decode_action
pub fn parse_action(text: &str) -> Result<Action, AgentError> {
    decode_action(extract_record(text)?)
}

/// extract + decode_routing
pub fn parse_routing(text: &str) -> Result<RoutingDecision, AgentError> {
    decode_routing(extract_record(text)?)
}

fn format_instructions(schema: schemars::schema::RootSchema) -> String {
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\
         Output only the JSON object, without markdown fences or extra text.\n\n{schema}"
    )
}

pub fn plan_format_instructions() -> String {
    format_instructions(schema_for!(Plan))
}

pub fn action_format_instructions() -> String {
    format_instructions(schema_for!(ActionRecord))
}

pub fn routing_format_instructions() -> String {
    format_instructions(schema_for!(RoutingFormat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_round_trip() {
        let plans = [
            Plan::new(["evaluate 2+2 via math handler"]),
            Plan::new(["search \"quoted\" name", "读取文件 data.txt", "line\nbreak"]),
        ];
        for plan in plans {
            assert_eq!(parse_plan(&plan.render()).unwrap(), plan);
        }
    }

    #[test]
    fn test_plan_with_prose_and_fence() {
        let raw = "Sure!\n```json\n{\"steps\": [\"one\", \"two\"]}\n```";
        assert_eq!(parse_plan(raw).unwrap().steps, vec!["one", "two"]);
    }

    #[test]
    fn test_empty_plan_is_schema_error() {
        let err = parse_plan(r#"{"steps": []}"#).unwrap_err();
        assert!(matches!(err, AgentError::Schema(_)));
        let err = parse_plan(r#"{"steps": ["ok", "  "]}"#).unwrap_err();
        assert!(matches!(err, AgentError::Schema(_)));
        let err = parse_plan(r#"{"step": ["a"]}"#).unwrap_err();
        assert!(matches!(err, AgentError::Schema(_)));
    }

    #[test]
    fn test_plan_without_record_is_extraction_error() {
        let err = parse_plan("I cannot plan this").unwrap_err();
        assert!(matches!(err, AgentError::Extraction(_)));
    }

    #[test]
    fn test_action_response_variant() {
        let action = parse_action(r#"{"action": {"response": "4"}}"#).unwrap();
        assert_eq!(action, Action::FinalResponse("4".to_string()));
    }

    #[test]
    fn test_action_plan_variant() {
        let action = parse_action(r#"{"action": {"steps": ["a", "b"]}}"#).unwrap();
        assert_eq!(action, Action::Plan(vec!["a".into(), "b".into()]));
        let action = parse_action(r#"{"action": {"steps": []}}"#).unwrap();
        assert_eq!(action, Action::Plan(vec![]));
    }

    #[test]
    fn test_action_response_wins_when_both_present() {
        let action =
            parse_action(r#"{"action": {"response": "done", "steps": ["x"]}}"#).unwrap();
        assert_eq!(action, Action::FinalResponse("done".to_string()));
    }

    #[test]
    fn test_action_unknown_shape_is_schema_error() {
        for raw in [
            r#"{"action": {"answer": "4"}}"#,
            r#"{"response": "4"}"#,
            r#"{"action": {"steps": "not a list"}}"#,
        ] {
            assert!(matches!(parse_action(raw), Err(AgentError::Schema(_))), "{raw}");
        }
    }

    #[test]
    fn test_routing_decision_with_meta_and_extra() {
        let raw = r#"{"tool_name": "http_agent", "arguments": {"query": "fetch", "meta": {"intent": "http_fetch", "reason": "url"}, "url": "https://example.com"}}"#;
        let d = parse_routing(raw).unwrap();
        assert_eq!(d.tool_name, "http_agent");
        assert_eq!(d.arguments.query, "fetch");
        assert_eq!(d.arguments.meta.as_ref().unwrap().intent, "http_fetch");
        assert_eq!(d.arguments.str_arg("url"), Some("https://example.com"));
    }

    #[test]
    fn test_routing_requires_tool_name() {
        let err = parse_routing(r#"{"tool_name": " ", "arguments": {"query": "q"}}"#).unwrap_err();
        assert!(matches!(err, AgentError::Schema(_)));
    }

    #[test]
    fn test_routing_render_round_trip() {
        let d = RoutingDecision::new(
            "math_agent",
            CapabilityArgs::new("1+1").with_meta("math", "arithmetic"),
        );
        assert_eq!(parse_routing(&d.render()).unwrap(), d);
    }

    #[test]
    fn test_format_instructions_mention_fields() {
        assert!(plan_format_instructions().contains("steps"));
        let action = action_format_instructions();
        assert!(action.contains("response") && action.contains("steps"));
        assert!(routing_format_instructions().contains("tool_name"));
    }
}
