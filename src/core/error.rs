//! 错误类型
//!
//! 结构化输出相关的 Extraction / Schema 错误需要彼此区分：前者表示文本中找不到记录，
//! 后者表示找到了记录但字段或类型不符合预期。能力调用失败在调度层被折叠为失败结果，
//! 不会直接终止规划循环。

use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 推理引擎输出中找不到结构化记录
    #[error("ExtractionError: {0}")]
    Extraction(String),

    /// 找到记录但不符合目标 schema
    #[error("SchemaError: {0}")]
    Schema(String),

    #[error("Capability '{name}' failed: {reason}")]
    CapabilityFailed { name: String, reason: String },

    #[error("Capability '{0}' timed out")]
    CapabilityTimeout(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Capability registered twice: {0}")]
    DuplicateCapability(String),

    #[error("Capability '{capability}' depends on unknown capability '{dependency}'")]
    UnknownDependency {
        capability: String,
        dependency: String,
    },

    /// 注册表中存在循环依赖，附带环路径（a -> b -> a）
    #[error("Capability dependency cycle: {0}")]
    RegistryCycle(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 是否属于结构化输出解析失败（Extraction 或 Schema）
    pub fn is_structured(&self) -> bool {
        matches!(self, AgentError::Extraction(_) | AgentError::Schema(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_error_kind() {
        let e = AgentError::Extraction("no record".to_string());
        assert!(e.to_string().starts_with("ExtractionError"));
        let e = AgentError::Schema("missing steps".to_string());
        assert!(e.to_string().starts_with("SchemaError"));
    }

    #[test]
    fn test_is_structured() {
        assert!(AgentError::Extraction(String::new()).is_structured());
        assert!(AgentError::Schema(String::new()).is_structured());
        assert!(!AgentError::CapabilityTimeout("x".into()).is_structured());
    }
}
