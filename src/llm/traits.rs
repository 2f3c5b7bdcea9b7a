//! 推理引擎抽象
//!
//! 对编排核心而言推理引擎是黑盒：消息进，文本出。所有后端（OpenAI 兼容 / 脚本化测试客户端）
//! 实现 LlmClient；并发上限由 LimitedLlmClient 统一施加。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 推理引擎调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Request build error: {0}")]
    Request(String),

    /// 端点不可用（准入闸门关闭、脚本耗尽等）
    #[error("Endpoint unavailable: {0}")]
    Unavailable(String),
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条回复文本
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
