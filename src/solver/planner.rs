//! Planner：规划与反思两类推理调用
//!
//! 两者共用同一个推理引擎，只是解读输出所用的 schema 不同（Plan / Action）。
//! 这里只负责拼 prompt 并返回原始文本，解析交给 structured 模块。

use std::sync::Arc;

use crate::llm::{LlmClient, LlmError, Message};
use crate::solver::prompts;

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 初始规划：目标 -> 期望为 Plan 记录的文本
    pub async fn plan(
        &self,
        objective: &str,
        tools: &[(String, String)],
    ) -> Result<String, LlmError> {
        let messages = [
            Message::system(prompts::planner_system(tools)),
            Message::user(prompts::plan_request(objective)),
        ];
        self.llm.complete(&messages).await
    }

    /// 反思：目标 + 完整历史 + 剩余计划 -> 期望为 Action 记录的文本
    pub async fn reflect(
        &self,
        objective: &str,
        history: &str,
        remaining: &[String],
        tools: &[(String, String)],
    ) -> Result<String, LlmError> {
        let messages = [
            Message::system(prompts::reflect_system(tools)),
            Message::user(prompts::reflect_request(objective, history, remaining)),
        ];
        self.llm.complete(&messages).await
    }
}
