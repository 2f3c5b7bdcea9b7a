//! 兜底总结：轮数用尽或计划为空时，根据目标与全部执行历史直接让推理引擎给出答案
//!
//! 原始文本即答案，不经过任何 schema。历史为空时不调用推理引擎，直接以失败结束。

use std::sync::Arc;

use crate::llm::{LlmClient, Message};
use crate::solver::prompts;
use crate::solver::{History, SolveOutcome};

pub struct FallbackSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl FallbackSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn summarize(&self, objective: &str, history: &History) -> SolveOutcome {
        if history.is_empty() {
            tracing::warn!("fallback with empty history, nothing to summarize");
            return SolveOutcome::failed("no execution history to summarize");
        }
        let messages = [
            Message::system(prompts::summary_system()),
            Message::user(prompts::summary_request(objective, &history.render())),
        ];
        match self.llm.complete(&messages).await {
            Ok(text) if !text.trim().is_empty() => SolveOutcome::ok(text),
            Ok(_) => {
                // 空总结时退回最后一步的输出
                let last = history.last().map(|r| r.output.clone()).unwrap_or_default();
                tracing::warn!("fallback summary was empty, using last step output");
                SolveOutcome::ok(last)
            }
            Err(e) => SolveOutcome::failed(format!("fallback summary failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Status;
    use crate::llm::ScriptedLlmClient;
    use crate::solver::ExecutionRecord;

    fn history() -> History {
        let mut h = History::new();
        h.push(ExecutionRecord {
            step: "look up population".into(),
            output: "about 21 million".into(),
            success: true,
        });
        h
    }

    #[tokio::test]
    async fn test_summary_text_is_returned_verbatim() {
        let llm = Arc::new(ScriptedLlmClient::new(["  Roughly 21 million.\n"]));
        let out = FallbackSummarizer::new(llm.clone())
            .summarize("population of Beijing", &history())
            .await;
        assert_eq!(out, SolveOutcome::ok("  Roughly 21 million.\n"));
        assert!(llm.prompt(0).unwrap().contains("about 21 million"));
    }

    #[tokio::test]
    async fn test_empty_history_fails_fast() {
        let llm = Arc::new(ScriptedLlmClient::new(["unused"]));
        let out = FallbackSummarizer::new(llm.clone())
            .summarize("x", &History::new())
            .await;
        assert_eq!(out.status, Status::Failed);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_summary_uses_last_output() {
        let llm = Arc::new(ScriptedLlmClient::new(["   "]));
        let out = FallbackSummarizer::new(llm).summarize("x", &history()).await;
        assert_eq!(out, SolveOutcome::ok("about 21 million"));
    }
}
