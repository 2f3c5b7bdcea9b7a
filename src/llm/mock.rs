//! 脚本化 LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预先排好的回复，并记录每次调用收到的消息，便于断言规划 / 反思请求的内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{last_user_content, LlmClient, LlmError, Message};

#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// 脚本耗尽后重复返回的回复
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// 在脚本末尾追加一次调用失败
    pub fn then_error(self, err: LlmError) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(err));
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 所有调用收到的消息（按调用顺序）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// 第 n 次调用中最后一条 User 消息的内容
    pub fn prompt(&self, n: usize) -> Option<String> {
        self.calls()
            .get(n)
            .and_then(|msgs| last_user_content(msgs).map(String::from))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::Unavailable("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_fallback() {
        let llm = ScriptedLlmClient::new(["a", "b"]).with_fallback("z");
        let msgs = [Message::user("q")];
        assert_eq!(llm.complete(&msgs).await.unwrap(), "a");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "b");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "z");
        assert_eq!(llm.call_count(), 3);
        assert_eq!(llm.prompt(0).as_deref(), Some("q"));
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_errors() {
        let llm = ScriptedLlmClient::new(Vec::<String>::new());
        let err = llm.complete(&[Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
