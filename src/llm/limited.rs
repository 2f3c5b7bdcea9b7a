//! 并发受限的 LLM 客户端
//!
//! 包装任意 LlmClient：每次 complete 先从 AdmissionGate 取得许可，调用结束后归还。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AdmissionGate;
use crate::llm::{LlmClient, LlmError, Message};

pub struct LimitedLlmClient {
    inner: Arc<dyn LlmClient>,
    gate: AdmissionGate,
}

impl LimitedLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, gate: AdmissionGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }
}

#[async_trait]
impl LlmClient for LimitedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let _permit = self.gate.acquire().await?;
        tracing::debug!(available = self.gate.available(), "llm permit acquired");
        self.inner.complete(messages).await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// 记录同时在途的最大调用数
    struct SlowClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn test_gate_caps_outstanding_calls() {
        let inner = Arc::new(SlowClient {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let client = Arc::new(LimitedLlmClient::new(inner.clone(), AdmissionGate::new(2)));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let c = client.clone();
            handles.push(tokio::spawn(async move {
                c.complete(&[Message::user("hi")]).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "done");
        }
        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }
}
