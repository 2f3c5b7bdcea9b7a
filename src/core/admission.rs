//! 推理端点准入控制
//!
//! 所有请求共享同一个推理端点；用固定容量的 Semaphore 限制同时在途的调用数，
//! 与是哪个规划循环发起的调用无关。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::llm::LlmError;

/// 固定容量的准入闸门（默认 4，与推理服务的并发上限一致）
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前可立即获得的许可数
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 等待一个许可；许可在返回值 drop 时归还
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, LlmError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LlmError::Unavailable("admission gate closed".to_string()))
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(4)
    }
}
