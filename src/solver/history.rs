//! 执行历史：单次求解内只追加，终止时丢弃

use serde::{Deserialize, Serialize};

/// 一步的执行记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step: String,
    pub output: String,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<ExecutionRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 渲染为 prompt 文本；失败步骤显式标注 failed
    pub fn render(&self) -> String {
        if self.records.is_empty() {
            return "(none)".to_string();
        }
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "Step {}: {}\nStatus: {}\nResult: {}",
                    i + 1,
                    r.step,
                    if r.success { "ok" } else { "failed" },
                    r.output
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
