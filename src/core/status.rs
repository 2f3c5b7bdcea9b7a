//! 结果状态：能力调用与规划循环共用的 ok / failed 标记

use serde::{Deserialize, Serialize};

/// 执行状态（序列化为小写 "ok" / "failed"）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}
