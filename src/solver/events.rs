//! 求解过程事件：供 CLI / Web 展示计划、步骤执行、反思与兜底

use serde::Serialize;

use crate::core::Status;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverEvent {
    /// 初始计划
    Planned { steps: Vec<String> },
    /// 开始执行某一步
    StepStarted { round: usize, step: String },
    /// 步骤执行结束（输出预览）
    StepFinished {
        step: String,
        success: bool,
        preview: String,
    },
    /// 反思后更新的计划
    Replanned { round: usize, steps: Vec<String> },
    /// 进入兜底总结
    Fallback { reason: String },
    /// 终止
    Finished { status: Status, output: String },
}
