//! PlanSolve - 多步任务编排器
//!
//! 模块划分：
//! - **agent**: 无头运行时（路由 -> 调度 -> 再路由；规划循环入口）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、结果状态、推理端点准入控制
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 并发受限包装 / 脚本化测试客户端）
//! - **observability**: 日志初始化
//! - **router**: 意图分类与路由
//! - **solver**: Planner、反思、兜底总结与 规划 / 执行 / 反思 主循环
//! - **structured**: 从模型输出中抽取结构化记录并按 schema 解码
//! - **tools**: 能力注册表、调度器与内置能力

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod router;
pub mod solver;
pub mod structured;
pub mod tools;

pub use agent::Runtime;
pub use solver::{LoopController, SolveOutcome};
