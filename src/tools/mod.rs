//! 能力层：注册表、调度器与内置能力
//!
//! 叶子能力：math / time / text / file / shell / http / search / system / chat；
//! 组合能力：executor（单步 ReAct）与 task_solver（规划循环）。

pub mod chat;
pub mod dispatcher;
pub mod executor;
pub mod filesystem;
pub mod http;
pub mod math;
pub mod registry;
pub mod search;
pub mod shell;
pub mod system;
pub mod task_solver;
pub mod text;
pub mod time;

pub use chat::ChatCapability;
pub use dispatcher::{CapabilityResult, Dispatcher};
pub use executor::{StepExecutor, DEFAULT_EXECUTOR_MAX_STEPS};
pub use filesystem::{FileTool, SafeFs};
pub use http::HttpTool;
pub use math::MathTool;
pub use registry::{Capability, CapabilityRegistry, CapabilityRegistryBuilder};
pub use search::SearchTool;
pub use shell::ShellTool;
pub use system::SystemTool;
pub use task_solver::TaskSolverCapability;
pub use text::TextTool;
pub use time::TimeTool;
