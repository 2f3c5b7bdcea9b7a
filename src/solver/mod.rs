//! 规划求解层：Planner、执行历史、Plan–Execute–Reflect 主循环与兜底总结

pub mod events;
pub mod fallback;
pub mod history;
pub mod loop_;
pub mod planner;
pub mod prompts;

pub use events::SolverEvent;
pub use fallback::FallbackSummarizer;
pub use history::{ExecutionRecord, History};
pub use loop_::{LoopController, SolveOutcome, DEFAULT_MAX_ROUNDS};
pub use planner::Planner;
