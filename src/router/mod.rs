//! 路由层：按意图把单轮请求交给某个能力，或把已是最终答案的观察结果原样返回

pub mod intent;

pub use intent::{Intent, IntentRouter, RouteOutcome};
