//! 核心层：错误类型、结果状态、推理端点准入控制

pub mod admission;
pub mod error;
pub mod status;

pub use admission::AdmissionGate;
pub use error::AgentError;
pub use status::Status;
