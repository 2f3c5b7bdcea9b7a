//! LLM 层：客户端抽象、OpenAI 兼容实现、并发限制包装与脚本化测试客户端

pub mod limited;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use limited::LimitedLlmClient;
pub use message::{last_user_content, Message, Role};
pub use mock::ScriptedLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};
