//! 单次 LLM 调用型能力：master（寒暄）与 multimodal_agent（附件理解，可用独立视觉模型）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, Message};
use crate::solver::prompts;
use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

pub struct ChatCapability {
    name: String,
    description: String,
    system_prompt: String,
    llm: Arc<dyn LlmClient>,
}

impl ChatCapability {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            llm,
        }
    }

    pub fn master(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(
            "master",
            "Answer greetings and small talk briefly. Args: {\"query\": \"...\"}",
            prompts::MASTER_PROMPT,
            llm,
        )
    }

    pub fn multimodal(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(
            "multimodal_agent",
            "Analyse image, audio, video or PDF attachments and answer questions about them. Args: {\"query\": \"...\", \"attachments\": [\"path or url\"]}",
            prompts::MULTIMODAL_PROMPT,
            llm,
        )
    }
}

/// attachments 参数：字符串或字符串数组
fn attachments(args: &CapabilityArgs) -> Vec<String> {
    match args.extra.get("attachments") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[async_trait]
impl Capability for ChatCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let files = attachments(&args);
        let user = if files.is_empty() {
            args.query.clone()
        } else {
            format!("{}\n\nAttachments:\n{}", args.query, files.join("\n"))
        };
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(user),
        ];
        self.llm
            .complete(&messages)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::CapabilityRegistry;

    #[tokio::test]
    async fn test_attachments_are_listed_in_prompt() {
        let llm = Arc::new(ScriptedLlmClient::new(["a cat"]));
        let cap = ChatCapability::multimodal(llm.clone());
        let registry = Arc::new(CapabilityRegistry::builder().build().unwrap());
        let d = Dispatcher::new(registry, 5);
        let args = CapabilityArgs::new("what is in the picture?")
            .with_arg("attachments", serde_json::json!(["photo.jpg"]));
        assert_eq!(cap.call(&d, args).await.unwrap(), "a cat");
        assert!(llm.prompt(0).unwrap().contains("Attachments:\nphoto.jpg"));
    }
}
