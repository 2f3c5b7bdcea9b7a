//! 文本能力：提取邮箱、提取 URL、校验邮箱格式

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static EMAIL_FULL_RE: OnceLock<Regex> = OnceLock::new();
static URL_RE: OnceLock<Regex> = OnceLock::new();

const EMAIL: &str = r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}";

pub fn extract_emails(text: &str) -> Vec<String> {
    let re = EMAIL_RE.get_or_init(|| Regex::new(EMAIL).unwrap());
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

pub fn extract_urls(text: &str) -> Vec<String> {
    let re = URL_RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'，。）)]+"#).unwrap());
    re.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .collect()
}

pub fn is_valid_email(s: &str) -> bool {
    let re = EMAIL_FULL_RE.get_or_init(|| Regex::new(&format!("^{EMAIL}$")).unwrap());
    re.is_match(s.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextOp {
    ExtractEmails,
    ExtractUrls,
    ValidateEmail,
}

impl TextOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "extract_emails" | "emails" => Some(Self::ExtractEmails),
            "extract_urls" | "urls" => Some(Self::ExtractUrls),
            "validate_email" | "validate" => Some(Self::ValidateEmail),
            _ => None,
        }
    }

    /// 未显式指定 operation 时按关键词推断
    fn infer(query: &str) -> Self {
        let q = query.to_lowercase();
        if q.contains("valid") || q.contains("校验") || q.contains("验证") {
            Self::ValidateEmail
        } else if q.contains("url") || q.contains("link") || q.contains("链接") || q.contains("网址") {
            Self::ExtractUrls
        } else {
            Self::ExtractEmails
        }
    }
}

pub struct TextTool;

impl TextTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for TextTool {
    fn name(&self) -> &str {
        "string_agent"
    }

    fn description(&self) -> &str {
        "Text utilities: extract emails, extract http/https URLs, validate an email address. Args: {\"query\": \"...\", \"operation\": \"extract_emails|extract_urls|validate_email\", \"text\": \"optional input text\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let op = match args.str_arg("operation") {
            Some(raw) => TextOp::parse(raw).ok_or_else(|| format!("Unknown operation: {raw}"))?,
            None => TextOp::infer(&args.query),
        };
        let text = args.str_arg("text").unwrap_or(&args.query);
        tracing::debug!(op = ?op, "text tool execute");
        let out = match op {
            TextOp::ExtractEmails => serde_json::json!(extract_emails(text)),
            TextOp::ExtractUrls => serde_json::json!(extract_urls(text)),
            TextOp::ValidateEmail => {
                let candidate = args
                    .str_arg("email")
                    .map(String::from)
                    .or_else(|| extract_emails(text).into_iter().next())
                    .unwrap_or_else(|| text.trim().to_string());
                serde_json::json!({ "email": candidate, "valid": is_valid_email(&candidate) })
            }
        };
        Ok(out.to_string())
    }
}
