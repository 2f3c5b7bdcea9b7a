//! HTTP 能力：GET / POST 请求，可带 headers 与 JSON body
//!
//! 可选域名白名单（为空表示不限制）；请求带超时与 User-Agent；
//! 对 HTML 响应使用 html2text 提取可读文本，超过 max_result_chars 时截断并追加 ...[truncated]。
//! 返回 `{"status": <code>, "content": <text>}`。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use serde_json::Value;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 带浏览器 UA 与常用请求头的 reqwest 客户端
pub(crate) fn build_client(timeout_secs: u64) -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .unwrap_or_default()
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML
pub(crate) fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    let head = s.get(..5).unwrap_or(s).to_lowercase();
    head.starts_with("<!") || head.starts_with("<html")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head")))
}

/// 将 HTML 转为可读文本
pub(crate) fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

/// 按字符数截断
pub(crate) fn truncate(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

/// 去 BOM、HTML 转文本、截断
pub(crate) fn readable_body(body: &str, max_chars: usize) -> String {
    let body = body.trim_start_matches('\u{FEFF}');
    let text = if looks_like_html(body) {
        html_to_text(body)
    } else {
        body.to_string()
    };
    truncate(text, max_chars)
}

/// 从 URL 中提取 host
pub(crate) fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?.split(':').next()?;
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}

/// 在自由文本中找第一个 http(s) URL
fn url_in_text(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(|w| w.trim_end_matches(|c: char| matches!(c, ',' | '.' | ')' | '"' | '\'')))
}

pub struct HttpTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl HttpTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        Self {
            client: build_client(timeout_secs),
            allowed_domains: allowed_domains
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            max_result_chars,
        }
    }

    fn is_allowed(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| format!("Invalid URL: {url}"))?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            Ok(())
        } else {
            Err(format!("Domain not in allowlist: {domain}"))
        }
    }

    fn headers(args: &CapabilityArgs) -> Result<HeaderMap, String> {
        let mut map = HeaderMap::new();
        if let Some(Value::Object(headers)) = args.extra.get("headers") {
            for (k, v) in headers {
                let name = HeaderName::from_bytes(k.as_bytes())
                    .map_err(|e| format!("Bad header name '{k}': {e}"))?;
                let text = v.as_str().map(String::from).unwrap_or_else(|| v.to_string());
                let value = HeaderValue::from_str(&text)
                    .map_err(|e| format!("Bad header value for '{k}': {e}"))?;
                map.insert(name, value);
            }
        }
        Ok(map)
    }
}

#[async_trait]
impl Capability for HttpTool {
    fn name(&self) -> &str {
        "http_agent"
    }

    fn description(&self) -> &str {
        "Send HTTP GET/POST requests to URLs or APIs and return status and content. Args: {\"query\": \"...\", \"url\": \"https://...\", \"method\": \"GET|POST\", \"headers\": {}, \"body\": {}}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let url = args
            .str_arg("url")
            .or_else(|| url_in_text(&args.query))
            .ok_or_else(|| "Missing url".to_string())?
            .to_string();
        self.is_allowed(&url)?;
        let method = args.str_arg("method").unwrap_or("GET").to_uppercase();
        tracing::info!(url = %url, method = %method, "http tool execute");

        let request = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => {
                let req = self.client.post(&url);
                match args.extra.get("body") {
                    Some(Value::String(s)) => req.body(s.clone()),
                    Some(body) => req.json(body),
                    None => req,
                }
            }
            other => return Err(format!("Unsupported method: {other}")),
        };

        let response = request
            .headers(Self::headers(&args)?)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Read body: {e}"))?;

        let result = serde_json::json!({
            "status": status,
            "content": readable_body(&body, self.max_result_chars),
        });
        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://Example.com:8080/a/b"), Some("example.com".into()));
        assert_eq!(extract_domain("http://docs.rs"), Some("docs.rs".into()));
        assert_eq!(extract_domain("ftp://x"), None);
        assert_eq!(extract_domain("https:///path"), None);
    }

    #[test]
    fn test_url_in_text() {
        assert_eq!(
            url_in_text("please fetch https://example.com/api, thanks"),
            Some("https://example.com/api")
        );
        assert_eq!(url_in_text("no links here"), None);
    }

    #[test]
    fn test_readable_body_html_and_truncation() {
        let html = "<html><head><title>t</title></head><body><p>Hello world</p></body></html>";
        assert!(readable_body(html, 1000).contains("Hello world"));
        let long = "x".repeat(50);
        let out = readable_body(&long, 10);
        assert!(out.starts_with("xxxxxxxxxx"));
        assert!(out.ends_with("...[truncated]"));
        assert_eq!(readable_body("{\"a\":1}", 100), "{\"a\":1}");
    }

    #[test]
    fn test_allowlist() {
        let open = HttpTool::new(vec![], 5, 100);
        assert!(open.is_allowed("https://anything.org").is_ok());
        let closed = HttpTool::new(vec!["docs.rs".into()], 5, 100);
        assert!(closed.is_allowed("https://docs.rs/x").is_ok());
        assert!(closed.is_allowed("https://evil.com").is_err());
    }

    #[test]
    fn test_headers_from_args() {
        let args = CapabilityArgs::new("q")
            .with_arg("headers", serde_json::json!({"X-Token": "abc", "X-Num": 3}));
        let headers = HttpTool::headers(&args).unwrap();
        assert_eq!(headers.get("x-token").unwrap(), "abc");
        assert_eq!(headers.get("x-num").unwrap(), "3");
    }
}
