//! 搜索能力：通过可配置的结果页端点做网页搜索
//!
//! endpoint 为查询前缀（默认百度 `https://www.baidu.com/s?wd=`），查询词做 URL 编码后拼接；
//! 结果页经 html2text 提取可读文本并截断。

use async_trait::async_trait;
use reqwest::Client;

use crate::structured::CapabilityArgs;
use crate::tools::http::{build_client, readable_body};
use crate::tools::{Capability, Dispatcher};

pub struct SearchTool {
    client: Client,
    endpoint: String,
    max_result_chars: usize,
}

impl SearchTool {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        Self {
            client: build_client(timeout_secs),
            endpoint: endpoint.into(),
            max_result_chars,
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}{}", self.endpoint, encode_query(query))
    }
}

/// application/x-www-form-urlencoded 风格编码（空格转 +）
fn encode_query(q: &str) -> String {
    let mut out = String::with_capacity(q.len() * 3);
    for b in q.trim().bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[async_trait]
impl Capability for SearchTool {
    fn name(&self) -> &str {
        "search_agent"
    }

    fn description(&self) -> &str {
        "Search the web for information and return the readable results page. Args: {\"query\": \"search keywords\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let query = args.str_arg("keywords").unwrap_or(args.query.trim());
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let url = self.search_url(query);
        tracing::info!(url = %url, "search tool execute");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {e}"))?;
        Ok(readable_body(&body, self.max_result_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encoding() {
        let tool = SearchTool::new("https://www.baidu.com/s?wd=", 5, 100);
        assert_eq!(
            tool.search_url("rust async"),
            "https://www.baidu.com/s?wd=rust+async"
        );
        assert_eq!(tool.search_url("a&b"), "https://www.baidu.com/s?wd=a%26b");
        assert_eq!(tool.search_url("中"), "https://www.baidu.com/s?wd=%E4%B8%AD");
    }
}
