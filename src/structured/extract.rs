//! 结构化记录提取
//!
//! 推理引擎可能在 JSON 前后加说明文字或 ```json 代码块；取第一个 `{` 到最后一个 `}` 之间的片段。
//! 对已经干净的记录再次提取得到同一片段（幂等）。

use crate::core::AgentError;

/// 提取最外层记录；两端花括号之间只有空白时视为没有记录
pub fn extract_record(text: &str) -> Result<&str, AgentError> {
    let start = text
        .find('{')
        .ok_or_else(|| AgentError::Extraction("no opening brace in output".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| AgentError::Extraction("no closing brace in output".to_string()))?;
    if end < start {
        return Err(AgentError::Extraction(
            "closing brace precedes opening brace".to_string(),
        ));
    }
    if text[start + 1..end].trim().is_empty() {
        return Err(AgentError::Extraction("record is empty".to_string()));
    }
    Ok(&text[start..=end])
}
