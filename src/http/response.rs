use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SandboxError};
use crate::http::types::{KeyValue, Status, find_ci};

/// 只读的响应快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status: u16,

    #[serde(default)]
    pub status_text: String,

    #[serde(default)]
    pub headers: Vec<KeyValue>,

    /// 原始文本，或调用方已解析好的 JSON
    #[serde(default)]
    pub body: Value,

    /// 毫秒
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            response_time: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push(KeyValue::new(key, value));
        self
    }

    pub fn with_status_text(mut self, text: &str) -> Self {
        self.status_text = text.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_ci(&self.headers, name).map(|kv| kv.value.as_str())
    }

    pub fn is_success(&self) -> bool {
        Status::new(self.status).is_ok_and(|s| s.is_success())
    }

    /// 原始文本
    pub fn text(&self) -> String {
        match &self.body {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// 解析为 JSON，失败时返回错误而不是 null
    pub fn json(&self) -> Result<Value> {
        match &self.body {
            Value::String(text) => serde_json::from_str(text).map_err(|e| SandboxError::Runtime {
                message: format!("Failed to parse response body as JSON: {}", e),
                line: None,
            }),
            other => Ok(other.clone()),
        }
    }

    /// 能解析成 JSON 就返回 JSON，否则返回文本
    pub fn body_value(&self) -> Value {
        self.json().unwrap_or_else(|_| Value::String(self.text()))
    }

    /// 去掉状态行前缀的原因短语，为空时按状态码推断
    pub fn reason(&self) -> String {
        let text = self
            .status_text
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim();
        if !text.is_empty() {
            return text.to_string();
        }
        Status::new(self.status)
            .map(|s| s.reason_phrase())
            .unwrap_or("Unknown")
            .to_string()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.text().into_bytes()
    }

    pub fn size(&self) -> usize {
        self.text().len()
    }

    pub fn data_uri(&self) -> String {
        let mime = self
            .header("content-type")
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .unwrap_or("application/octet-stream");
        format!("data:{};base64,{}", mime, STANDARD.encode(self.bytes()))
    }
}
