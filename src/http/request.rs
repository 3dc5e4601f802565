use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, SandboxError};
use crate::http::types::{KeyValue, find_ci};
use crate::variable::{Environments, ResolveError, ResolveOptions};

fn default_method() -> String {
    "GET".to_string()
}

fn default_body() -> Value {
    json!({ "contentType": null, "body": null })
}

fn default_auth() -> Value {
    json!({ "authType": "inherit", "authActive": true })
}

/// 一个完整的 body 描述必须同时包含这两个字段
const BODY_DESCRIPTOR_KEYS: [&str; 2] = ["contentType", "body"];
const AUTH_DESCRIPTOR_KEYS: [&str; 2] = ["authType", "authActive"];

/// 脚本运行期间可变的请求快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    #[serde(alias = "endpoint")]
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: Vec<KeyValue>,

    #[serde(default)]
    pub params: Vec<KeyValue>,

    #[serde(default = "default_body")]
    pub body: Value,

    #[serde(default = "default_auth")]
    pub auth: Value,

    /// 请求级变量
    #[serde(default)]
    pub request_variables: Vec<KeyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Default for RequestSnapshot {
    fn default() -> Self {
        Self::new("GET", "")
    }
}

impl RequestSnapshot {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            headers: Vec::new(),
            params: Vec::new(),
            body: default_body(),
            auth: default_auth(),
            request_variables: Vec::new(),
            name: None,
            id: None,
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.set_param(key, value);
        self
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// 原样保留大小写
    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        find_ci(&self.headers, key).map(|kv| kv.value.as_str())
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        find_ci(&self.params, key).map(|kv| kv.value.as_str())
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        upsert_ci(&mut self.headers, key, value);
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        upsert_ci(&mut self.params, key, value);
    }

    pub fn remove_header(&mut self, key: &str) -> bool {
        remove_ci(&mut self.headers, key)
    }

    pub fn remove_param(&mut self, key: &str) -> bool {
        remove_ci(&mut self.params, key)
    }

    /// 整体替换请求头，格式错误时不做任何修改
    pub fn set_headers(&mut self, headers: Value) -> Result<()> {
        self.headers = parse_entries(headers, "headers")?;
        Ok(())
    }

    pub fn set_params(&mut self, params: Value) -> Result<()> {
        self.params = parse_entries(params, "params")?;
        Ok(())
    }

    /// 完整描述直接替换，部分字段浅合并
    pub fn set_body(&mut self, patch: Value) -> Result<()> {
        apply_patch(&mut self.body, patch, &BODY_DESCRIPTOR_KEYS, "body")
    }

    pub fn set_auth(&mut self, patch: Value) -> Result<()> {
        apply_patch(&mut self.auth, patch, &AUTH_DESCRIPTOR_KEYS, "auth")
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.request_variables
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    pub fn set_variable(&mut self, key: &str, value: &str) {
        match self.request_variables.iter_mut().find(|kv| kv.key == key) {
            Some(kv) => kv.value = value.to_string(),
            None => self.request_variables.push(KeyValue::new(key, value)),
        }
    }

    /// 将 url、启用的请求头/参数以及文本 body 中的 `<<var>>` 展开
    pub fn resolve_templates(
        &self,
        envs: &Environments,
        options: ResolveOptions,
    ) -> std::result::Result<Self, ResolveError> {
        let resolve_entries = |entries: &[KeyValue]| -> std::result::Result<Vec<KeyValue>, ResolveError> {
            entries
                .iter()
                .filter(|kv| kv.active)
                .map(|kv| {
                    Ok(KeyValue {
                        key: envs.resolve(&kv.key, options)?,
                        value: envs.resolve(&kv.value, options)?,
                        ..kv.clone()
                    })
                })
                .collect()
        };

        let mut resolved = self.clone();
        resolved.url = envs.resolve(&self.url, options)?;
        resolved.headers = resolve_entries(&self.headers)?;
        resolved.params = resolve_entries(&self.params)?;
        if let Some(Value::String(text)) = self.body.get("body") {
            resolved.body["body"] = Value::String(envs.resolve(text, options)?);
        }
        Ok(resolved)
    }
}

fn upsert_ci(entries: &mut Vec<KeyValue>, key: &str, value: &str) {
    match entries
        .iter_mut()
        .find(|kv| kv.key.eq_ignore_ascii_case(key))
    {
        Some(kv) => kv.value = value.to_string(),
        None => entries.push(KeyValue::new(key, value)),
    }
}

fn remove_ci(entries: &mut Vec<KeyValue>, key: &str) -> bool {
    match entries
        .iter()
        .position(|kv| kv.key.eq_ignore_ascii_case(key))
    {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}

fn parse_entries(value: Value, what: &str) -> Result<Vec<KeyValue>> {
    if !value.is_array() {
        return Err(SandboxError::validation(format!(
            "Expected {} to be an array of {{ key, value }} entries",
            what
        )));
    }
    serde_json::from_value(value).map_err(|e| {
        SandboxError::validation(format!("Invalid {} entry: {}", what, e))
    })
}

fn apply_patch(current: &mut Value, patch: Value, descriptor_keys: &[&str], what: &str) -> Result<()> {
    let Value::Object(patch) = patch else {
        return Err(SandboxError::validation(format!(
            "Expected {} to be an object",
            what
        )));
    };
    if patch.is_empty() {
        return Err(SandboxError::validation(format!(
            "Expected a non-empty object for {}",
            what
        )));
    }

    if descriptor_keys.iter().all(|key| patch.contains_key(*key)) {
        *current = Value::Object(patch);
        return Ok(());
    }

    match current {
        Value::Object(existing) => existing.extend(patch),
        other => *other = Value::Object(patch),
    }
    Ok(())
}
