use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::SandboxError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CookieError {
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),
}

impl From<CookieError> for SandboxError {
    fn from(err: CookieError) -> Self {
        SandboxError::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// 由 jar 在写入时按 domain 参数填充
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

impl Cookie {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: default_path(),
            expires: None,
            max_age: None,
            http_only: false,
            secure: false,
            same_site: SameSite::default(),
        }
    }

    /// 从脚本传入的普通对象构造，并校验字段形状
    pub fn from_value(value: Value) -> Result<Self, CookieError> {
        if !value.is_object() {
            return Err(CookieError::InvalidCookie(
                "expected an object".to_string(),
            ));
        }
        let cookie: Cookie = serde_json::from_value(value)
            .map_err(|e| CookieError::InvalidCookie(e.to_string()))?;
        cookie.validate()?;
        Ok(cookie)
    }

    pub fn validate(&self) -> Result<(), CookieError> {
        if self.name.is_empty() {
            return Err(CookieError::InvalidCookie("name must not be empty".to_string()));
        }
        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '=' | ','))
        {
            return Err(CookieError::InvalidCookie(format!(
                "name '{}' contains forbidden characters",
                self.name
            )));
        }
        if self.value.contains(';') {
            return Err(CookieError::InvalidCookie(
                "value must not contain ';'".to_string(),
            ));
        }
        Ok(())
    }
}

/// 以 (domain, name) 为键的 cookie 集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.cookies
            .iter()
            .find(|c| c.domain == domain && c.name == name)
    }

    pub fn has(&self, domain: &str, name: &str) -> bool {
        self.get(domain, name).is_some()
    }

    pub fn get_all(&self, domain: &str) -> Vec<&Cookie> {
        self.cookies.iter().filter(|c| c.domain == domain).collect()
    }

    /// 校验通过后才写入；同键 cookie 被替换
    pub fn set(&mut self, domain: &str, mut cookie: Cookie) -> Result<(), CookieError> {
        cookie.validate()?;
        cookie.domain = domain.to_string();
        self.cookies
            .retain(|c| !(c.domain == domain && c.name == cookie.name));
        self.cookies.push(cookie);
        Ok(())
    }

    pub fn delete(&mut self, domain: &str, name: &str) -> bool {
        let before = self.cookies.len();
        self.cookies
            .retain(|c| !(c.domain == domain && c.name == name));
        before != self.cookies.len()
    }

    pub fn clear(&mut self, domain: &str) {
        self.cookies.retain(|c| c.domain != domain);
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn into_cookies(self) -> Vec<Cookie> {
        self.cookies
    }
}
