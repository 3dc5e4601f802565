use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assertion::TestRunStack;
use crate::http::{CookieJar, RequestSnapshot, ResponseSnapshot};
use crate::variable::Environments;

/// 脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptKind {
    PreRequest,
    Test,
}

impl ScriptKind {
    /// `pm::info.eventName`
    pub fn event_name(&self) -> &'static str {
        match self {
            ScriptKind::PreRequest => "prerequest",
            ScriptKind::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// 一次 console 调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub args: Vec<Value>,
    pub timestamp: DateTime<Utc>,
}

/// 单次运行独占的可变状态，三个命名空间共享同一份
#[derive(Debug, Clone)]
pub struct RunState {
    pub kind: ScriptKind,
    pub envs: Environments,
    pub request: RequestSnapshot,
    pub response: Option<Arc<ResponseSnapshot>>,
    /// `None` 表示当前平台不支持 cookie
    pub cookies: Option<CookieJar>,
    pub tests: TestRunStack,
    pub console: Vec<ConsoleEntry>,
}

impl RunState {
    pub fn pre_request(
        request: RequestSnapshot,
        envs: Environments,
        cookies: Option<CookieJar>,
    ) -> Self {
        Self {
            kind: ScriptKind::PreRequest,
            envs,
            request,
            response: None,
            cookies,
            tests: TestRunStack::new(),
            console: Vec::new(),
        }
    }

    pub fn test(
        request: RequestSnapshot,
        response: ResponseSnapshot,
        envs: Environments,
        cookies: Option<CookieJar>,
    ) -> Self {
        Self {
            kind: ScriptKind::Test,
            envs,
            request,
            response: Some(Arc::new(response)),
            cookies,
            tests: TestRunStack::new(),
            console: Vec::new(),
        }
    }
}

pub type SharedState = Arc<Mutex<RunState>>;
