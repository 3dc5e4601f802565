use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assertion::{TestDescriptor, TestSummary};
use crate::error::SandboxError;
use crate::http::{CookieJar, RequestSnapshot, ResponseSnapshot};
use crate::sandbox::ConsoleEntry;
use crate::variable::{Environments, ResolveError, ResolveOptions};

/// 前置脚本的输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRequestContext {
    pub request: RequestSnapshot,

    #[serde(default)]
    pub envs: Environments,

    /// 缺省时脚本里的 cookie 调用全部报不支持
    #[serde(default)]
    pub cookies: Option<CookieJar>,
}

/// 测试脚本的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestContext {
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,

    #[serde(default)]
    pub envs: Environments,

    #[serde(default)]
    pub cookies: Option<CookieJar>,
}

/// 前置脚本成功后的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreRequestResult {
    pub updated_request: RequestSnapshot,
    pub updated_envs: Environments,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_cookies: Option<CookieJar>,

    pub console: Vec<ConsoleEntry>,
}

impl PreRequestResult {
    /// 用更新后的变量展开请求里的 `<<var>>`，秘密值打码
    pub fn resolved_request(&self) -> Result<RequestSnapshot, ResolveError> {
        self.updated_request
            .resolve_templates(&self.updated_envs, ResolveOptions::masked())
    }
}

/// 测试脚本成功后的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    pub tests: TestDescriptor,
    pub envs: Environments,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_cookies: Option<CookieJar>,

    pub console: Vec<ConsoleEntry>,
}

impl TestRunResult {
    pub fn summary(&self) -> TestSummary {
        TestSummary::from_descriptor(&self.tests)
    }
}

/// 运行失败
///
/// 脚本在 `test()` 之外抛错时，`tests` 带上出错前已经完成的结果；
/// 语法错误和基础设施错误不带任何结果。
#[derive(Debug, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{error}")]
pub struct RunFailure {
    pub error: SandboxError,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestDescriptor>,

    pub console: Vec<ConsoleEntry>,
}

impl RunFailure {
    pub fn bare(error: SandboxError) -> Self {
        Self {
            error,
            tests: None,
            console: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::ExpectResult;
    use crate::variable::EnvVar;
    use serde_json::json;

    #[test]
    fn test_context_deserialize_minimal() {
        let context: TestContext = serde_json::from_value(json!({
            "request": { "url": "https://example.com", "method": "POST" },
            "response": { "status": 201, "body": "{\"id\":1}" }
        }))
        .unwrap();
        assert_eq!(context.request.method, "POST");
        assert_eq!(context.response.status, 201);
        assert!(context.envs.selected.is_empty());
        assert!(context.cookies.is_none());
    }

    #[test]
    fn test_failure_serializes_kind() {
        let failure = RunFailure::bare(SandboxError::runtime("boom"));
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["error"]["kind"], "script");
        assert_eq!(value["error"]["message"], "boom");
        assert!(value.get("tests").is_none());
        assert_eq!(failure.to_string(), "脚本运行错误: boom");
    }

    #[test]
    fn test_resolved_request_masks_secrets() {
        let mut request = RequestSnapshot::new("GET", "<<base>>/users");
        request.set_header("Authorization", "Bearer <<token>>");
        let result = PreRequestResult {
            updated_request: request,
            updated_envs: Environments::new(
                vec![EnvVar::new("base", "https://api.example.com")],
                vec![EnvVar::secret("token", "abcd")],
            ),
            updated_cookies: None,
            console: Vec::new(),
        };
        let resolved = result.resolved_request().unwrap();
        assert_eq!(resolved.url, "https://api.example.com/users");
        assert_eq!(resolved.header("authorization"), Some("Bearer ****"));
    }

    #[test]
    fn test_run_result_summary() {
        let mut tests = TestDescriptor::root();
        let mut child = TestDescriptor::new("A");
        child.expect_results.push(ExpectResult::pass("ok"));
        tests.children.push(child);

        let result = TestRunResult {
            tests,
            envs: Environments::default(),
            updated_cookies: None,
            console: Vec::new(),
        };
        let summary = result.summary();
        assert_eq!(summary.total, 1);
        assert!(summary.is_success());
    }
}
