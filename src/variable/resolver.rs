use crate::error::SandboxError;
use crate::variable::types::EnvVar;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

/// 递归展开的最大轮数
pub const MAX_EXPAND_PASSES: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Environment variable expansion loop suspected: still expanding after {0} passes")]
    ExpansionLoop(usize),
}

impl From<ResolveError> for SandboxError {
    fn from(err: ResolveError) -> Self {
        SandboxError::runtime(err.to_string())
    }
}

/// 秘密变量的展开方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// 以等长的 `*` 代替秘密值
    pub mask_secrets: bool,
    /// 保留 `<<key>>` 原样，并立即停止后续展开
    pub show_key_if_secret: bool,
}

impl ResolveOptions {
    pub fn masked() -> Self {
        Self {
            mask_secrets: true,
            ..Self::default()
        }
    }

    pub fn hide_secrets() -> Self {
        Self {
            show_key_if_secret: true,
            ..Self::default()
        }
    }
}

/// 变量替换器
pub struct VariableResolver;

impl VariableResolver {
    /// 迭代展开 `<<name>>`，直到某一轮没有任何替换
    pub fn expand<'a, F>(
        text: &str,
        lookup: F,
        options: ResolveOptions,
    ) -> Result<String, ResolveError>
    where
        F: Fn(&str) -> Option<&'a EnvVar>,
    {
        static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = VAR_REGEX.get_or_init(|| Regex::new(r"<<([^<>]*)>>").expect("valid placeholder pattern"));

        let mut result = text.to_string();
        let mut passes = 0;

        loop {
            if passes > MAX_EXPAND_PASSES {
                return Err(ResolveError::ExpansionLoop(MAX_EXPAND_PASSES));
            }

            let mut substituted = false;
            let mut halted = false;
            let next = re
                .replace_all(&result, |caps: &Captures| match lookup(&caps[1]) {
                    Some(var) if var.secret && options.show_key_if_secret => {
                        halted = true;
                        caps[0].to_string()
                    }
                    Some(var) if var.secret && options.mask_secrets => {
                        substituted = true;
                        "*".repeat(var.value.chars().count())
                    }
                    Some(var) => {
                        substituted = true;
                        var.value.clone()
                    }
                    None => caps[0].to_string(),
                })
                .into_owned();
            result = next;

            if halted || !substituted {
                return Ok(result);
            }
            passes += 1;
        }
    }

    /// 单轮替换 `{{name}}`，用于兼容命名空间的 replaceIn
    pub fn replace_in<'a, F>(text: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        static BRACE_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = BRACE_REGEX.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("valid placeholder pattern"));

        re.replace_all(text, |caps: &Captures| {
            lookup(caps[1].trim())
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
    }

    /// 解析并替换系统环境变量 ${VAR}
    pub fn resolve_env_vars(text: &str) -> String {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env pattern"));

        re.replace_all(text, |caps: &Captures| {
            let env_name = &caps[1];
            std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::types::Environments;

    fn envs(selected: Vec<EnvVar>, global: Vec<EnvVar>) -> Environments {
        Environments::new(global, selected)
    }

    #[test]
    fn test_no_placeholders_unchanged() {
        let e = envs(vec![EnvVar::new("a", "1")], vec![]);
        let input = "plain text with <angle> brackets";
        assert_eq!(e.resolve(input, ResolveOptions::default()).unwrap(), input);
    }

    #[test]
    fn test_selected_before_global() {
        let e = envs(vec![EnvVar::new("x", "S")], vec![EnvVar::new("x", "G")]);
        assert_eq!(e.resolve("<<x>>", ResolveOptions::default()).unwrap(), "S");
    }

    #[test]
    fn test_unmatched_stays_literal() {
        let e = envs(vec![EnvVar::new("host", "example.com")], vec![]);
        assert_eq!(
            e.resolve("https://<<host>>/<<missing>>", ResolveOptions::default())
                .unwrap(),
            "https://example.com/<<missing>>"
        );
    }

    #[test]
    fn test_nested_expansion() {
        let e = envs(
            vec![
                EnvVar::new("url", "<<scheme>>://<<host>>"),
                EnvVar::new("scheme", "https"),
            ],
            vec![EnvVar::new("host", "<<sub>>.example.com"), EnvVar::new("sub", "api")],
        );
        assert_eq!(
            e.resolve("<<url>>/v1", ResolveOptions::default()).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn test_mutual_cycle_is_error() {
        let e = envs(vec![EnvVar::new("a", "<<b>>"), EnvVar::new("b", "<<a>>")], vec![]);
        assert_eq!(
            e.resolve("<<a>>", ResolveOptions::default()),
            Err(ResolveError::ExpansionLoop(MAX_EXPAND_PASSES))
        );
    }

    #[test]
    fn test_self_reference_is_error() {
        let e = envs(vec![EnvVar::new("a", "x<<a>>")], vec![]);
        assert!(e.resolve("<<a>>", ResolveOptions::default()).is_err());
    }

    #[test]
    fn test_secret_resolves_by_default() {
        let e = envs(vec![EnvVar::secret("token", "abc123")], vec![]);
        assert_eq!(
            e.resolve("Bearer <<token>>", ResolveOptions::default()).unwrap(),
            "Bearer abc123"
        );
    }

    #[test]
    fn test_secret_masked() {
        let e = envs(vec![EnvVar::secret("token", "abc123")], vec![]);
        assert_eq!(
            e.resolve("Bearer <<token>>", ResolveOptions::masked()).unwrap(),
            "Bearer ******"
        );
    }

    #[test]
    fn test_secret_key_kept_and_expansion_halts() {
        let e = envs(
            vec![
                EnvVar::secret("token", "abc123"),
                EnvVar::new("auth", "<<token>>"),
                EnvVar::new("next", "<<other>>"),
                EnvVar::new("other", "value"),
            ],
            vec![],
        );
        // 第一轮展开 auth/next，第二轮遇到秘密变量立即停止
        assert_eq!(
            e.resolve("<<auth>> <<next>>", ResolveOptions::hide_secrets())
                .unwrap(),
            "<<token>> value"
        );
        assert_eq!(
            e.resolve("<<token>> <<next>>", ResolveOptions::hide_secrets())
                .unwrap(),
            "<<token>> <<other>>"
        );
    }

    #[test]
    fn test_replace_in_braces() {
        let output = VariableResolver::replace_in("{{host}}/{{ path }}/{{missing}}", |key| match key {
            "host" => Some("example.com"),
            "path" => Some("users"),
            _ => None,
        });
        assert_eq!(output, "example.com/users/{{missing}}");
    }

    #[test]
    fn test_resolve_env_vars() {
        // 设置测试环境变量
        unsafe {
            std::env::set_var("RUSCRIPT_TEST_VAR", "test_value");
        }

        let output = VariableResolver::resolve_env_vars("Value: ${RUSCRIPT_TEST_VAR}");
        assert_eq!(output, "Value: test_value");

        // 清理
        unsafe {
            std::env::remove_var("RUSCRIPT_TEST_VAR");
        }
    }

    #[test]
    fn test_resolve_env_vars_missing() {
        let input = "Value: ${NONEXISTENT_VAR}";
        let output = VariableResolver::resolve_env_vars(input);
        // 未找到的环境变量保持原样
        assert_eq!(output, "Value: ${NONEXISTENT_VAR}");
    }
}
