use serde_json::Value;

use crate::assertion::types::ExpectResult;
use crate::assertion::value::{Subject, ValueKind, deep_equal};

const VALID_TYPES: [&str; 8] = [
    "string",
    "boolean",
    "number",
    "object",
    "undefined",
    "bigint",
    "symbol",
    "function",
];

/// 旧版 `expect(x).toBe(y)` 风格的匹配器
#[derive(Debug, Clone)]
pub struct Expectation {
    subject: Subject,
    negated: bool,
}

impl Expectation {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn not_word(&self) -> &'static str {
        if self.negated { " not" } else { "" }
    }

    fn outcome(&self, passed: bool, message: String) -> ExpectResult {
        ExpectResult::from_outcome(passed != self.negated, message)
    }

    /// 严格相等：类型相同且值相同
    ///
    /// 脚本值是按值传递的，没有对象身份可比，所以两个内容相同的对象或数组也判定为相等。
    pub fn to_be(&self, expected: &Subject) -> ExpectResult {
        let equal = self.subject.kind == expected.kind && deep_equal(&self.subject.value, &expected.value);
        self.outcome(
            equal,
            format!(
                "Expected '{}' to{} be '{}'",
                self.subject.js_string(),
                self.not_word(),
                expected.js_string()
            ),
        )
    }

    /// level 为 2..=5，对应 2xx..5xx
    pub fn to_be_level(&self, level: u16) -> ExpectResult {
        let parsed = match (&self.subject.kind, &self.subject.value) {
            (ValueKind::Number, value) => value.as_f64().map(|n| n.trunc() as i64),
            (ValueKind::String, Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(code) = parsed else {
            return ExpectResult::error(format!(
                "Expected {}00-level status but could not parse value '{}'",
                level,
                self.subject.js_string()
            ));
        };
        let lower = i64::from(level) * 100;
        self.outcome(
            (lower..lower + 100).contains(&code),
            format!(
                "Expected '{}' to{} be {}00-level status",
                code,
                self.not_word(),
                level
            ),
        )
    }

    pub fn to_be_type(&self, expected: &Subject) -> ExpectResult {
        let expected_type = match expected.as_str() {
            Some(t) if VALID_TYPES.contains(&t) => t,
            _ => {
                return ExpectResult::error(
                    "Argument for toBeType should be \"string\", \"boolean\", \"number\", \"object\", \"undefined\", \"bigint\", \"symbol\" or \"function\"",
                );
            }
        };
        self.outcome(
            self.subject.kind.type_of() == expected_type,
            format!(
                "Expected '{}' to{} be type '{}'",
                self.subject.js_string(),
                self.not_word(),
                expected_type
            ),
        )
    }

    pub fn to_have_length(&self, expected: &Subject) -> ExpectResult {
        if !matches!(self.subject.kind, ValueKind::Array | ValueKind::String) {
            return ExpectResult::error("Expected toHaveLength to be called for an array or string");
        }
        let Some(length) = expected.as_f64() else {
            return ExpectResult::error("Argument for toHaveLength should be a number");
        };
        let actual = self.subject.size.unwrap_or(0) as f64;
        self.outcome(
            actual == length,
            format!(
                "Expected the array to{} be of length '{}'",
                self.not_word(),
                expected.js_string()
            ),
        )
    }

    pub fn to_include(&self, needle: &Subject) -> ExpectResult {
        if !matches!(self.subject.kind, ValueKind::Array | ValueKind::String) {
            return ExpectResult::error("Expected toInclude to be called for an array or string");
        }
        if needle.kind == ValueKind::Unit {
            return ExpectResult::error("Argument for toInclude should not be undefined");
        }
        let found = match &self.subject.value {
            Value::Array(items) => items.iter().any(|item| deep_equal(item, &needle.value)),
            Value::String(haystack) => haystack.contains(&needle.js_string()),
            _ => false,
        };
        self.outcome(
            found,
            format!(
                "Expected {} to{} include {}",
                self.subject.value,
                self.not_word(),
                needle.value
            ),
        )
    }
}
