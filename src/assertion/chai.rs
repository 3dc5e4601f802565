use regex::Regex;
use serde_json::Value;

use crate::assertion::types::ExpectResult;
use crate::assertion::value::{Subject, ValueKind, deep_equal, format_value};

/// 只影响消息、不影响语义的连接词
const SILENT_WORDS: [&str; 8] = ["to", "that", "which", "and", "but", "does", "still", "also"];

/// 链上的修饰标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaiFlags {
    pub negated: bool,
    pub deep: bool,
    pub own: bool,
    pub any: bool,
    pub all: bool,
    pub nested: bool,
    pub contains: bool,
}

/// chai 风格的断言链
///
/// 链式单词只记录到 `words` 里用于拼消息；`not`/`deep` 等标志同时改变语义。
/// 每个终结方法返回一条 [`ExpectResult`]，由调用方记到当前测试节点上。
#[derive(Debug, Clone)]
pub struct ChaiAssertion {
    subject: Subject,
    flags: ChaiFlags,
    words: Vec<String>,
}

impl ChaiAssertion {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            flags: ChaiFlags::default(),
            words: Vec::new(),
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn flags(&self) -> ChaiFlags {
        self.flags
    }

    /// 追加一个链式单词，返回新的断言
    pub fn chain(&self, word: &str) -> Self {
        let mut next = self.clone();
        match word {
            "not" => next.flags.negated = !next.flags.negated,
            "deep" => next.flags.deep = true,
            "own" => next.flags.own = true,
            "any" => next.flags.any = true,
            "all" => next.flags.all = true,
            "nested" => next.flags.nested = true,
            "include" | "includes" | "contain" | "contains" => next.flags.contains = true,
            _ => {}
        }
        next.words.push(word.to_string());
        next
    }

    fn modifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for word in &self.words {
            let word = match word.as_str() {
                "is" => "be",
                "has" => "have",
                w if SILENT_WORDS.contains(&w) => continue,
                w => w,
            };
            if out.last() != Some(&word) {
                out.push(word);
            }
        }
        out
    }

    /// 拼出 "Expected <value> to <modifiers> <assertion> <args>"
    fn message(&self, assertion: &str, args: &[String]) -> String {
        let modifiers = self.modifiers();
        let mut message = format!("Expected {} to", self.subject.display());
        for word in &modifiers {
            message.push(' ');
            message.push_str(word);
        }
        let mut parts = assertion.splitn(2, ' ');
        let head = parts.next().unwrap_or_default();
        if modifiers.last() == Some(&head) {
            if let Some(rest) = parts.next() {
                message.push(' ');
                message.push_str(rest);
            }
        } else if !assertion.is_empty() {
            message.push(' ');
            message.push_str(assertion);
        }
        if !args.is_empty() {
            message.push(' ');
            message.push_str(&args.join(", "));
        }
        message
    }

    fn finish(&self, passed: bool, assertion: &str, args: &[String]) -> ExpectResult {
        ExpectResult::from_outcome(passed != self.flags.negated, self.message(assertion, args))
    }

    fn invalid(&self, message: impl Into<String>) -> ExpectResult {
        ExpectResult::error(message)
    }

    fn number(&self, assertion: &str) -> Result<f64, ExpectResult> {
        self.subject.as_f64().ok_or_else(|| {
            self.invalid(format!(
                "Expected {} to be a number for {}",
                self.subject.display(),
                assertion
            ))
        })
    }

    pub fn equal(&self, expected: &Subject) -> ExpectResult {
        let passed =
            self.subject.kind == expected.kind && deep_equal(&self.subject.value, &expected.value);
        self.finish(passed, "equal", &[expected.display()])
    }

    pub fn eql(&self, expected: &Subject) -> ExpectResult {
        let passed =
            self.subject.kind == expected.kind && deep_equal(&self.subject.value, &expected.value);
        self.finish(passed, "eql", &[expected.display()])
    }

    pub fn above(&self, bound: f64) -> ExpectResult {
        match self.number("above") {
            Ok(n) => self.finish(n > bound, "above", &[fmt_f64(bound)]),
            Err(result) => result,
        }
    }

    pub fn below(&self, bound: f64) -> ExpectResult {
        match self.number("below") {
            Ok(n) => self.finish(n < bound, "below", &[fmt_f64(bound)]),
            Err(result) => result,
        }
    }

    pub fn least(&self, bound: f64) -> ExpectResult {
        match self.number("least") {
            Ok(n) => self.finish(n >= bound, "least", &[fmt_f64(bound)]),
            Err(result) => result,
        }
    }

    pub fn most(&self, bound: f64) -> ExpectResult {
        match self.number("most") {
            Ok(n) => self.finish(n <= bound, "most", &[fmt_f64(bound)]),
            Err(result) => result,
        }
    }

    pub fn within(&self, low: f64, high: f64) -> ExpectResult {
        match self.number("within") {
            Ok(n) => self.finish(
                n >= low && n <= high,
                "within",
                &[fmt_f64(low), fmt_f64(high)],
            ),
            Err(result) => result,
        }
    }

    pub fn close_to(&self, expected: f64, delta: f64) -> ExpectResult {
        match self.number("closeTo") {
            Ok(n) => self.finish(
                (n - expected).abs() <= delta,
                "closeTo",
                &[fmt_f64(expected), fmt_f64(delta)],
            ),
            Err(result) => result,
        }
    }

    /// `a("string")` / `an("array")`
    pub fn a(&self, type_name: &str) -> ExpectResult {
        let expected = type_name.to_ascii_lowercase();
        let passed = match expected.as_str() {
            "array" => self.subject.kind == ValueKind::Array,
            "object" => self.subject.kind == ValueKind::Object,
            "null" | "undefined" => self.subject.kind == ValueKind::Unit,
            other => self.subject.kind.type_of() == other,
        };
        let article = match expected.chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        };
        self.finish(passed, &format!("{} {}", article, expected), &[])
    }

    pub fn include(&self, needle: &Subject) -> ExpectResult {
        let passed = match (&self.subject.value, self.subject.kind) {
            (Value::String(haystack), ValueKind::String) => match needle.as_str() {
                Some(n) => haystack.contains(n),
                None => {
                    return self.invalid(format!(
                        "Expected {} to be a string for include",
                        needle.display()
                    ));
                }
            },
            (Value::Array(items), ValueKind::Array) => {
                items.iter().any(|item| deep_equal(item, &needle.value))
            }
            (Value::Object(map), ValueKind::Object) => match &needle.value {
                Value::Object(expected) => expected
                    .iter()
                    .all(|(k, v)| map.get(k).is_some_and(|actual| deep_equal(actual, v))),
                _ => {
                    return self.invalid(
                        "Expected an object argument for include on an object",
                    );
                }
            },
            _ => {
                return self.invalid(format!(
                    "Expected {} to be a string, array or object for include",
                    self.subject.display()
                ));
            }
        };
        self.finish(passed, "include", &[needle.display()])
    }

    /// `property(name)`：断言属性存在并返回包装属性值的新断言
    pub fn property(&self, name: &str) -> (ExpectResult, ChaiAssertion) {
        let found = self.lookup(name).cloned();
        let result = self.finish(found.is_some(), "have property", &[format!("'{}'", name)]);
        let next = ChaiAssertion {
            subject: found.map(Subject::from_json).unwrap_or_else(Subject::unit),
            flags: ChaiFlags {
                negated: self.flags.negated,
                ..ChaiFlags::default()
            },
            words: Vec::new(),
        };
        (result, next)
    }

    /// `property(name, value)`：属性存在且等于给定值
    pub fn property_value(&self, name: &str, expected: &Subject) -> ExpectResult {
        let passed = self
            .lookup(name)
            .is_some_and(|actual| deep_equal(actual, &expected.value));
        self.finish(
            passed,
            "have property",
            &[format!("'{}'", name), expected.display()],
        )
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        if !self.flags.nested {
            return self.subject.value.as_object().and_then(|map| map.get(name));
        }
        let mut current = &self.subject.value;
        for segment in split_path(name) {
            current = match current {
                Value::Object(map) => map.get(segment.as_str())?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn length_of(&self, expected: f64) -> ExpectResult {
        match (self.subject.kind, self.subject.size) {
            (ValueKind::Array | ValueKind::String | ValueKind::Object, Some(size)) => {
                self.finish(size as f64 == expected, "have lengthOf", &[fmt_f64(expected)])
            }
            _ => self.invalid(format!(
                "Expected {} to have a length",
                self.subject.display()
            )),
        }
    }

    pub fn keys(&self, expected: &[String]) -> ExpectResult {
        let Value::Object(map) = &self.subject.value else {
            return self.invalid(format!(
                "Expected {} to be an object for keys",
                self.subject.display()
            ));
        };
        let passed = if self.flags.any {
            expected.iter().any(|k| map.contains_key(k))
        } else if self.flags.contains {
            expected.iter().all(|k| map.contains_key(k))
        } else {
            expected.len() == map.len() && expected.iter().all(|k| map.contains_key(k))
        };
        let args: Vec<String> = expected.iter().map(|k| format!("'{}'", k)).collect();
        self.finish(passed, "keys", &args)
    }

    pub fn members(&self, expected: &[Value]) -> ExpectResult {
        let Value::Array(items) = &self.subject.value else {
            return self.invalid(format!(
                "Expected {} to be an array for members",
                self.subject.display()
            ));
        };
        let contains_all = expected
            .iter()
            .all(|m| items.iter().any(|item| deep_equal(item, m)));
        let passed = if self.flags.contains {
            contains_all
        } else {
            contains_all
                && items.len() == expected.len()
                && items
                    .iter()
                    .all(|item| expected.iter().any(|m| deep_equal(item, m)))
        };
        let list = format!(
            "[{}]",
            expected.iter().map(format_value).collect::<Vec<_>>().join(", ")
        );
        self.finish(passed, "members", &[list])
    }

    pub fn one_of(&self, candidates: &[Value]) -> ExpectResult {
        let passed = candidates
            .iter()
            .any(|c| deep_equal(c, &self.subject.value));
        let list = format!(
            "[{}]",
            candidates.iter().map(format_value).collect::<Vec<_>>().join(", ")
        );
        self.finish(passed, "oneOf", &[list])
    }

    pub fn matches(&self, pattern: &str) -> ExpectResult {
        let Some(text) = self.subject.as_str() else {
            return self.invalid(format!(
                "Expected {} to be a string for match",
                self.subject.display()
            ));
        };
        match Regex::new(pattern) {
            Ok(re) => self.finish(re.is_match(text), "match", &[format!("/{}/", pattern)]),
            Err(e) => self.invalid(format!("Invalid regular expression /{}/: {}", pattern, e)),
        }
    }

    pub fn string(&self, needle: &str) -> ExpectResult {
        let Some(text) = self.subject.as_str() else {
            return self.invalid(format!(
                "Expected {} to be a string",
                self.subject.display()
            ));
        };
        self.finish(text.contains(needle), "have string", &[format!("'{}'", needle)])
    }

    pub fn ok(&self) -> ExpectResult {
        self.finish(self.subject.is_truthy(), "be ok", &[])
    }

    pub fn empty(&self) -> ExpectResult {
        match (self.subject.kind, self.subject.size) {
            (ValueKind::Array | ValueKind::String | ValueKind::Object, Some(size)) => {
                self.finish(size == 0, "be empty", &[])
            }
            _ => self.invalid(format!(
                ".empty was passed non-string primitive {}",
                self.subject.display()
            )),
        }
    }

    pub fn exist(&self) -> ExpectResult {
        self.finish(self.subject.kind != ValueKind::Unit, "exist", &[])
    }
}

fn fmt_f64(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `a.b[0].c` -> ["a", "b", "0", "c"]
fn split_path(path: &str) -> Vec<String> {
    path.replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::types::ExpectStatus;
    use serde_json::json;

    fn expect(value: Value) -> ChaiAssertion {
        ChaiAssertion::new(Subject::from_json(value))
    }

    fn subject(value: Value) -> Subject {
        Subject::from_json(value)
    }

    #[test]
    fn test_equal_message() {
        let result = expect(json!(1)).chain("to").equal(&subject(json!(1)));
        assert_eq!(result, ExpectResult::pass("Expected 1 to equal 1"));

        let result = expect(json!("a"))
            .chain("to")
            .chain("not")
            .chain("equal")
            .equal(&subject(json!("b")));
        assert_eq!(result, ExpectResult::pass("Expected 'a' to not equal 'b'"));
    }

    #[test]
    fn test_chain_words_normalized() {
        let result = expect(json!([1, 2]))
            .chain("to")
            .chain("be")
            .chain("an")
            .a("array");
        assert_eq!(result, ExpectResult::pass("Expected [1, 2] to be an array"));

        let result = expect(json!({ "a": 1 }))
            .chain("that")
            .chain("has")
            .chain("have")
            .keys(&["a".to_string()]);
        assert_eq!(result, ExpectResult::pass("Expected {a: 1} to have keys 'a'"));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(expect(json!(5)).chain("be").above(3.0).is_pass());
        assert!(!expect(json!(5)).chain("be").below(3.0).is_pass());
        assert!(expect(json!(5)).within(5.0, 6.0).is_pass());
        assert!(expect(json!(1.01)).close_to(1.0, 0.05).is_pass());
        assert_eq!(
            expect(json!("5")).above(3.0).status,
            ExpectStatus::Error
        );
    }

    #[test]
    fn test_include_variants() {
        assert!(expect(json!("hello")).include(&subject(json!("ell"))).is_pass());
        assert!(expect(json!([1, { "a": 2 }])).include(&subject(json!({ "a": 2 }))).is_pass());
        assert!(expect(json!({ "a": 1, "b": 2 })).include(&subject(json!({ "a": 1 }))).is_pass());
        assert!(!expect(json!({ "a": 1 })).include(&subject(json!({ "a": 2 }))).is_pass());
    }

    #[test]
    fn test_property_returns_nested_assertion() {
        let (result, next) = expect(json!({ "user": { "name": "x" } }))
            .chain("to")
            .chain("have")
            .property("user");
        assert_eq!(result, ExpectResult::pass("Expected {user: {name: 'x'}} to have property 'user'"));
        let (inner, name) = next.chain("that").property("name");
        assert!(inner.is_pass());
        assert!(name.chain("to").equal(&subject(json!("x"))).is_pass());

        let (missing, next) = expect(json!({})).property("nope");
        assert_eq!(missing.status, ExpectStatus::Fail);
        assert_eq!(next.subject().kind, ValueKind::Unit);
    }

    #[test]
    fn test_nested_property_path() {
        let assertion = expect(json!({ "a": { "b": [10, 20] } })).chain("nested");
        assert!(assertion.property_value("a.b[1]", &subject(json!(20))).is_pass());
        assert!(!assertion.property_value("a.c", &subject(json!(1))).is_pass());
    }

    #[test]
    fn test_members_and_one_of() {
        assert!(expect(json!([1, 2, 3])).members(&[json!(3), json!(2), json!(1)]).is_pass());
        assert!(!expect(json!([1, 2, 3])).members(&[json!(1)]).is_pass());
        assert!(
            expect(json!([1, 2, 3]))
                .chain("include")
                .members(&[json!(1)])
                .is_pass()
        );
        assert!(expect(json!(2)).one_of(&[json!(1), json!(2)]).is_pass());
    }

    #[test]
    fn test_length_and_empty() {
        assert!(expect(json!([1, 2])).length_of(2.0).is_pass());
        assert!(expect(json!({ "a": 1 })).length_of(1.0).is_pass());
        assert!(expect(json!("")).empty().is_pass());
        assert_eq!(expect(json!(1)).empty().status, ExpectStatus::Error);
    }

    #[test]
    fn test_matches_and_exist() {
        assert!(expect(json!("abc123")).matches(r"\d+").is_pass());
        assert_eq!(expect(json!("abc")).matches("(").status, ExpectStatus::Error);
        assert!(expect(json!(0)).exist().is_pass());
        assert!(!ChaiAssertion::new(Subject::unit()).exist().is_pass());
        assert!(!expect(json!(0)).ok().is_pass());
    }
}
