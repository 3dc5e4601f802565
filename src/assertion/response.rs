use serde_json::Value;

use crate::assertion::chai::ChaiAssertion;
use crate::assertion::types::ExpectResult;
use crate::assertion::value::Subject;
use crate::http::ResponseSnapshot;

/// `pm::response.to.*` 的响应断言，全部委托给 chai 断言链
#[derive(Debug, Clone, Copy)]
pub struct ResponseAssertion<'a> {
    response: &'a ResponseSnapshot,
    negated: bool,
}

impl<'a> ResponseAssertion<'a> {
    pub fn new(response: &'a ResponseSnapshot) -> Self {
        Self {
            response,
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    fn expect(&self, value: Subject) -> ChaiAssertion {
        let assertion = ChaiAssertion::new(value).chain("to");
        if self.negated {
            assertion.chain("not")
        } else {
            assertion
        }
    }

    pub fn status(&self, expected: &Subject) -> ExpectResult {
        self.expect(Subject::from_json(Value::from(self.response.status)))
            .equal(expected)
    }

    /// 只给名字时断言存在；同时给值时断言相等
    pub fn header(&self, name: &str, value: Option<&Subject>) -> ExpectResult {
        let actual = self
            .response
            .header(name)
            .map(|v| Subject::from_json(Value::String(v.to_string())))
            .unwrap_or_else(Subject::unit);
        match value {
            Some(expected) => self.expect(actual).equal(expected),
            None => self.expect(actual).exist(),
        }
    }

    pub fn body(&self, expected: &Subject) -> ExpectResult {
        self.expect(Subject::from_json(Value::String(self.response.text())))
            .equal(expected)
    }

    /// 无参数：断言是 JSON 对象；给键：断言存在该属性；键和值：断言属性相等
    pub fn json_body(&self, key: Option<&str>, value: Option<&Subject>) -> ExpectResult {
        let json = match self.response.json() {
            Ok(json) => json,
            Err(e) => return ExpectResult::error(e.message()),
        };
        let subject = Subject::from_json(json);
        match (key, value) {
            (None, _) => self.expect(subject).chain("be").a("object"),
            (Some(key), None) => self.expect(subject).chain("have").property(key).0,
            (Some(key), Some(expected)) => {
                let actual = subject
                    .value
                    .get(key)
                    .cloned()
                    .map(Subject::from_json)
                    .unwrap_or_else(Subject::unit);
                self.expect(actual).equal(expected)
            }
        }
    }

    /// 2xx
    pub fn ok(&self) -> ExpectResult {
        self.expect(Subject::from_json(Value::Bool(self.response.is_success())))
            .chain("be")
            .equal(&Subject::from_json(Value::Bool(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::types::ExpectStatus;
    use serde_json::json;

    fn response() -> ResponseSnapshot {
        ResponseSnapshot::new(201, r#"{"id": 7, "name": "alice"}"#)
            .with_header("Content-Type", "application/json")
    }

    #[test]
    fn test_status_assertion() {
        let resp = response();
        let result = ResponseAssertion::new(&resp).status(&Subject::from_json(json!(201)));
        assert_eq!(result, ExpectResult::pass("Expected 201 to equal 201"));
        let result = ResponseAssertion::new(&resp)
            .negate()
            .status(&Subject::from_json(json!(201)));
        assert_eq!(result.status, ExpectStatus::Fail);
    }

    #[test]
    fn test_header_assertion() {
        let resp = response();
        let assertion = ResponseAssertion::new(&resp);
        assert!(assertion.header("content-type", None).is_pass());
        assert!(
            assertion
                .header("Content-Type", Some(&Subject::from_json(json!("application/json"))))
                .is_pass()
        );
        assert!(!assertion.header("X-Missing", None).is_pass());
    }

    #[test]
    fn test_json_body_assertion() {
        let resp = response();
        let assertion = ResponseAssertion::new(&resp);
        assert!(assertion.json_body(None, None).is_pass());
        assert!(assertion.json_body(Some("id"), None).is_pass());
        assert!(
            assertion
                .json_body(Some("name"), Some(&Subject::from_json(json!("alice"))))
                .is_pass()
        );

        let text = ResponseSnapshot::new(200, "not json");
        let result = ResponseAssertion::new(&text).json_body(None, None);
        assert_eq!(result.status, ExpectStatus::Error);
    }

    #[test]
    fn test_ok_and_body() {
        let resp = response();
        assert!(ResponseAssertion::new(&resp).ok().is_pass());
        let resp = ResponseSnapshot::new(500, "boom");
        assert!(!ResponseAssertion::new(&resp).ok().is_pass());
        assert!(
            ResponseAssertion::new(&resp)
                .body(&Subject::from_json(json!("boom")))
                .is_pass()
        );
    }
}
