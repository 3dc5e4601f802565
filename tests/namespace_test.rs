use ruscript::http::{RequestSnapshot, ResponseSnapshot};
use ruscript::variable::Environments;
use ruscript::{ErrorKind, PreRequestContext, ScriptRunner, TestContext};

fn pre_request() -> PreRequestContext {
    let mut request = RequestSnapshot::new("GET", "https://example.com");
    request.name = Some("List users".to_string());
    PreRequestContext {
        request,
        envs: Environments::default(),
        cookies: None,
    }
}

fn pre_request_error(script: &str) -> String {
    let failure = ScriptRunner::new()
        .run_pre_request_script_blocking(script, pre_request())
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Script);
    failure.error.message()
}

#[test]
fn test_pm_unsupported_members() {
    let cases = [
        ("pm::vault.get(\"k\");", "pm.vault.get is not supported"),
        ("pm::collectionVariables.set(\"k\", 1);", "pm.collectionVariables.set is not supported"),
        ("pm::execution.setNextRequest(\"x\");", "pm.execution.setNextRequest is not supported"),
        ("pm::sendRequest(\"https://example.com\");", "pm.sendRequest is not supported"),
        ("pm::require(\"lodash\");", "pm.require is not supported"),
        ("pm::info.iteration;", "pm.info.iteration is not supported"),
    ];
    for (script, expected) in cases {
        assert_eq!(pre_request_error(script), expected, "script: {}", script);
    }
}

#[test]
fn test_pm_info_reports_event() {
    let result = ScriptRunner::new()
        .run_pre_request_script_blocking(
            r#"pm::environment.set("info", pm::info.eventName + ":" + pm::info.requestName);"#,
            pre_request(),
        )
        .unwrap();
    assert_eq!(
        result.updated_envs.get("info").unwrap().value,
        "prerequest:List users"
    );
}

#[test]
fn test_cookies_without_jar_are_unsupported() {
    assert_eq!(
        pre_request_error(r#"hopp::cookies.get("example.com", "sid");"#),
        "Cookies are not supported in the current platform"
    );
}

#[test]
fn test_deeply_nested_value_rejected_at_boundary() {
    let message = pre_request_error(
        r#"
        let v = [];
        for i in 0..70 { v = [v]; }
        console::log(v);
        "#,
    );
    assert!(message.contains("nested deeper"), "message: {}", message);
}

#[test]
fn test_response_is_read_only() {
    let context = TestContext {
        request: RequestSnapshot::new("GET", "https://example.com"),
        response: ResponseSnapshot::new(201, "created"),
        envs: Environments::default(),
        cookies: None,
    };
    let result = ScriptRunner::new()
        .run_test_script_blocking(
            r#"
            hopp::test("status", || {
                hopp::expect(hopp::response.statusCode).toBe(201);
                hopp::expect(pm::response.text()).toBe("created");
            });
            "#,
            context,
        )
        .unwrap();
    assert!(result.summary().is_success());
}
