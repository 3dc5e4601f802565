use ruscript::http::{CookieJar, KeyValue, RequestSnapshot};
use ruscript::sandbox::{MODULE_PREFIX, combine};
use ruscript::variable::{EnvVar, Environments};
use ruscript::{ErrorKind, PreRequestContext, ScriptRunner};
use serde_json::json;

fn context() -> PreRequestContext {
    PreRequestContext {
        request: RequestSnapshot::new("GET", "<<base>>/users").with_header("Accept", "*/*"),
        envs: Environments::new(
            vec![EnvVar::new("base", "https://api.example.com")],
            vec![EnvVar::secret("token", "s3cret")],
        ),
        cookies: Some(CookieJar::default()),
    }
}

#[tokio::test]
async fn test_fragments_run_outer_to_inner() {
    let root = "hopp::env.set(\"trail\", \"root\");";
    let parent = "hopp::env.set(\"trail\", hopp::env.get(\"trail\") + \">parent\");";
    let request = "hopp::env.set(\"trail\", hopp::env.get(\"trail\") + \">request\");";
    let script = combine(&[root, parent, request]);

    let result = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap();
    assert_eq!(
        result.updated_envs.get("trail").unwrap().value,
        "root>parent>request"
    );
}

#[tokio::test]
async fn test_fragments_do_not_share_declarations() {
    let script = combine(&[
        format!("{}let value = 1; hopp::env.set(\"first\", `${{value}}`);", MODULE_PREFIX),
        "let value = \"two\"; hopp::env.set(\"second\", value);".to_string(),
    ]);
    let result = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap();
    assert_eq!(result.updated_envs.get("first").unwrap().value, "1");
    assert_eq!(result.updated_envs.get("second").unwrap().value, "two");
}

#[tokio::test]
async fn test_fragments_keep_their_own_functions() {
    // 同名同参数的 fn 在不同片段里互不冲突
    let script = combine(&[
        "fn helper(x) { x + 1 }\npw::env.set(\"first\", `${helper(1)}`);",
        "fn helper(x) { x * 10 }\nhopp::env.set(\"second\", `${helper(2)}`);",
    ]);
    let result = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap();
    assert_eq!(result.updated_envs.get("first").unwrap().value, "2");
    assert_eq!(result.updated_envs.get("second").unwrap().value, "20");
}

#[tokio::test]
async fn test_syntax_error_in_later_fragment_runs_nothing() {
    let script = combine(&["hopp::env.set(\"ran\", \"yes\");", "let = ;"]);
    let failure = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap_err();
    assert!(matches!(failure.error, ruscript::SandboxError::Syntax { .. }));
    assert!(failure.console.is_empty());
}

#[tokio::test]
async fn test_request_mutation_round_trip() {
    let script = r#"
        let token = hopp::env.get("token");
        hopp::request.setHeader("Authorization", "Bearer " + token);
        hopp::request.removeHeader("accept");
        hopp::request.setParam("page", "1");
        hopp::request.setBody(#{ body: "{\"name\":\"ruscript\"}" });
        hopp::request.setMethod("POST");
        pw::env.set("legacy", "yes");
        pm::globals.set("count", 3);
    "#;
    let result = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap();

    let request = &result.updated_request;
    assert_eq!(request.method, "POST");
    assert_eq!(request.headers, vec![KeyValue::new("Authorization", "Bearer s3cret")]);
    assert_eq!(request.param("page"), Some("1"));
    // 只给 body 时与原描述浅合并
    assert_eq!(request.body, json!({ "contentType": null, "body": "{\"name\":\"ruscript\"}" }));
    assert_eq!(result.updated_envs.get("legacy").unwrap().value, "yes");
    assert_eq!(result.updated_envs.global.last().unwrap().value, "3");

    let resolved = result.resolved_request().unwrap();
    assert_eq!(resolved.url, "https://api.example.com/users");
    assert_eq!(resolved.header("authorization"), Some("Bearer s3cret"));
}

#[tokio::test]
async fn test_failed_run_returns_no_mutation() {
    let script = combine(&[
        "hopp::request.setUrl(\"https://changed.example\"); hopp::env.set(\"leak\", \"1\");",
        "undefined_function();",
    ]);
    let failure = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Script);
    assert!(failure.tests.is_none());
}

#[tokio::test]
async fn test_syntax_error_is_reported() {
    let failure = ScriptRunner::new()
        .run_pre_request_script("let = ;", context())
        .await
        .unwrap_err();
    let value = serde_json::to_value(&failure).unwrap();
    assert_eq!(value["error"]["kind"], "script");
    assert_eq!(value["error"]["type"], "syntax");
}

#[tokio::test]
async fn test_tests_unavailable_before_request() {
    let failure = ScriptRunner::new()
        .run_pre_request_script(r#"pm::test("x", || {});"#, context())
        .await
        .unwrap_err();
    assert_eq!(
        failure.error.message(),
        "pm.test is not available in pre-request scripts"
    );
}

#[tokio::test]
async fn test_cookies_and_console_returned() {
    let script = r#"
        hopp::cookies.set("api.example.com", #{ name: "sid", value: "abc", httpOnly: true });
        console::log("cookie set", hopp::cookies.getAll("api.example.com").len());
    "#;
    let result = ScriptRunner::new()
        .run_pre_request_script(script, context())
        .await
        .unwrap();
    let jar = result.updated_cookies.unwrap();
    assert!(jar.has("api.example.com", "sid"));
    assert_eq!(result.console.len(), 1);
    assert_eq!(result.console[0].args, vec![json!("cookie set"), json!(1)]);
}

#[test]
fn test_combine_empty_means_nothing_to_run() {
    let empty: [&str; 0] = [];
    assert_eq!(combine(&empty), "");
    assert_eq!(combine(&["", "  "]), "");

    let runner = ScriptRunner::new();
    let result = runner
        .run_pre_request_script_blocking(&combine(&["  "]), context())
        .unwrap();
    assert_eq!(result.updated_request, context().request);
}
