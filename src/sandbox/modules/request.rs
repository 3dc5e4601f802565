use rhai::{Array, Dynamic, Engine, INT, Map};
use serde_json::Value;

use crate::http::types::find_ci;
use crate::http::{KeyValue, RequestSnapshot, Url};
use crate::sandbox::boundary::{RhaiResult, string_arg, throw, to_dynamic, to_json};
use crate::sandbox::modules::Namespace;
use crate::sandbox::state::{ScriptKind, SharedState};

/// 请求访问器，只有前置脚本可以修改
#[derive(Clone)]
pub struct RequestApi {
    state: SharedState,
    namespace: Namespace,
}

impl RequestApi {
    pub(crate) fn new(state: &SharedState, namespace: Namespace) -> Self {
        Self {
            state: state.clone(),
            namespace,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&RequestSnapshot) -> T) -> T {
        f(&self.state.lock().request)
    }

    fn mutate(
        &self,
        member: &str,
        f: impl FnOnce(&mut RequestSnapshot) -> crate::error::Result<()>,
    ) -> RhaiResult<()> {
        let mut state = self.state.lock();
        ensure_pre_request(state.kind, self.namespace, member)?;
        f(&mut state.request).map_err(|e| throw(e.message()))
    }

    fn url(&self) -> Dynamic {
        let raw = self.read(|req| req.url.clone());
        match self.namespace {
            Namespace::Pm => Dynamic::from(UrlView::new(raw)),
            Namespace::Hopp | Namespace::Pw => Dynamic::from(raw),
        }
    }

    fn headers(&self) -> RhaiResult<Dynamic> {
        match self.namespace {
            Namespace::Pm => Ok(Dynamic::from(HeaderListApi {
                state: self.state.clone(),
                source: HeaderSource::Request,
                namespace: self.namespace,
            })),
            Namespace::Hopp | Namespace::Pw => entries(&self.read(|req| req.headers.clone())),
        }
    }
}

fn ensure_pre_request(kind: ScriptKind, namespace: Namespace, member: &str) -> RhaiResult<()> {
    if kind == ScriptKind::PreRequest {
        Ok(())
    } else {
        Err(throw(format!(
            "{}.request.{} is not available in test scripts",
            namespace.prefix(),
            member
        )))
    }
}

fn entries(entries: &[KeyValue]) -> RhaiResult<Dynamic> {
    let value = serde_json::to_value(entries).map_err(|e| throw(e.to_string()))?;
    to_dynamic(&value)
}

/// `{ key, value }` 形状的参数，value 可以不是字符串
fn entry_arg(entry: &Dynamic) -> RhaiResult<(String, String)> {
    let value = to_json(entry)?;
    let key = value.get("key").and_then(Value::as_str);
    let Some(key) = key else {
        return Err(throw("Header entry must be an object with a string 'key'"));
    };
    let text = match value.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Ok((key.to_string(), text))
}

/// 请求级变量 `hopp::request.variables`
#[derive(Clone)]
pub struct RequestVariablesApi {
    state: SharedState,
    namespace: Namespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderSource {
    Request,
    Response,
}

/// 兼容命名空间的请求头/响应头列表
#[derive(Clone)]
pub struct HeaderListApi {
    state: SharedState,
    source: HeaderSource,
    namespace: Namespace,
}

impl HeaderListApi {
    pub(crate) fn response(state: &SharedState, namespace: Namespace) -> Self {
        Self {
            state: state.clone(),
            source: HeaderSource::Response,
            namespace,
        }
    }

    fn with_entries<T>(&self, f: impl FnOnce(&[KeyValue]) -> T) -> T {
        let state = self.state.lock();
        match self.source {
            HeaderSource::Request => f(&state.request.headers),
            HeaderSource::Response => f(state
                .response
                .as_ref()
                .map(|res| res.headers.as_slice())
                .unwrap_or(&[])),
        }
    }

    fn get(&self, name: &Dynamic) -> RhaiResult<Dynamic> {
        let name = string_arg(name, "name")?;
        Ok(self.with_entries(|entries| {
            find_ci(entries, &name)
                .map(|kv| Dynamic::from(kv.value.clone()))
                .unwrap_or(Dynamic::UNIT)
        }))
    }

    fn has(&self, name: &Dynamic) -> RhaiResult<bool> {
        let name = string_arg(name, "name")?;
        Ok(self.with_entries(|entries| find_ci(entries, &name).is_some()))
    }

    fn to_object(&self) -> Map {
        self.with_entries(|entries| {
            let mut map = Map::new();
            for kv in entries {
                map.entry(kv.key.as_str().into())
                    .or_insert_with(|| Dynamic::from(kv.value.clone()));
            }
            map
        })
    }

    fn all(&self) -> RhaiResult<Dynamic> {
        let list = self.with_entries(|entries| entries.to_vec());
        entries(&list)
    }

    fn mutate(&self, member: &str, f: impl FnOnce(&mut RequestSnapshot)) -> RhaiResult<()> {
        let mut state = self.state.lock();
        if self.source == HeaderSource::Response {
            return Err(throw(format!(
                "{}.response.headers.{} is not available: response headers are read-only",
                self.namespace.prefix(),
                member
            )));
        }
        ensure_pre_request(state.kind, self.namespace, &format!("headers.{}", member))?;
        f(&mut state.request);
        Ok(())
    }
}

/// 兼容命名空间的 URL 视图，无法解析时各部分为空
#[derive(Debug, Clone)]
pub struct UrlView {
    raw: String,
    parsed: Option<Url>,
}

impl UrlView {
    pub fn new(raw: String) -> Self {
        let parsed = Url::parse(&raw).ok();
        Self { raw, parsed }
    }

    fn host(&self) -> String {
        self.parsed.as_ref().map(|u| u.host.clone()).unwrap_or_default()
    }

    fn path(&self) -> String {
        self.parsed.as_ref().map(|u| u.path.clone()).unwrap_or_default()
    }

    fn query(&self) -> String {
        self.parsed.as_ref().map(|u| u.query.clone()).unwrap_or_default()
    }
}

fn string_list<'a>(parts: impl Iterator<Item = &'a str>) -> Array {
    parts
        .filter(|part| !part.is_empty())
        .map(|part| Dynamic::from(part.to_string()))
        .collect()
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<RequestApi>("Request")
        .register_get("url", |api: &mut RequestApi| api.url())
        .register_get("method", |api: &mut RequestApi| api.read(|req| req.method.clone()))
        .register_get("headers", |api: &mut RequestApi| api.headers())
        .register_get("params", |api: &mut RequestApi| {
            entries(&api.read(|req| req.params.clone()))
        })
        .register_get("body", |api: &mut RequestApi| to_dynamic(&api.read(|req| req.body.clone())))
        .register_get("auth", |api: &mut RequestApi| to_dynamic(&api.read(|req| req.auth.clone())))
        .register_get("variables", |api: &mut RequestApi| RequestVariablesApi {
            state: api.state.clone(),
            namespace: api.namespace,
        })
        .register_fn("setUrl", |api: RequestApi, url: Dynamic| {
            let url = string_arg(&url, "url")?;
            api.mutate("setUrl", |req| {
                req.set_url(url);
                Ok(())
            })
        })
        .register_fn("setMethod", |api: RequestApi, method: Dynamic| {
            let method = string_arg(&method, "method")?;
            api.mutate("setMethod", |req| {
                req.set_method(method);
                Ok(())
            })
        })
        .register_fn("setHeader", |api: RequestApi, key: Dynamic, value: Dynamic| {
            let (key, value) = (string_arg(&key, "key")?, string_arg(&value, "value")?);
            api.mutate("setHeader", |req| {
                req.set_header(&key, &value);
                Ok(())
            })
        })
        .register_fn("setParam", |api: RequestApi, key: Dynamic, value: Dynamic| {
            let (key, value) = (string_arg(&key, "key")?, string_arg(&value, "value")?);
            api.mutate("setParam", |req| {
                req.set_param(&key, &value);
                Ok(())
            })
        })
        .register_fn("removeHeader", |api: RequestApi, key: Dynamic| {
            let key = string_arg(&key, "key")?;
            api.mutate("removeHeader", |req| {
                req.remove_header(&key);
                Ok(())
            })
        })
        .register_fn("removeParam", |api: RequestApi, key: Dynamic| {
            let key = string_arg(&key, "key")?;
            api.mutate("removeParam", |req| {
                req.remove_param(&key);
                Ok(())
            })
        })
        .register_fn("setHeaders", |api: RequestApi, list: Dynamic| {
            let list = to_json(&list)?;
            api.mutate("setHeaders", |req| req.set_headers(list))
        })
        .register_fn("setParams", |api: RequestApi, list: Dynamic| {
            let list = to_json(&list)?;
            api.mutate("setParams", |req| req.set_params(list))
        })
        .register_fn("setBody", |api: RequestApi, patch: Dynamic| {
            let patch = to_json(&patch)?;
            api.mutate("setBody", |req| req.set_body(patch))
        })
        .register_fn("setAuth", |api: RequestApi, patch: Dynamic| {
            let patch = to_json(&patch)?;
            api.mutate("setAuth", |req| req.set_auth(patch))
        });

    engine
        .register_type_with_name::<RequestVariablesApi>("RequestVariables")
        .register_fn("get", |api: RequestVariablesApi, key: Dynamic| -> RhaiResult<Dynamic> {
            let key = string_arg(&key, "key")?;
            let state = api.state.lock();
            Ok(state
                .request
                .variable(&key)
                .map(|value| Dynamic::from(value.to_string()))
                .unwrap_or(Dynamic::UNIT))
        })
        .register_fn("set", |api: RequestVariablesApi, key: Dynamic, value: Dynamic| -> RhaiResult<()> {
            let (key, value) = (string_arg(&key, "key")?, string_arg(&value, "value")?);
            let mut state = api.state.lock();
            ensure_pre_request(state.kind, api.namespace, "variables.set")?;
            state.request.set_variable(&key, &value);
            Ok(())
        });

    engine
        .register_type_with_name::<HeaderListApi>("HeaderList")
        .register_fn("get", |api: HeaderListApi, name: Dynamic| api.get(&name))
        .register_fn("has", |api: HeaderListApi, name: Dynamic| api.has(&name))
        .register_fn("toObject", |api: HeaderListApi| api.to_object())
        .register_fn("all", |api: HeaderListApi| api.all())
        .register_fn("add", |api: HeaderListApi, entry: Dynamic| {
            let (key, value) = entry_arg(&entry)?;
            api.mutate("add", |req| req.headers.push(KeyValue::new(key, value)))
        })
        .register_fn("upsert", |api: HeaderListApi, entry: Dynamic| {
            let (key, value) = entry_arg(&entry)?;
            api.mutate("upsert", |req| req.set_header(&key, &value))
        })
        .register_fn("remove", |api: HeaderListApi, name: Dynamic| {
            let name = string_arg(&name, "name")?;
            api.mutate("remove", |req| {
                req.remove_header(&name);
            })
        });

    engine
        .register_type_with_name::<UrlView>("Url")
        .register_get("protocol", |url: &mut UrlView| {
            url.parsed.as_ref().map(|u| u.scheme.clone()).unwrap_or_default()
        })
        .register_get("host", |url: &mut UrlView| string_list(url.host().split('.')))
        .register_get("port", |url: &mut UrlView| {
            url.parsed
                .as_ref()
                .map(|u| Dynamic::from(u.port.to_string()))
                .unwrap_or(Dynamic::UNIT)
        })
        .register_get("path", |url: &mut UrlView| string_list(url.path().split('/')))
        .register_get("query", |url: &mut UrlView| -> Map {
            url.parsed
                .as_ref()
                .map(|u| {
                    u.query_pairs()
                        .into_iter()
                        .map(|(k, v)| (k.into(), Dynamic::from(v)))
                        .collect()
                })
                .unwrap_or_default()
        })
        .register_get("raw", |url: &mut UrlView| url.raw.clone())
        .register_fn("getHost", |url: UrlView| url.host())
        .register_fn("getPath", |url: UrlView| url.path())
        .register_fn("getQueryString", |url: UrlView| url.query())
        .register_fn("getPort", |url: UrlView| -> INT {
            url.parsed.as_ref().map(|u| u.port as INT).unwrap_or(0)
        })
        .register_fn("toString", |url: UrlView| url.raw.clone())
        .register_fn("to_string", |url: &mut UrlView| url.raw.clone());
}

#[cfg(test)]
mod tests {
    use crate::http::{KeyValue, ResponseSnapshot};
    use crate::sandbox::modules::testing::{pre_request_state, run, test_state};
    use serde_json::json;

    #[test]
    fn test_hopp_request_setters() {
        let (result, state) = run(
            r#"
            hopp::request.setUrl("https://example.com/v2");
            hopp::request.setMethod("post");
            hopp::request.setHeader("X-Trace", "1");
            hopp::request.setHeader("x-trace", "2");
            hopp::request.setParam("page", "3");
            hopp::request.setBody(#{ contentType: "application/json", body: "{}" });
            hopp::request.setAuth(#{ token: "t" });
            hopp::request.variables.set("id", "42");
            "#,
            pre_request_state(),
        );
        result.unwrap();
        let req = state.request;
        assert_eq!(req.url, "https://example.com/v2");
        assert_eq!(req.method, "post");
        assert_eq!(req.headers, vec![KeyValue::new("X-Trace", "2")]);
        assert_eq!(req.param("page"), Some("3"));
        assert_eq!(req.body, json!({ "contentType": "application/json", "body": "{}" }));
        assert_eq!(req.auth["token"], "t");
        assert_eq!(req.auth["authType"], "inherit");
        assert_eq!(req.variable("id"), Some("42"));
    }

    #[test]
    fn test_set_headers_validation_is_catchable() {
        let (result, state) = run(
            r#"
            hopp::request.setHeader("A", "1");
            let caught = false;
            try {
                hopp::request.setHeaders(#{ wrong: "shape" });
            } catch (err) {
                caught = true;
            }
            if !caught { throw "expected a validation error"; }
            hopp::request.setHeaders([#{ key: "B", value: "2" }]);
            "#,
            pre_request_state(),
        );
        result.unwrap();
        assert_eq!(state.request.headers, vec![KeyValue::new("B", "2")]);
    }

    #[test]
    fn test_request_is_read_only_in_test_scripts() {
        let (result, state) = run(
            r#"
            if hopp::request.method != "GET" { throw "wrong method"; }
            hopp::request.setUrl("https://evil.example");
            "#,
            test_state(ResponseSnapshot::new(200, "")),
        );
        let err = result.unwrap_err();
        assert!(err.message().contains("not available in test scripts"));
        assert_eq!(state.request.url, "https://example.com/api");
    }

    #[test]
    fn test_pm_headers_and_url() {
        let mut state = pre_request_state();
        state.request.url = "https://api.example.com:8443/v1/users?page=2&sort=asc".to_string();
        let (result, state) = run(
            r#"
            pm::request.headers.add(#{ key: "Accept", value: "application/json" });
            pm::request.headers.upsert(#{ key: "accept", value: "text/plain" });
            pm::request.headers.add(#{ key: "X-Count", value: 3 });
            if !pm::request.headers.has("ACCEPT") { throw "missing header"; }
            let url = pm::request.url;
            if url.getHost() != "api.example.com" { throw "host: " + url.getHost(); }
            if url.getPath() != "/v1/users" { throw "path: " + url.getPath(); }
            if url.query.page != "2" { throw "query"; }
            if url.host.len() != 3 { throw "host parts"; }
            if url.port != "8443" { throw "port"; }
            pm::environment.set("qs", url.getQueryString());
            "#,
            state,
        );
        result.unwrap();
        assert_eq!(state.request.header("accept"), Some("text/plain"));
        assert_eq!(state.request.header("x-count"), Some("3"));
        assert_eq!(state.envs.get("qs").unwrap().value, "page=2&sort=asc");
    }
}
