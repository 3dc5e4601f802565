use std::sync::Arc;

use rhai::{Dynamic, Engine, INT};

use crate::assertion::{ExpectResult, ResponseAssertion};
use crate::http::ResponseSnapshot;
use crate::sandbox::boundary::{RhaiResult, byte_array, string_arg, subject, throw, to_dynamic};
use crate::sandbox::modules::Namespace;
use crate::sandbox::modules::request::HeaderListApi;
use crate::sandbox::state::SharedState;

/// 只读的响应访问器，只在测试脚本中注入
#[derive(Clone)]
pub struct ResponseApi {
    state: SharedState,
    response: Arc<ResponseSnapshot>,
    namespace: Namespace,
}

impl ResponseApi {
    pub(crate) fn new(state: &SharedState, response: Arc<ResponseSnapshot>, namespace: Namespace) -> Self {
        Self {
            state: state.clone(),
            response,
            namespace,
        }
    }

    fn status(&self) -> Dynamic {
        match self.namespace {
            Namespace::Pm => Dynamic::from(self.response.reason()),
            Namespace::Hopp | Namespace::Pw => Dynamic::from_int(self.response.status as INT),
        }
    }

    fn headers(&self) -> RhaiResult<Dynamic> {
        match self.namespace {
            Namespace::Pw => {
                let value =
                    serde_json::to_value(&self.response.headers).map_err(|e| throw(e.to_string()))?;
                to_dynamic(&value)
            }
            Namespace::Hopp | Namespace::Pm => {
                Ok(Dynamic::from(HeaderListApi::response(&self.state, self.namespace)))
            }
        }
    }

    fn body(&self) -> RhaiResult<Dynamic> {
        match self.namespace {
            Namespace::Hopp => Ok(Dynamic::from(BodyApi {
                response: Arc::clone(&self.response),
            })),
            Namespace::Pw | Namespace::Pm => to_dynamic(&self.response.body_value()),
        }
    }

    fn json(&self) -> RhaiResult<Dynamic> {
        let value = self.response.json().map_err(|e| throw(e.message()))?;
        to_dynamic(&value)
    }
}

/// `hopp::response.body`
#[derive(Clone)]
pub struct BodyApi {
    response: Arc<ResponseSnapshot>,
}

/// `pm::response.to`：针对响应的断言链
#[derive(Clone)]
pub struct ResponseTo {
    state: SharedState,
    response: Arc<ResponseSnapshot>,
    negated: bool,
}

impl ResponseTo {
    fn assertion(&self) -> ResponseAssertion<'_> {
        let assertion = ResponseAssertion::new(&self.response);
        if self.negated { assertion.negate() } else { assertion }
    }

    fn record(self, result: ExpectResult) -> Self {
        self.state.lock().tests.record(result);
        self
    }

    fn negate(&self) -> Self {
        Self {
            negated: !self.negated,
            ..self.clone()
        }
    }
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<ResponseApi>("Response")
        .register_get("status", |api: &mut ResponseApi| api.status())
        .register_get("statusCode", |api: &mut ResponseApi| api.response.status as INT)
        .register_get("code", |api: &mut ResponseApi| api.response.status as INT)
        .register_get("statusText", |api: &mut ResponseApi| api.response.reason())
        .register_get("responseTime", |api: &mut ResponseApi| {
            api.response
                .response_time
                .map(|ms| Dynamic::from_int(ms as INT))
                .unwrap_or(Dynamic::UNIT)
        })
        .register_get("responseSize", |api: &mut ResponseApi| api.response.size() as INT)
        .register_get("headers", |api: &mut ResponseApi| api.headers())
        .register_get("body", |api: &mut ResponseApi| api.body())
        .register_get("to", |api: &mut ResponseApi| ResponseTo {
            state: api.state.clone(),
            response: Arc::clone(&api.response),
            negated: false,
        })
        .register_fn("text", |api: ResponseApi| api.response.text())
        .register_fn("json", |api: ResponseApi| api.json())
        .register_fn("reason", |api: ResponseApi| api.response.reason())
        .register_fn("dataURI", |api: ResponseApi| api.response.data_uri());

    engine
        .register_type_with_name::<BodyApi>("ResponseBody")
        .register_fn("asJSON", |body: BodyApi| -> RhaiResult<Dynamic> {
            let value = body.response.json().map_err(|e| throw(e.message()))?;
            to_dynamic(&value)
        })
        .register_fn("asText", |body: BodyApi| body.response.text())
        .register_fn("bytes", |body: BodyApi| byte_array(&body.response.bytes()));

    engine
        .register_type_with_name::<ResponseTo>("ResponseAssertion")
        .register_get("to", |to: &mut ResponseTo| to.clone())
        .register_get("be", |to: &mut ResponseTo| to.clone())
        .register_get("have", |to: &mut ResponseTo| to.clone())
        .register_get("and", |to: &mut ResponseTo| to.clone())
        .register_get("not", |to: &mut ResponseTo| to.negate())
        .register_get("ok", |to: &mut ResponseTo| {
            let result = to.assertion().ok();
            to.clone().record(result)
        })
        .register_fn("status", |to: ResponseTo, code: Dynamic| -> RhaiResult<ResponseTo> {
            let result = to.assertion().status(&subject(&code)?);
            Ok(to.record(result))
        })
        .register_fn("header", |to: ResponseTo, name: Dynamic| -> RhaiResult<ResponseTo> {
            let name = string_arg(&name, "name")?;
            let result = to.assertion().header(&name, None);
            Ok(to.record(result))
        })
        .register_fn(
            "header",
            |to: ResponseTo, name: Dynamic, value: Dynamic| -> RhaiResult<ResponseTo> {
                let name = string_arg(&name, "name")?;
                let result = to.assertion().header(&name, Some(&subject(&value)?));
                Ok(to.record(result))
            },
        )
        .register_fn("body", |to: ResponseTo, expected: Dynamic| -> RhaiResult<ResponseTo> {
            let result = to.assertion().body(&subject(&expected)?);
            Ok(to.record(result))
        })
        .register_fn("jsonBody", |to: ResponseTo| {
            let result = to.assertion().json_body(None, None);
            to.record(result)
        })
        .register_fn("jsonBody", |to: ResponseTo, key: Dynamic| -> RhaiResult<ResponseTo> {
            let key = string_arg(&key, "key")?;
            let result = to.assertion().json_body(Some(&key), None);
            Ok(to.record(result))
        })
        .register_fn(
            "jsonBody",
            |to: ResponseTo, key: Dynamic, value: Dynamic| -> RhaiResult<ResponseTo> {
                let key = string_arg(&key, "key")?;
                let result = to.assertion().json_body(Some(&key), Some(&subject(&value)?));
                Ok(to.record(result))
            },
        );
}
