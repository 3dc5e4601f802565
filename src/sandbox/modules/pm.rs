use rhai::{Dynamic, Engine, Module};

use crate::error::SandboxError;
use crate::sandbox::boundary::{RhaiResult, throw};
use crate::sandbox::modules::{
    CookieApi, EnvApi, Namespace, RequestApi, ResponseApi, expect, finish,
};
use crate::sandbox::state::SharedState;
use crate::variable::EnvScope;

/// 故意不实现的成员
const UNSUPPORTED_OBJECTS: [&str; 5] = [
    "vault",
    "iterationData",
    "collectionVariables",
    "execution",
    "visualizer",
];

const UNSUPPORTED_METHODS: [&str; 11] = [
    "get",
    "set",
    "unset",
    "has",
    "clear",
    "toObject",
    "replaceIn",
    "toJSON",
    "setNextRequest",
    "skipRequest",
    "runRequest",
];

fn unsupported(member: &str) -> Box<rhai::EvalAltResult> {
    throw(SandboxError::Unsupported(member.to_string()).to_string())
}

/// `pm::info`
#[derive(Clone)]
pub struct InfoApi {
    state: SharedState,
}

/// 调用任何成员都抛出 "is not supported"
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedApi {
    name: &'static str,
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<InfoApi>("Info")
        .register_get("eventName", |info: &mut InfoApi| {
            info.state.lock().kind.event_name().to_string()
        })
        .register_get("requestName", |info: &mut InfoApi| {
            info.state.lock().request.name.clone().unwrap_or_default()
        })
        .register_get("requestId", |info: &mut InfoApi| {
            info.state.lock().request.id.clone().unwrap_or_default()
        })
        .register_get("iteration", |_: &mut InfoApi| -> RhaiResult<Dynamic> {
            Err(unsupported("pm.info.iteration"))
        })
        .register_get("iterationCount", |_: &mut InfoApi| -> RhaiResult<Dynamic> {
            Err(unsupported("pm.info.iterationCount"))
        });

    engine.register_type_with_name::<UnsupportedApi>("Unsupported");
    for method in UNSUPPORTED_METHODS {
        engine
            .register_fn(method, move |api: UnsupportedApi| -> RhaiResult<Dynamic> {
                Err(unsupported(&format!("pm.{}.{}", api.name, method)))
            })
            .register_fn(method, move |api: UnsupportedApi, _: Dynamic| -> RhaiResult<Dynamic> {
                Err(unsupported(&format!("pm.{}.{}", api.name, method)))
            })
            .register_fn(
                method,
                move |api: UnsupportedApi, _: Dynamic, _: Dynamic| -> RhaiResult<Dynamic> {
                    Err(unsupported(&format!("pm.{}.{}", api.name, method)))
                },
            );
    }
}

/// 兼容命名空间 `pm::`
pub(super) fn module(state: &SharedState) -> Module {
    let mut module = Module::new();
    module.set_var("environment", EnvApi::new(state, EnvScope::Active, Namespace::Pm));
    module.set_var("globals", EnvApi::new(state, EnvScope::Global, Namespace::Pm));
    module.set_var("variables", EnvApi::new(state, EnvScope::All, Namespace::Pm));
    module.set_var("request", RequestApi::new(state, Namespace::Pm));
    module.set_var("cookies", CookieApi::new(state));
    module.set_var("info", InfoApi { state: state.clone() });

    let response = state.lock().response.clone();
    if let Some(response) = response {
        module.set_var("response", ResponseApi::new(state, response, Namespace::Pm));
    }

    for name in UNSUPPORTED_OBJECTS {
        module.set_var(name, UnsupportedApi { name });
    }
    for name in ["sendRequest", "require"] {
        module.set_native_fn(name, move |_: Dynamic| -> RhaiResult<Dynamic> {
            Err(unsupported(&format!("pm.{}", name)))
        });
        module.set_native_fn(name, move |_: Dynamic, _: Dynamic| -> RhaiResult<Dynamic> {
            Err(unsupported(&format!("pm.{}", name)))
        });
    }

    expect::install(&mut module, state, Namespace::Pm);
    finish(module)
}
