use rhai::{Dynamic, Engine, Map};

use crate::sandbox::boundary::{RhaiResult, string_arg, stringify, throw};
use crate::sandbox::modules::Namespace;
use crate::sandbox::state::SharedState;
use crate::variable::{EnvScope, ResolveOptions, VariableResolver};

/// 环境变量访问器：`hopp::env`、`pw::env`、`pm::environment` 等
#[derive(Clone)]
pub struct EnvApi {
    state: SharedState,
    scope: EnvScope,
    namespace: Namespace,
}

impl EnvApi {
    pub(crate) fn new(state: &SharedState, scope: EnvScope, namespace: Namespace) -> Self {
        Self {
            state: state.clone(),
            scope,
            namespace,
        }
    }

    fn scoped(&self, scope: EnvScope) -> Self {
        Self {
            scope,
            ..self.clone()
        }
    }

    fn raw(&self, key: &Dynamic) -> RhaiResult<Dynamic> {
        let key = string_arg(key, "key")?;
        let state = self.state.lock();
        Ok(state
            .envs
            .lookup(&key, self.scope)
            .map(|var| Dynamic::from(var.value.clone()))
            .unwrap_or(Dynamic::UNIT))
    }

    fn initial(&self, key: &Dynamic) -> RhaiResult<Dynamic> {
        let key = string_arg(key, "key")?;
        let state = self.state.lock();
        Ok(state
            .envs
            .lookup(&key, self.scope)
            .map(|var| Dynamic::from(var.initial().to_string()))
            .unwrap_or(Dynamic::UNIT))
    }

    /// 变量值中的 `<<name>>` 也会被展开
    fn resolved(&self, key: &Dynamic) -> RhaiResult<Dynamic> {
        let key = string_arg(key, "key")?;
        let state = self.state.lock();
        let Some(var) = state.envs.lookup(&key, self.scope) else {
            return Ok(Dynamic::UNIT);
        };
        state
            .envs
            .resolve(&var.value, ResolveOptions::default())
            .map(Dynamic::from)
            .map_err(|e| throw(e.to_string()))
    }

    fn value_arg(&self, value: &Dynamic) -> RhaiResult<String> {
        match self.namespace {
            Namespace::Pm => stringify(value),
            Namespace::Hopp | Namespace::Pw => string_arg(value, "value"),
        }
    }

    fn set(&self, key: &Dynamic, value: &Dynamic) -> RhaiResult<()> {
        let key = string_arg(key, "key")?;
        let value = self.value_arg(value)?;
        self.state.lock().envs.set(&key, value, self.scope);
        Ok(())
    }

    fn set_initial(&self, key: &Dynamic, value: &Dynamic) -> RhaiResult<()> {
        let key = string_arg(key, "key")?;
        let value = self.value_arg(value)?;
        self.state.lock().envs.set_initial(&key, value, self.scope);
        Ok(())
    }

    fn unset(&self, key: &Dynamic) -> RhaiResult<()> {
        let key = string_arg(key, "key")?;
        self.state.lock().envs.unset(&key, self.scope);
        Ok(())
    }

    fn reset(&self, key: &Dynamic) -> RhaiResult<()> {
        let key = string_arg(key, "key")?;
        self.state.lock().envs.reset(&key, self.scope);
        Ok(())
    }

    fn has(&self, key: &Dynamic) -> RhaiResult<bool> {
        let key = string_arg(key, "key")?;
        Ok(self.state.lock().envs.lookup(&key, self.scope).is_some())
    }

    fn resolve(&self, template: &Dynamic) -> RhaiResult<String> {
        let template = string_arg(template, "template")?;
        self.state
            .lock()
            .envs
            .resolve(&template, ResolveOptions::default())
            .map_err(|e| throw(e.to_string()))
    }

    /// `{{name}}` 单轮替换
    fn replace_in(&self, template: &Dynamic) -> RhaiResult<String> {
        let template = string_arg(template, "template")?;
        let state = self.state.lock();
        let scope = self.scope;
        Ok(VariableResolver::replace_in(&template, |key| {
            state.envs.lookup(key, scope).map(|var| var.value.as_str())
        }))
    }

    fn to_object(&self) -> Map {
        self.state
            .lock()
            .envs
            .to_map(self.scope)
            .into_iter()
            .map(|(key, value)| (key.into(), Dynamic::from(value)))
            .collect()
    }

    fn clear(&self) {
        self.state.lock().envs.clear(self.scope);
    }
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<EnvApi>("Environment")
        .register_get("active", |api: &mut EnvApi| api.scoped(EnvScope::Active))
        // `global` 是保留字
        .register_get("globals", |api: &mut EnvApi| api.scoped(EnvScope::Global))
        .register_fn("get", |api: EnvApi, key: Dynamic| match api.namespace {
            Namespace::Hopp => api.resolved(&key),
            Namespace::Pw | Namespace::Pm => api.raw(&key),
        })
        .register_fn("getRaw", |api: EnvApi, key: Dynamic| api.raw(&key))
        .register_fn("getResolve", |api: EnvApi, key: Dynamic| api.resolved(&key))
        .register_fn("getInitialRaw", |api: EnvApi, key: Dynamic| api.initial(&key))
        .register_fn("set", |api: EnvApi, key: Dynamic, value: Dynamic| {
            api.set(&key, &value)
        })
        .register_fn("setInitial", |api: EnvApi, key: Dynamic, value: Dynamic| {
            api.set_initial(&key, &value)
        })
        .register_fn("unset", |api: EnvApi, key: Dynamic| api.unset(&key))
        .register_fn("delete", |api: EnvApi, key: Dynamic| api.unset(&key))
        .register_fn("reset", |api: EnvApi, key: Dynamic| api.reset(&key))
        .register_fn("has", |api: EnvApi, key: Dynamic| api.has(&key))
        .register_fn("resolve", |api: EnvApi, template: Dynamic| api.resolve(&template))
        .register_fn("replaceIn", |api: EnvApi, template: Dynamic| {
            api.replace_in(&template)
        })
        .register_fn("toObject", |api: EnvApi| api.to_object())
        .register_fn("clear", |api: EnvApi| api.clear());
}
