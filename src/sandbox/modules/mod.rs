//! 注入脚本的命名空间
//!
//! `hopp`、`pw`、`pm` 三个命名空间都是同一份 [`RunState`] 上的薄适配层。

mod console;
mod cookies;
mod crypto;
mod env;
mod expect;
mod hopp;
mod pm;
mod pw;
mod request;
mod response;

use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Engine, Module};

use crate::crypto::{OsRandom, RandomSource};
use crate::sandbox::state::{RunState, ScriptKind, SharedState};

pub use cookies::CookieApi;
pub use env::EnvApi;
pub use expect::ExpectHandle;
pub use request::{HeaderListApi, RequestApi, UrlView};
pub use response::{BodyApi, ResponseApi, ResponseTo};

/// 命名空间风格，决定同名成员的细微差别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Hopp,
    Pw,
    Pm,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Hopp => "hopp",
            Namespace::Pw => "pw",
            Namespace::Pm => "pm",
        }
    }
}

/// 一次运行注入的全部模块
pub struct ModuleSet {
    state: SharedState,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleSet")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ModuleSet {
    pub fn new(state: RunState) -> Self {
        Self::with_random_source(state, Arc::new(OsRandom))
    }

    pub fn with_random_source(state: RunState, random: Arc<dyn RandomSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            random,
        }
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn kind(&self) -> ScriptKind {
        self.state.lock().kind
    }

    /// 注册类型并挂载各命名空间
    pub(crate) fn install(&self, engine: &mut Engine) {
        env::register(engine);
        request::register(engine);
        response::register(engine);
        cookies::register(engine);
        expect::register(engine);
        crypto::register(engine);
        pm::register(engine);

        engine.register_static_module("hopp", hopp::module(&self.state).into());
        engine.register_static_module("pw", pw::module(&self.state).into());
        engine.register_static_module("pm", pm::module(&self.state).into());
        engine.register_static_module("crypto", crypto::module(&self.random).into());
        engine.register_static_module("console", console::module(&self.state).into());
        console::hook(engine, &self.state);
    }

    /// 取回运行结束后的状态
    pub fn into_state(self) -> RunState {
        match Arc::try_unwrap(self.state) {
            Ok(state) => state.into_inner(),
            Err(shared) => shared.lock().clone(),
        }
    }
}

fn finish(mut module: Module) -> Module {
    module.build_index();
    module
}
