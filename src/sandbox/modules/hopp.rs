use rhai::Module;

use crate::sandbox::modules::{
    CookieApi, EnvApi, Namespace, RequestApi, ResponseApi, expect, finish,
};
use crate::sandbox::state::SharedState;
use crate::variable::EnvScope;

/// 统一命名空间 `hopp::`
pub(super) fn module(state: &SharedState) -> Module {
    let mut module = Module::new();
    module.set_var("env", EnvApi::new(state, EnvScope::All, Namespace::Hopp));
    module.set_var("request", RequestApi::new(state, Namespace::Hopp));
    module.set_var("cookies", CookieApi::new(state));

    let response = state.lock().response.clone();
    if let Some(response) = response {
        module.set_var("response", ResponseApi::new(state, response, Namespace::Hopp));
    }

    expect::install(&mut module, state, Namespace::Hopp);
    finish(module)
}
