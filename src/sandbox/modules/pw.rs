use rhai::Module;

use crate::sandbox::modules::{EnvApi, Namespace, ResponseApi, expect, finish};
use crate::sandbox::state::SharedState;
use crate::variable::EnvScope;

/// 旧命名空间 `pw::`
pub(super) fn module(state: &SharedState) -> Module {
    let mut module = Module::new();
    module.set_var("env", EnvApi::new(state, EnvScope::All, Namespace::Pw));

    let response = state.lock().response.clone();
    if let Some(response) = response {
        module.set_var("response", ResponseApi::new(state, response, Namespace::Pw));
    }

    expect::install(&mut module, state, Namespace::Pw);
    finish(module)
}
