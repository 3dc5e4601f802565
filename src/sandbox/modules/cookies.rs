use rhai::{Array, Dynamic, Engine};

use crate::http::{Cookie, CookieJar};
use crate::sandbox::boundary::{RhaiResult, string_arg, throw, to_dynamic, to_json};
use crate::sandbox::state::SharedState;

const UNSUPPORTED: &str = "Cookies are not supported in the current platform";

/// cookie jar 的增删改查
#[derive(Clone)]
pub struct CookieApi {
    state: SharedState,
}

impl CookieApi {
    pub(crate) fn new(state: &SharedState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    fn with_jar<T>(&self, f: impl FnOnce(&mut CookieJar) -> RhaiResult<T>) -> RhaiResult<T> {
        let mut state = self.state.lock();
        match state.cookies.as_mut() {
            Some(jar) => f(jar),
            None => Err(throw(UNSUPPORTED)),
        }
    }

    fn get(&self, domain: &Dynamic, name: &Dynamic) -> RhaiResult<Dynamic> {
        let domain = string_arg(domain, "domain")?;
        let name = string_arg(name, "name")?;
        self.with_jar(|jar| match jar.get(&domain, &name) {
            Some(cookie) => cookie_value(cookie),
            None => Ok(Dynamic::UNIT),
        })
    }

    fn has(&self, domain: &Dynamic, name: &Dynamic) -> RhaiResult<bool> {
        let domain = string_arg(domain, "domain")?;
        let name = string_arg(name, "name")?;
        self.with_jar(|jar| Ok(jar.has(&domain, &name)))
    }

    fn get_all(&self, domain: &Dynamic) -> RhaiResult<Array> {
        let domain = string_arg(domain, "domain")?;
        self.with_jar(|jar| jar.get_all(&domain).into_iter().map(cookie_value).collect())
    }

    /// 先校验形状再写入
    fn set(&self, domain: &Dynamic, cookie: &Dynamic) -> RhaiResult<()> {
        let domain = string_arg(domain, "domain")?;
        let cookie = Cookie::from_value(to_json(cookie)?).map_err(|e| throw(e.to_string()))?;
        self.with_jar(|jar| jar.set(&domain, cookie).map_err(|e| throw(e.to_string())))
    }

    fn delete(&self, domain: &Dynamic, name: &Dynamic) -> RhaiResult<()> {
        let domain = string_arg(domain, "domain")?;
        let name = string_arg(name, "name")?;
        self.with_jar(|jar| {
            jar.delete(&domain, &name);
            Ok(())
        })
    }

    fn clear(&self, domain: &Dynamic) -> RhaiResult<()> {
        let domain = string_arg(domain, "domain")?;
        self.with_jar(|jar| {
            jar.clear(&domain);
            Ok(())
        })
    }
}

fn cookie_value(cookie: &Cookie) -> RhaiResult<Dynamic> {
    let value = serde_json::to_value(cookie).map_err(|e| throw(e.to_string()))?;
    to_dynamic(&value)
}

pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<CookieApi>("Cookies")
        .register_fn("get", |api: CookieApi, domain: Dynamic, name: Dynamic| {
            api.get(&domain, &name)
        })
        .register_fn("has", |api: CookieApi, domain: Dynamic, name: Dynamic| {
            api.has(&domain, &name)
        })
        .register_fn("getAll", |api: CookieApi, domain: Dynamic| api.get_all(&domain))
        .register_fn("set", |api: CookieApi, domain: Dynamic, cookie: Dynamic| {
            api.set(&domain, &cookie)
        })
        .register_fn("delete", |api: CookieApi, domain: Dynamic, name: Dynamic| {
            api.delete(&domain, &name)
        })
        .register_fn("clear", |api: CookieApi, domain: Dynamic| api.clear(&domain));
}
