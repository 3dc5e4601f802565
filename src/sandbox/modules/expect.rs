//! `test()` 与 `expect()`：两套断言词汇共用一个句柄

use rhai::{Dynamic, Engine, FnPtr, ImmutableString, Module, NativeCallContext};
use serde_json::Value;

use crate::assertion::{ChaiAssertion, ExpectResult, Expectation, Subject};
use crate::error::SandboxError;
use crate::sandbox::boundary::{RhaiResult, is_fatal, subject, throw, to_json};
use crate::sandbox::modules::Namespace;
use crate::sandbox::state::{ScriptKind, SharedState};

/// 不影响断言、只进入消息的链式词
const CHAIN_WORDS: [&str; 16] = [
    "to", "be", "been", "that", "which", "and", "has", "have", "at", "of", "same", "but", "does",
    "still", "also", "itself",
];

const FLAG_WORDS: [&str; 10] = [
    "not", "deep", "own", "any", "all", "nested", "include", "includes", "contain", "contains",
];

/// `expect(value)` 返回的断言句柄
#[derive(Clone)]
pub struct ExpectHandle {
    state: SharedState,
    chai: ChaiAssertion,
}

impl ExpectHandle {
    fn new(state: SharedState, subject: Subject) -> Self {
        Self {
            state,
            chai: ChaiAssertion::new(subject),
        }
    }

    fn chain(&self, word: &str) -> Self {
        Self {
            state: self.state.clone(),
            chai: self.chai.chain(word),
        }
    }

    fn record(self, result: ExpectResult) -> Self {
        self.state.lock().tests.record(result);
        self
    }

    /// 旧式匹配器，`.not` 同样生效
    fn legacy(&self) -> Expectation {
        let expectation = Expectation::new(self.chai.subject().clone());
        if self.chai.flags().negated {
            expectation.negate()
        } else {
            expectation
        }
    }
}

fn number(value: &Dynamic) -> Option<f64> {
    value
        .as_int()
        .map(|n| n as f64)
        .or_else(|_| value.as_float())
        .ok()
}

fn not_a_number(name: &str, value: &Dynamic) -> ExpectResult {
    ExpectResult::error(format!(
        "{} expects a number, got {}",
        name,
        value.type_name()
    ))
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => map.keys().cloned().collect(),
        other => vec![other.to_string()],
    }
}

fn list(value: &Dynamic) -> RhaiResult<Option<Vec<Value>>> {
    match to_json(value)? {
        Value::Array(items) => Ok(Some(items)),
        _ => Ok(None),
    }
}

type SubjectOp = fn(&ChaiAssertion, &Subject) -> ExpectResult;
type NumberOp = fn(&ChaiAssertion, f64) -> ExpectResult;

fn register_subject_op(engine: &mut Engine, names: &[&'static str], op: SubjectOp) {
    for &name in names {
        engine.register_fn(name, move |h: ExpectHandle, value: Dynamic| -> RhaiResult<ExpectHandle> {
            let result = op(&h.chai, &subject(&value)?);
            Ok(h.record(result))
        });
    }
}

fn register_number_op(engine: &mut Engine, names: &[&'static str], op: NumberOp) {
    for &name in names {
        engine.register_fn(name, move |h: ExpectHandle, value: Dynamic| {
            let result = match number(&value) {
                Some(n) => op(&h.chai, n),
                None => not_a_number(name, &value),
            };
            h.record(result)
        });
    }
}

pub(super) fn register(engine: &mut Engine) {
    engine.register_type_with_name::<ExpectHandle>("Expectation");

    for word in CHAIN_WORDS.into_iter().chain(FLAG_WORDS) {
        engine.register_get(word, move |h: &mut ExpectHandle| h.chain(word));
    }

    register_legacy(engine);

    register_subject_op(engine, &["equal", "equals", "eq"], ChaiAssertion::equal);
    register_subject_op(engine, &["eql"], ChaiAssertion::eql);
    register_subject_op(
        engine,
        &["include", "includes", "contain", "contains"],
        ChaiAssertion::include,
    );
    register_number_op(engine, &["above", "gt", "greaterThan"], ChaiAssertion::above);
    register_number_op(engine, &["below", "lt", "lessThan"], ChaiAssertion::below);
    register_number_op(engine, &["least", "gte"], ChaiAssertion::least);
    register_number_op(engine, &["most", "lte"], ChaiAssertion::most);
    register_number_op(engine, &["lengthOf", "length"], ChaiAssertion::length_of);

    for name in ["within", "closeTo", "approximately"] {
        engine.register_fn(name, move |h: ExpectHandle, a: Dynamic, b: Dynamic| {
            let result = match (number(&a), number(&b)) {
                (Some(a), Some(b)) if name == "within" => h.chai.within(a, b),
                (Some(a), Some(b)) => h.chai.close_to(a, b),
                (None, _) => not_a_number(name, &a),
                (_, None) => not_a_number(name, &b),
            };
            h.record(result)
        });
    }

    for name in ["a", "an"] {
        engine.register_fn(name, move |h: ExpectHandle, type_name: Dynamic| {
            let result = if type_name.is_string() {
                h.chai.a(&type_name.to_string())
            } else {
                ExpectResult::error(format!("{} expects a type name string", name))
            };
            h.record(result)
        });
    }

    engine
        .register_fn("property", |h: ExpectHandle, name: ImmutableString| {
            let (result, next) = h.chai.property(&name);
            let state = h.state.clone();
            h.record(result);
            ExpectHandle { state, chai: next }
        })
        .register_fn(
            "property",
            |h: ExpectHandle, name: ImmutableString, value: Dynamic| -> RhaiResult<ExpectHandle> {
                let result = h.chai.property_value(&name, &subject(&value)?);
                Ok(h.record(result))
            },
        )
        .register_fn("matches", |h: ExpectHandle, pattern: Dynamic| {
            let result = if pattern.is_string() {
                h.chai.matches(&pattern.to_string())
            } else {
                ExpectResult::error("matches expects a regular expression string")
            };
            h.record(result)
        })
        .register_fn("string", |h: ExpectHandle, needle: Dynamic| {
            let result = if needle.is_string() {
                h.chai.string(&needle.to_string())
            } else {
                ExpectResult::error("string expects a string argument")
            };
            h.record(result)
        })
        .register_fn("oneOf", |h: ExpectHandle, candidates: Dynamic| -> RhaiResult<ExpectHandle> {
            let result = match list(&candidates)? {
                Some(items) => h.chai.one_of(&items),
                None => ExpectResult::error("oneOf expects an array"),
            };
            Ok(h.record(result))
        })
        .register_fn("members", |h: ExpectHandle, expected: Dynamic| -> RhaiResult<ExpectHandle> {
            let result = match list(&expected)? {
                Some(items) => h.chai.members(&items),
                None => ExpectResult::error("members expects an array"),
            };
            Ok(h.record(result))
        })
        .register_fn("keys", |h: ExpectHandle, keys: Dynamic| -> RhaiResult<ExpectHandle> {
            let result = h.chai.keys(&strings(&to_json(&keys)?));
            Ok(h.record(result))
        })
        .register_fn(
            "keys",
            |h: ExpectHandle, a: Dynamic, b: Dynamic| -> RhaiResult<ExpectHandle> {
                let keys = [to_json(&a)?, to_json(&b)?];
                let result = h.chai.keys(&strings(&Value::Array(keys.to_vec())));
                Ok(h.record(result))
            },
        )
        .register_get("ok", |h: &mut ExpectHandle| {
            let result = h.chai.ok();
            h.clone().record(result)
        })
        .register_get("empty", |h: &mut ExpectHandle| {
            let result = h.chai.empty();
            h.clone().record(result)
        })
        .register_get("exist", |h: &mut ExpectHandle| {
            let result = h.chai.exist();
            h.clone().record(result)
        });
}

fn register_legacy(engine: &mut Engine) {
    engine
        .register_fn("toBe", |h: ExpectHandle, expected: Dynamic| -> RhaiResult<()> {
            let result = h.legacy().to_be(&subject(&expected)?);
            h.record(result);
            Ok(())
        })
        .register_fn("toBeType", |h: ExpectHandle, expected: Dynamic| -> RhaiResult<()> {
            let result = h.legacy().to_be_type(&subject(&expected)?);
            h.record(result);
            Ok(())
        })
        .register_fn("toHaveLength", |h: ExpectHandle, expected: Dynamic| -> RhaiResult<()> {
            let result = h.legacy().to_have_length(&subject(&expected)?);
            h.record(result);
            Ok(())
        })
        .register_fn("toInclude", |h: ExpectHandle, needle: Dynamic| -> RhaiResult<()> {
            let result = h.legacy().to_include(&subject(&needle)?);
            h.record(result);
            Ok(())
        });

    for (name, level) in [
        ("toBeLevel2xx", 2),
        ("toBeLevel3xx", 3),
        ("toBeLevel4xx", 4),
        ("toBeLevel5xx", 5),
    ] {
        engine.register_fn(name, move |h: ExpectHandle| {
            let result = h.legacy().to_be_level(level);
            h.record(result);
        });
    }
}

/// 执行一个 `test()` 块：进入子节点、运行测试体、恢复游标
///
/// 测试体里的普通错误记为该节点的 `error` 结果；资源耗尽等致命错误继续向外传播。
/// 调用测试体期间不持有状态锁。
fn run_test(ctx: &NativeCallContext, state: &SharedState, name: &str, body: &FnPtr) -> RhaiResult<()> {
    let saved = state.lock().tests.enter(name);
    let outcome = body.call_within_context::<Dynamic>(ctx, ());

    let result = match outcome {
        Ok(_) => Ok(()),
        Err(err) if is_fatal(&err) => Err(err),
        Err(err) => {
            let message = SandboxError::from(err).message();
            let mut guard = state.lock();
            guard.tests.leave(saved + 1);
            guard.tests.record(ExpectResult::error(message));
            Ok(())
        }
    };
    state.lock().tests.leave(saved);
    result
}

/// 在命名空间模块上挂 `test` 与 `expect`
pub(super) fn install(module: &mut Module, state: &SharedState, namespace: Namespace) {
    let kind = state.lock().kind;
    let prefix = namespace.prefix();

    if kind == ScriptKind::PreRequest {
        module.set_native_fn("test", move |_name: Dynamic, _body: Dynamic| -> RhaiResult<()> {
            Err(throw(format!("{}.test is not available in pre-request scripts", prefix)))
        });
        module.set_native_fn("expect", move |_value: Dynamic| -> RhaiResult<()> {
            Err(throw(format!("{}.expect is not available in pre-request scripts", prefix)))
        });
        return;
    }

    let test_state = state.clone();
    module.set_native_fn(
        "test",
        move |ctx: NativeCallContext, name: ImmutableString, body: FnPtr| {
            run_test(&ctx, &test_state, &name, &body)
        },
    );

    let expect_state = state.clone();
    module.set_native_fn("expect", move |value: Dynamic| -> RhaiResult<ExpectHandle> {
        Ok(ExpectHandle::new(expect_state.clone(), subject(&value)?))
    });
}
