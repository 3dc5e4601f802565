use chrono::Utc;
use rhai::{Dynamic, Engine, Module};
use tracing::debug;

use crate::sandbox::boundary::{RhaiResult, to_json};
use crate::sandbox::modules::finish;
use crate::sandbox::state::{ConsoleEntry, ConsoleLevel, SharedState};

// `debug` 是 Rhai 保留字，调试级输出走内置的 `debug(..)`，见 [`hook`]
const LEVELS: [(&str, ConsoleLevel); 4] = [
    ("log", ConsoleLevel::Log),
    ("info", ConsoleLevel::Info),
    ("warn", ConsoleLevel::Warn),
    ("error", ConsoleLevel::Error),
];

fn push(state: &SharedState, level: ConsoleLevel, args: &[Dynamic]) -> RhaiResult<()> {
    let args = args.iter().map(to_json).collect::<RhaiResult<Vec<_>>>()?;
    debug!(target: "ruscript::console", ?level, args = ?args, "console");
    state.lock().console.push(ConsoleEntry {
        level,
        args,
        timestamp: Utc::now(),
    });
    Ok(())
}

/// 把内置的 `print(..)`/`debug(..)` 记为 log/debug 级控制台输出
pub(super) fn hook(engine: &mut Engine, state: &SharedState) {
    let s = state.clone();
    engine.on_print(move |text| {
        // 记录失败只可能是参数转换，纯文本不会失败
        let _ = push(&s, ConsoleLevel::Log, &[Dynamic::from(text.to_string())]);
    });
    let s = state.clone();
    engine.on_debug(move |text, _source, _pos| {
        let _ = push(&s, ConsoleLevel::Debug, &[Dynamic::from(text.to_string())]);
    });
}

/// `console::log(...)` 等，最多四个参数
pub(super) fn module(state: &SharedState) -> Module {
    let mut module = Module::new();
    for (name, level) in LEVELS {
        let s = state.clone();
        module.set_native_fn(name, move |a: Dynamic| push(&s, level, &[a]));
        let s = state.clone();
        module.set_native_fn(name, move |a: Dynamic, b: Dynamic| push(&s, level, &[a, b]));
        let s = state.clone();
        module.set_native_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| {
            push(&s, level, &[a, b, c])
        });
        let s = state.clone();
        module.set_native_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
            push(&s, level, &[a, b, c, d])
        });
    }
    finish(module)
}
