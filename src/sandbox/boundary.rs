//! 沙箱边界：脚本值与宿主值之间的转换

use rhai::{Array, Blob, Dynamic, EvalAltResult, FnPtr, INT, Map, Position};
use serde_json::{Number, Value};

use crate::assertion::Subject;

/// 结构遍历的最大深度
pub const MAX_DEPTH: usize = 64;

pub(crate) type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

/// 脚本可捕获的运行时错误
pub(crate) fn throw(message: impl Into<String>) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(Dynamic::from(message.into()), Position::NONE).into()
}

/// 剥掉函数调用包装后的根因
pub(crate) fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        other => other,
    }
}

/// 资源耗尽或宿主故障，不能在 test() 里被吞掉
pub(crate) fn is_fatal(err: &EvalAltResult) -> bool {
    matches!(
        root_cause(err),
        EvalAltResult::ErrorTerminated(..)
            | EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorStackOverflow(..)
            | EvalAltResult::ErrorDataTooLarge(..)
            | EvalAltResult::ErrorSystem(..)
    )
}

/// 脚本值 -> JSON，遇到自引用或过深结构时报错
pub fn to_json(value: &Dynamic) -> RhaiResult<Value> {
    let mut path = Vec::new();
    walk(value, &mut path).map_err(throw)
}

fn walk(value: &Dynamic, path: &mut Vec<usize>) -> Result<Value, String> {
    if path.len() > MAX_DEPTH {
        return Err(format!("Value is nested deeper than {} levels", MAX_DEPTH));
    }
    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(n) = value.as_int() {
        return Ok(Value::from(n));
    }
    if let Ok(f) = value.as_float() {
        return Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null));
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }
    if value.is_string() {
        return Ok(Value::String(value.to_string()));
    }
    if let Some(blob) = value.read_lock::<Blob>() {
        return Ok(Value::Array(blob.iter().map(|b| Value::from(*b)).collect()));
    }
    if let Some(items) = value.read_lock::<Array>() {
        let addr = &*items as *const Array as usize;
        enter(path, addr)?;
        let out = items
            .iter()
            .map(|item| walk(item, path))
            .collect::<Result<Vec<_>, _>>();
        path.pop();
        return out.map(Value::Array);
    }
    if let Some(map) = value.read_lock::<Map>() {
        let addr = &*map as *const Map as usize;
        enter(path, addr)?;
        let out = map
            .iter()
            .map(|(k, v)| walk(v, path).map(|v| (k.to_string(), v)))
            .collect::<Result<serde_json::Map<_, _>, _>>();
        path.pop();
        return out.map(Value::Object);
    }
    if value.is::<FnPtr>() {
        return Ok(Value::String("[Function]".to_string()));
    }
    Ok(Value::String(value.to_string()))
}

fn enter(path: &mut Vec<usize>, addr: usize) -> Result<(), String> {
    if path.contains(&addr) {
        return Err("Cannot pass a cyclic value across the sandbox boundary".to_string());
    }
    path.push(addr);
    Ok(())
}

pub fn to_dynamic(value: &Value) -> RhaiResult<Dynamic> {
    rhai::serde::to_dynamic(value)
}

/// 断言目标：大小和类型在转换成 JSON 前就捕获
pub fn subject(value: &Dynamic) -> RhaiResult<Subject> {
    if value.is_unit() {
        return Ok(Subject::unit());
    }
    if value.is::<FnPtr>() {
        return Ok(Subject::function());
    }
    let size = if let Some(map) = value.read_lock::<Map>() {
        Some(map.len())
    } else if let Some(items) = value.read_lock::<Array>() {
        Some(items.len())
    } else {
        None
    };
    let mut subject = Subject::from_json(to_json(value)?);
    if size.is_some() {
        subject.size = size;
    }
    Ok(subject)
}

/// 字节参数：整数数组、Blob 或 UTF-8 字符串
pub fn bytes(value: &Dynamic, what: &str) -> RhaiResult<Vec<u8>> {
    if value.is_string() {
        return Ok(value.to_string().into_bytes());
    }
    if let Some(blob) = value.read_lock::<Blob>() {
        return Ok(blob.clone());
    }
    let Some(items) = value.read_lock::<Array>() else {
        return Err(throw(format!("{} must be an array of bytes", what)));
    };
    items
        .iter()
        .map(|item| match item.as_int() {
            Ok(n) if (0..=255).contains(&n) => Ok(n as u8),
            _ => Err(throw(format!("{} must only contain integers 0..=255", what))),
        })
        .collect()
}

pub fn byte_array(bytes: &[u8]) -> Array {
    bytes.iter().map(|b| Dynamic::from_int(*b as INT)).collect()
}

/// 字符串参数；其他类型抛出类型错误
pub fn string_arg(value: &Dynamic, what: &str) -> RhaiResult<String> {
    if value.is_string() {
        Ok(value.to_string())
    } else {
        Err(throw(format!(
            "TypeError: {} must be a string, got {}",
            what,
            value.type_name()
        )))
    }
}

/// `String(value)` 风格的文本化
pub fn stringify(value: &Dynamic) -> RhaiResult<String> {
    if value.is_string() {
        return Ok(value.to_string());
    }
    if value.is_unit() {
        return Ok("undefined".to_string());
    }
    Ok(match to_json(value)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}
