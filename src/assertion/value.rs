use serde_json::{Number, Value};

/// 断言目标的类型（跨边界复制前捕获）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 脚本里的 `()`，同时承担 undefined 和 null
    Unit,
    Boolean,
    Number,
    String,
    Array,
    Object,
    Function,
}

impl ValueKind {
    /// `typeof` 的结果
    pub fn type_of(&self) -> &'static str {
        match self {
            ValueKind::Unit => "undefined",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array | ValueKind::Object => "object",
            ValueKind::Function => "function",
        }
    }

    fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Unit,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// 断言的被测值：JSON 副本 + 类型 + 容器大小
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub value: Value,
    pub kind: ValueKind,
    pub size: Option<usize>,
}

impl Subject {
    pub fn new(value: Value, kind: ValueKind, size: Option<usize>) -> Self {
        Self { value, kind, size }
    }

    pub fn from_json(value: Value) -> Self {
        let kind = ValueKind::of(&value);
        let size = match &value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        };
        Self { value, kind, size }
    }

    pub fn unit() -> Self {
        Self::from_json(Value::Null)
    }

    pub fn function() -> Self {
        Self::new(Value::String("[Function]".to_string()), ValueKind::Function, None)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            ValueKind::Number => self.value.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.kind {
            ValueKind::String => self.value.as_str(),
            _ => None,
        }
    }

    /// JS 的真值判断
    pub fn is_truthy(&self) -> bool {
        match (&self.kind, &self.value) {
            (ValueKind::Unit, _) => false,
            (ValueKind::Boolean, Value::Bool(b)) => *b,
            (ValueKind::Number, value) => value.as_f64().is_some_and(|n| n != 0.0),
            (ValueKind::String, Value::String(s)) => !s.is_empty(),
            _ => true,
        }
    }

    /// `String(value)` 风格
    pub fn js_string(&self) -> String {
        match self.kind {
            ValueKind::Unit => "undefined".to_string(),
            ValueKind::Function => "function".to_string(),
            _ => js_string(&self.value),
        }
    }

    /// 断言消息中的展示形式
    pub fn display(&self) -> String {
        match self.kind {
            ValueKind::Unit => "undefined".to_string(),
            ValueKind::Function => "[Function]".to_string(),
            _ => format_value(&self.value),
        }
    }
}

pub fn js_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => js_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Number(n) => js_number(n),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}

/// 深比较，数值按 f64 比较（1 与 1.0 相等）
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| deep_equal(v, other)))
        }
        _ => a == b,
    }
}
