use rhai::{Dynamic, EvalAltResult, ParseError};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use thiserror::Error;

/// 错误归类：基础设施故障可重试，脚本错误永不重试
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Infra,
    Script,
}

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("沙箱基础设施错误: {0}")]
    Infra(String),

    #[error("脚本语法错误: {message}")]
    Syntax {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("脚本运行错误: {message}")]
    Runtime {
        message: String,
        line: Option<usize>,
    },

    #[error("参数校验错误: {0}")]
    Validation(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    pub fn infra(message: impl Into<String>) -> Self {
        SandboxError::Infra(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        SandboxError::Runtime {
            message: message.into(),
            line: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SandboxError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SandboxError::Infra(_) | SandboxError::Config(_) | SandboxError::Io(_) => {
                ErrorKind::Infra
            }
            _ => ErrorKind::Script,
        }
    }

    /// 只有沙箱内部故障才允许重建宿主后重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, SandboxError::Infra(_))
    }

    /// 不带分类前缀的原始消息
    pub fn message(&self) -> String {
        match self {
            SandboxError::Infra(message)
            | SandboxError::Validation(message)
            | SandboxError::Config(message) => message.clone(),
            SandboxError::Syntax { message, .. } | SandboxError::Runtime { message, .. } => {
                message.clone()
            }
            SandboxError::Unsupported(_) => self.to_string(),
            SandboxError::Io(err) => err.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SandboxError::Infra(_) => "infra",
            SandboxError::Syntax { .. } => "syntax",
            SandboxError::Runtime { .. } => "runtime",
            SandboxError::Validation(_) => "validation",
            SandboxError::Unsupported(_) => "unsupported",
            SandboxError::Config(_) => "config",
            SandboxError::Io(_) => "io",
        }
    }

    pub fn from_parse(err: &ParseError) -> Self {
        SandboxError::Syntax {
            message: err.0.to_string(),
            line: err.1.line(),
            column: err.1.position(),
        }
    }
}

impl Serialize for SandboxError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SandboxError", 5)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("type", self.type_name())?;
        state.serialize_field("message", &self.message())?;
        match self {
            SandboxError::Syntax { line, column, .. } => {
                state.serialize_field("line", line)?;
                state.serialize_field("column", column)?;
            }
            SandboxError::Runtime { line, .. } => {
                state.serialize_field("line", line)?;
                state.skip_field("column")?;
            }
            _ => {
                state.skip_field("line")?;
                state.skip_field("column")?;
            }
        }
        state.end()
    }
}

impl From<Box<EvalAltResult>> for SandboxError {
    fn from(err: Box<EvalAltResult>) -> Self {
        let line = err.position().line();
        match *innermost(err) {
            EvalAltResult::ErrorSystem(message, inner) => {
                SandboxError::Infra(format!("{}: {}", message, inner))
            }
            EvalAltResult::ErrorParsing(kind, pos) => SandboxError::Syntax {
                message: kind.to_string(),
                line: pos.line(),
                column: pos.position(),
            },
            EvalAltResult::ErrorRuntime(value, pos) => SandboxError::Runtime {
                message: thrown_message(&value),
                line: pos.line().or(line),
            },
            other => SandboxError::Runtime {
                message: other.to_string(),
                line: other.position().line().or(line),
            },
        }
    }
}

/// 剥掉函数调用包装，取出真正抛出的错误
pub(crate) fn innermost(err: Box<EvalAltResult>) -> Box<EvalAltResult> {
    match *err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => innermost(inner),
        other => Box::new(other),
    }
}

/// `throw` 的值可能是字符串、带 message 字段的对象或任意值
pub(crate) fn thrown_message(value: &Dynamic) -> String {
    if value.is_string() {
        return value.to_string();
    }
    if let Some(map) = value.read_lock::<rhai::Map>()
        && let Some(message) = map.get("message")
    {
        return message.to_string();
    }
    value.to_string()
}

/// Result type for ruscript crate
pub type Result<T> = std::result::Result<T, SandboxError>;
