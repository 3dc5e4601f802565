use ruscript::crypto::CryptoError;
use ruscript::http::CookieError;
use ruscript::variable::ResolveError;
use ruscript::{ErrorKind, Result, SandboxError};

#[test]
fn test_error_display() {
    let err = SandboxError::Validation("headers must be a list".to_string());
    assert_eq!(err.to_string(), "参数校验错误: headers must be a list");

    let err = SandboxError::Unsupported("pm.vault.get".to_string());
    assert_eq!(err.to_string(), "pm.vault.get is not supported");
    assert_eq!(err.message(), "pm.vault.get is not supported");
}

#[test]
fn test_error_kind_split() {
    assert_eq!(SandboxError::infra("context lost").kind(), ErrorKind::Infra);
    assert_eq!(SandboxError::runtime("boom").kind(), ErrorKind::Script);
    assert_eq!(
        SandboxError::Syntax {
            message: "unexpected token".to_string(),
            line: Some(1),
            column: Some(4),
        }
        .kind(),
        ErrorKind::Script
    );
    assert!(SandboxError::infra("context lost").is_retryable());
    assert!(!SandboxError::validation("bad").is_retryable());
}

#[test]
fn test_error_serializes_structured() {
    let value = serde_json::to_value(SandboxError::infra("context lost")).unwrap();
    assert_eq!(value["kind"], "infra");
    assert_eq!(value["type"], "infra");
    assert_eq!(value["message"], "context lost");

    let value = serde_json::to_value(SandboxError::Runtime {
        message: "boom".to_string(),
        line: Some(3),
    })
    .unwrap();
    assert_eq!(value["kind"], "script");
    assert_eq!(value["line"], 3);
}

#[test]
fn test_error_conversion_from_layers() {
    let err: SandboxError = CookieError::InvalidCookie("missing name".to_string()).into();
    assert!(matches!(err, SandboxError::Validation(_)));

    let err: SandboxError = CryptoError::InvalidAccess("decrypt".to_string()).into();
    assert_eq!(err.kind(), ErrorKind::Script);

    let err: SandboxError = ResolveError::ExpansionLoop(10).into();
    assert!(err.message().contains("expansion loop suspected"));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(SandboxError::Config("bad toml".to_string()))
    }

    match returns_error() {
        Err(SandboxError::Config(msg)) => assert_eq!(msg, "bad toml"),
        _ => panic!("Expected Config error"),
    }
}
