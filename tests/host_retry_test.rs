use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ruscript::http::RequestSnapshot;
use ruscript::sandbox::{
    ExecutionHost, MAX_ATTEMPTS, ModuleSet, RhaiHost, RunState, SandboxConfig, SharedHost,
};
use ruscript::variable::Environments;
use ruscript::{PreRequestContext, SandboxError, ScriptRunner};

/// 按预设顺序返回结果的假宿主
struct ScriptedHost {
    attempts: Arc<AtomicUsize>,
    outcomes: Vec<fn() -> Result<(), SandboxError>>,
}

impl ExecutionHost for ScriptedHost {
    fn execute(&self, _script: &str, _modules: &ModuleSet) -> Result<(), SandboxError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes[attempt.min(self.outcomes.len() - 1)];
        outcome()
    }
}

fn shared_host(
    outcomes: Vec<fn() -> Result<(), SandboxError>>,
) -> (SharedHost, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let attempts = Arc::new(AtomicUsize::new(0));
    let builds = Arc::new(AtomicUsize::new(0));
    let (a, b) = (Arc::clone(&attempts), Arc::clone(&builds));
    let host = SharedHost::new(move || -> Result<Arc<dyn ExecutionHost>, SandboxError> {
        b.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedHost {
            attempts: Arc::clone(&a),
            outcomes: outcomes.clone(),
        }))
    });
    (host, attempts, builds)
}

fn modules() -> ModuleSet {
    ModuleSet::new(RunState::pre_request(
        RequestSnapshot::new("GET", "https://example.com"),
        Environments::default(),
        None,
    ))
}

fn infra() -> Result<(), SandboxError> {
    Err(SandboxError::infra("context corrupted"))
}

fn script_error() -> Result<(), SandboxError> {
    Err(SandboxError::runtime("ReferenceError: x is not defined"))
}

fn success() -> Result<(), SandboxError> {
    Ok(())
}

#[test]
fn test_infra_error_retried_once_then_succeeds() {
    let (host, attempts, builds) = shared_host(vec![infra, success]);
    assert!(host.run("script", modules).is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    // 出错的实例被丢弃并重建
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_script_error_never_retried() {
    let (host, attempts, builds) = shared_host(vec![script_error, success]);
    let err = host.run("script", modules).unwrap_err();
    assert_eq!(err.message(), "ReferenceError: x is not defined");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_second_infra_error_is_surfaced() {
    let (host, attempts, _) = shared_host(vec![infra, infra, success]);
    let err = host.run("script", modules).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
}

#[test]
fn test_instance_reused_across_runs() {
    let (host, attempts, builds) = shared_host(vec![success]);
    for _ in 0..3 {
        host.run("script", modules).unwrap();
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_factory_failure_is_retried() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let host = SharedHost::new(move || -> Result<Arc<dyn ExecutionHost>, SandboxError> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SandboxError::infra("bootstrap failed"))
        } else {
            Ok(Arc::new(RhaiHost::new(SandboxConfig::default())))
        }
    });
    assert!(host.run("let x = 1;", modules).is_ok());
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_retry_starts_from_clean_state() {
    // 第一次尝试写入的变量不能带到第二次
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    struct FlakyHost {
        inner: RhaiHost,
        attempts: Arc<AtomicUsize>,
    }
    impl ExecutionHost for FlakyHost {
        fn execute(&self, script: &str, modules: &ModuleSet) -> Result<(), SandboxError> {
            self.inner.execute(script, modules)?;
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SandboxError::infra("lost context after run"));
            }
            Ok(())
        }
    }

    let host = SharedHost::new(move || -> Result<Arc<dyn ExecutionHost>, SandboxError> {
        Ok(Arc::new(FlakyHost {
            inner: RhaiHost::default(),
            attempts: Arc::clone(&counter),
        }))
    });
    let runner = ScriptRunner::with_host(Arc::new(host));
    let result = runner
        .run_pre_request_script_blocking(
            r#"
            let n = hopp::env.get("n");
            hopp::env.set("n", if n == () { "1" } else { n + "1" });
            "#,
            PreRequestContext::default(),
        )
        .unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(result.updated_envs.get("n").unwrap().value, "1");
}
