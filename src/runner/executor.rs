use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::crypto::{OsRandom, RandomSource};
use crate::error::SandboxError;
use crate::runner::types::{
    PreRequestContext, PreRequestResult, RunFailure, TestContext, TestRunResult,
};
use crate::sandbox::{ModuleSet, RunState, ScriptKind, SharedHost, SharedState};

/// 脚本运行入口
///
/// 异步版本把执行放到 tokio 的阻塞线程池里，脚本本身同步运行。
#[derive(Clone)]
pub struct ScriptRunner {
    host: Arc<SharedHost>,
    random: Arc<dyn RandomSource>,
}

impl ScriptRunner {
    /// 使用进程级共享宿主
    pub fn new() -> Self {
        Self::with_host(SharedHost::global())
    }

    pub fn with_host(host: Arc<SharedHost>) -> Self {
        Self {
            host,
            random: Arc::new(OsRandom),
        }
    }

    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// 执行前置脚本；失败时不返回任何对请求的修改
    pub fn run_pre_request_script_blocking(
        &self,
        script: &str,
        context: PreRequestContext,
    ) -> Result<PreRequestResult, RunFailure> {
        let PreRequestContext {
            request,
            envs,
            cookies,
        } = context;

        if script.trim().is_empty() {
            debug!("前置脚本为空，跳过");
            return Ok(PreRequestResult {
                updated_request: request,
                updated_envs: envs,
                updated_cookies: cookies,
                console: Vec::new(),
            });
        }

        let state = self.execute(script, RunState::pre_request(request, envs, cookies))?;
        Ok(PreRequestResult {
            updated_request: state.request,
            updated_envs: state.envs,
            updated_cookies: state.cookies,
            console: state.console,
        })
    }

    /// 执行测试脚本
    pub fn run_test_script_blocking(
        &self,
        script: &str,
        context: TestContext,
    ) -> Result<TestRunResult, RunFailure> {
        let TestContext {
            request,
            response,
            envs,
            cookies,
        } = context;

        let state = RunState::test(request, response, envs, cookies);
        if script.trim().is_empty() {
            debug!("测试脚本为空，跳过");
            return Ok(TestRunResult {
                tests: state.tests.into_root(),
                envs: state.envs,
                updated_cookies: state.cookies,
                console: Vec::new(),
            });
        }

        let state = self.execute(script, state)?;
        let result = TestRunResult {
            tests: state.tests.into_root(),
            envs: state.envs,
            updated_cookies: state.cookies,
            console: state.console,
        };
        let summary = result.summary();
        info!(
            tests = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            "测试脚本执行完成"
        );
        Ok(result)
    }

    pub async fn run_pre_request_script(
        &self,
        script: impl Into<String>,
        context: PreRequestContext,
    ) -> Result<PreRequestResult, RunFailure> {
        let runner = self.clone();
        let script = script.into();
        tokio::task::spawn_blocking(move || runner.run_pre_request_script_blocking(&script, context))
            .await
            .unwrap_or_else(|e| Err(RunFailure::bare(join_error(e))))
    }

    pub async fn run_test_script(
        &self,
        script: impl Into<String>,
        context: TestContext,
    ) -> Result<TestRunResult, RunFailure> {
        let runner = self.clone();
        let script = script.into();
        tokio::task::spawn_blocking(move || runner.run_test_script_blocking(&script, context))
            .await
            .unwrap_or_else(|e| Err(RunFailure::bare(join_error(e))))
    }

    /// 每次尝试都从输入的副本重新开始，失败的尝试不会泄漏修改
    fn execute(&self, script: &str, state: RunState) -> Result<RunState, RunFailure> {
        let kind = state.kind;
        let last: Mutex<Option<SharedState>> = Mutex::new(None);

        let result = self.host.run(script, || {
            let modules = ModuleSet::with_random_source(state.clone(), Arc::clone(&self.random));
            *last.lock() = Some(modules.state());
            modules
        });
        let last = last.lock().take();

        match result {
            Ok(modules) => Ok(modules.into_state()),
            Err(error) => {
                let partial = match error {
                    SandboxError::Runtime { .. } => last.map(|shared| shared.lock().clone()),
                    _ => None,
                };
                debug!(?kind, partial = partial.is_some(), "脚本运行失败");
                Err(match partial {
                    Some(state) => RunFailure {
                        error,
                        tests: (kind == ScriptKind::Test)
                            .then(|| state.tests.into_root()),
                        console: state.console,
                    },
                    None => RunFailure::bare(error),
                })
            }
        }
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn join_error(err: tokio::task::JoinError) -> SandboxError {
    SandboxError::infra(format!("script task aborted: {}", err))
}
