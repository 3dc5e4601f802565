use std::any::Any;
use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rhai::packages::{Package, StandardPackage};
use rhai::{Engine, Module, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SandboxError;
use crate::sandbox::composer;
use crate::sandbox::modules::ModuleSet;

/// 含首次在内的最大执行次数
pub const MAX_ATTEMPTS: usize = 2;

/// 引擎资源上限，来自 `ruscript.toml` 的 `[sandbox]` 段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// 0 表示不限制
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    /// 执行线程的栈大小（字节），嵌套很深的 test() 需要
    pub stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_expr_depth: 256,
            max_function_expr_depth: 256,
            max_string_size: 10 * 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 100_000,
            stack_size: 16 * 1024 * 1024,
        }
    }
}

/// 隔离执行脚本的宿主
pub trait ExecutionHost: Send + Sync {
    fn execute(&self, script: &str, modules: &ModuleSet) -> Result<(), SandboxError>;
}

/// Rhai 宿主：进程内共享标准库，每次执行构建独立的引擎上下文
pub struct RhaiHost {
    std: Shared<Module>,
    config: SandboxConfig,
}

impl RhaiHost {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            std: StandardPackage::new().as_shared_module(),
            config,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn engine(&self, modules: &ModuleSet) -> Engine {
        let mut engine = Engine::new_raw();
        engine.register_global_module(self.std.clone());

        let limits = &self.config;
        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth)
            .set_max_string_size(limits.max_string_size)
            .set_max_array_size(limits.max_array_size)
            .set_max_map_size(limits.max_map_size);

        engine.disable_symbol("eval");

        modules.install(&mut engine);
        engine
    }

    fn run(&self, script: &str, modules: &ModuleSet) -> Result<(), SandboxError> {
        let engine = self.engine(modules);
        // 先编译全部片段，任何语法错误都发生在执行之前
        let asts = composer::fragments(script)
            .map(|fragment| engine.compile(fragment).map_err(|e| SandboxError::from_parse(&e)))
            .collect::<Result<Vec<_>, _>>()?;
        for ast in &asts {
            engine.run_ast(ast)?;
        }
        Ok(())
    }
}

impl Default for RhaiHost {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl ExecutionHost for RhaiHost {
    /// 在独立的执行线程上运行，线程 panic 视为基础设施故障
    fn execute(&self, script: &str, modules: &ModuleSet) -> Result<(), SandboxError> {
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("ruscript-engine".to_string())
                .stack_size(self.config.stack_size)
                .spawn_scoped(scope, || self.run(script, modules))
                .map_err(|e| SandboxError::infra(format!("failed to start script thread: {}", e)))?;
            worker.join().unwrap_or_else(|payload| {
                Err(SandboxError::infra(format!(
                    "script engine panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 构建宿主实例的工厂
pub trait HostFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn ExecutionHost>, SandboxError>;
}

impl<F> HostFactory for F
where
    F: Fn() -> Result<Arc<dyn ExecutionHost>, SandboxError> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn ExecutionHost>, SandboxError> {
        self()
    }
}

static GLOBAL_HOST: Lazy<Arc<SharedHost>> =
    Lazy::new(|| Arc::new(SharedHost::with_config(SandboxConfig::default())));

/// 懒加载的共享宿主，基础设施故障时丢弃实例并重试一次
pub struct SharedHost {
    factory: Box<dyn HostFactory>,
    slot: Mutex<Option<Arc<dyn ExecutionHost>>>,
}

impl SharedHost {
    pub fn new(factory: impl HostFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    pub fn with_config(config: SandboxConfig) -> Self {
        Self::new(move || -> Result<Arc<dyn ExecutionHost>, SandboxError> {
            Ok(Arc::new(RhaiHost::new(config.clone())))
        })
    }

    /// 进程级单例
    pub fn global() -> Arc<SharedHost> {
        Arc::clone(&GLOBAL_HOST)
    }

    fn instance(&self) -> Result<Arc<dyn ExecutionHost>, SandboxError> {
        let mut slot = self.slot.lock();
        if let Some(host) = slot.as_ref() {
            return Ok(Arc::clone(host));
        }
        debug!("构建沙箱宿主实例");
        let host = self.factory.create()?;
        *slot = Some(Arc::clone(&host));
        Ok(host)
    }

    /// 只丢弃出错的那个实例，别的调用可能已经换上了新的
    fn discard(&self, broken: &Arc<dyn ExecutionHost>) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|host| Arc::ptr_eq(host, broken)) {
            *slot = None;
        }
    }

    /// 执行脚本；每次尝试都用 `make_modules` 重新构建模块
    pub fn run<F>(&self, script: &str, make_modules: F) -> Result<ModuleSet, SandboxError>
    where
        F: Fn() -> ModuleSet,
    {
        let mut attempt = 1;
        loop {
            let modules = make_modules();
            let result = self.instance().and_then(|host| {
                let result = host.execute(script, &modules);
                if result.as_ref().is_err_and(SandboxError::is_retryable) {
                    self.discard(&host);
                }
                result
            });

            match result {
                Ok(()) => {
                    debug!(attempt, script_len = script.len(), "脚本执行完成");
                    return Ok(modules);
                }
                Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %err, "沙箱基础设施故障，重建宿主后重试");
                    attempt += 1;
                }
                Err(err) => {
                    info!(attempt, kind = ?err.kind(), error = %err, "脚本执行失败");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestSnapshot;
    use crate::sandbox::state::RunState;
    use crate::variable::Environments;

    fn modules() -> ModuleSet {
        ModuleSet::new(RunState::pre_request(
            RequestSnapshot::new("GET", "https://example.com"),
            Environments::default(),
            None,
        ))
    }

    #[test]
    fn test_syntax_error_classified() {
        let host = RhaiHost::default();
        let err = host.execute("let x = ;", &modules()).unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { line: Some(1), .. }), "got {:?}", err);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_runtime_error_classified() {
        let host = RhaiHost::default();
        let err = host.execute("throw \"bad input\";", &modules()).unwrap_err();
        assert_eq!(err.message(), "bad input");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_runaway_script_is_bounded() {
        let host = RhaiHost::new(SandboxConfig {
            max_operations: 10_000,
            ..SandboxConfig::default()
        });
        let err = host.execute("loop { }", &modules()).unwrap_err();
        assert!(matches!(err, SandboxError::Runtime { .. }), "got {:?}", err);
    }

    #[test]
    fn test_eval_is_disabled() {
        let host = RhaiHost::default();
        assert!(host.execute("eval(\"1 + 1\")", &modules()).is_err());
    }

    #[test]
    fn test_contexts_are_isolated_between_calls() {
        let host = RhaiHost::default();
        host.execute("let leaked = 42;", &modules()).unwrap();
        assert!(host.execute("leaked + 1", &modules()).is_err());
    }
}
