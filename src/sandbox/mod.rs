//! 脚本沙箱
//!
//! - [`composer`]：把多个脚本片段合并成一份源码
//! - [`host`]：隔离执行与基础设施故障重试
//! - [`modules`]：注入脚本的命名空间
//! - [`state`]：一次运行独占的可变状态

pub(crate) mod boundary;
pub mod composer;
pub mod host;
pub mod modules;
pub mod state;

pub use boundary::{MAX_DEPTH, to_dynamic, to_json};
pub use composer::{MODULE_PREFIX, combine};
pub use host::{
    ExecutionHost, HostFactory, MAX_ATTEMPTS, RhaiHost, SandboxConfig, SharedHost,
};
pub use modules::{ModuleSet, Namespace};
pub use state::{ConsoleEntry, ConsoleLevel, RunState, ScriptKind, SharedState};
