pub mod config;
pub mod resolver;
pub mod types;

pub use config::ConfigLoader;
pub use resolver::{MAX_EXPAND_PASSES, ResolveError, ResolveOptions, VariableResolver};
pub use types::{EnvScope, EnvVar, Environment, Environments, VariableConfig, VariableEntry};
