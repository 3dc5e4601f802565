pub mod assertion;
pub mod crypto;
pub mod error;
pub mod http;
pub mod logger;
pub mod runner;
pub mod sandbox;
pub mod variable;

// Re-export commonly used types
pub use error::{ErrorKind, Result, SandboxError};
pub use runner::{PreRequestContext, RunFailure, ScriptRunner, TestContext};
pub use sandbox::combine;
