pub mod executor;
pub mod reporter;
pub mod types;

pub use executor::ScriptRunner;
pub use reporter::TestReporter;
pub use types::{PreRequestContext, PreRequestResult, RunFailure, TestContext, TestRunResult};
