/// 断言模块 - 测试结果树与两套断言词汇
mod chai;
mod expectation;
mod response;
mod stack;
mod types;
mod value;

pub use chai::{ChaiAssertion, ChaiFlags};
pub use expectation::Expectation;
pub use response::ResponseAssertion;
pub use stack::TestRunStack;
pub use types::{ExpectResult, ExpectStatus, ROOT_DESCRIPTOR, TestDescriptor, TestSummary};
pub use value::{Subject, ValueKind, deep_equal, format_value, js_string};
