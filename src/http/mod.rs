pub mod cookie;
pub mod request;
pub mod response;
pub mod types;

// Re-export commonly used types for convenient access
pub use cookie::{Cookie, CookieError, CookieJar, SameSite};
pub use request::RequestSnapshot;
pub use response::ResponseSnapshot;
pub use types::{KeyValue, Status, Url};
