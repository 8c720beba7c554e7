//! HTTP client layer: session transport, authentication strategies,
//! CSRF token discovery, the retrying executor, and pagination.

pub mod auth;
pub mod error;
pub mod pages;
pub mod request;
pub mod session;
pub mod tokens;

pub use auth::Credentials;
pub use error::{ClientError, TransportError};
pub use pages::Paginator;
pub use request::{RequestExecutor, Sleeper, ThreadSleeper, DEFAULT_MAX_ATTEMPTS};
pub use session::{HttpSession, RawResponse, SessionBuilder, Transport};
