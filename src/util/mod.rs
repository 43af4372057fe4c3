//! Shared async helpers for external calls

pub mod cancel;
pub mod retry;
pub mod timeout;

pub use cancel::CancelFlag;
pub use retry::{Attempted, RetryPolicy, retry_call};
pub use timeout::{TimeoutConfig, with_timeout};
