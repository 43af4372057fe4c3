//! Publisher: applies a mutation plan to the remote documentation platform.

pub mod directory;
pub mod http;
pub mod platform;
pub mod publisher;

pub use directory::DirectoryPlatform;
pub use http::HttpPlatform;
pub use platform::{PageWrite, RemotePlatform, SharedPlatform, create_platform};
pub use publisher::{OperationResult, OperationStatus, PublishOutcome, Publisher};
