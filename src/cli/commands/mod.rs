pub mod clean;
pub mod config;
pub mod feedback;
pub mod init;
pub mod plan;
pub mod status;
pub mod sync;
