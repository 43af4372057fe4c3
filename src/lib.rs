//! wikisync - Keeps a wiki in sync with the code it documents
//!
//! Turns a source tree into an entity graph, detects what changed since the
//! last committed run, synthesizes content only for affected pages, arranges
//! pages into a hierarchy, reconciles that against what the remote platform
//! holds, and publishes the difference.
//!
//! ## Core Features
//!
//! - **Incremental**: entity fingerprints and a content block cache keep
//!   unchanged pages from being regenerated or republished
//! - **Safe publishing**: manual remote edits become conflicts, never
//!   silent overwrites
//! - **Resumable**: every applied operation is journaled, so an interrupted
//!   sync picks up where it stopped
//!
//! ## Quick Start
//!
//! ```ignore
//! use wikisync::{ConfigLoader, SyncPipeline};
//!
//! let config = ConfigLoader::load_for(&project_root)?;
//! let pipeline = SyncPipeline::open(&project_root, config)?;
//! let report = pipeline.sync().await?;
//! std::process::exit(report.exit_code());
//! ```
//!
//! ## Modules
//!
//! - [`analyzer`]: source scanning and per-language artifact extraction
//! - [`model`]: entity graph and content blocks
//! - [`detect`]: change detection against committed fingerprints
//! - [`synth`]: content generation behind a cached, retried adapter
//! - [`hierarchy`]: organizational template and page tree
//! - [`reconcile`]: mutation planning against published records
//! - [`publish`]: remote platforms and plan application
//! - [`storage`]: SQLite state, journal, lock and run history
//! - [`pipeline`]: the end-to-end run

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod detect;
pub mod feedback;
pub mod hierarchy;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod reconcile;
pub mod storage;
pub mod synth;
pub mod types;
pub mod util;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, Result, SyncError};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{Database, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{CancelFlag, PlanPreview, RunReport, RunStage, SyncPipeline};

pub use model::{ContentBlock, DocType, Entity, EntityGraph, EntityKind};
pub use reconcile::{MutationPlan, OperationKind, PlannedOperation};

// =============================================================================
// Collaborator Re-exports
// =============================================================================

pub use publish::{DirectoryPlatform, HttpPlatform, RemotePlatform};
pub use synth::{ContentGenerator, HttpGenerator, OutlineGenerator};
