//! Entity model: normalized artifacts, the deduplicated entity graph and
//! synthesized content blocks.

pub mod artifact;
pub mod block;
pub mod builder;
pub mod entity;

pub use artifact::{AnalysisArtifact, ArtifactBatch, ArtifactRelationship};
pub use block::{ContentBlock, DocType};
pub use builder::{EntityGraphBuilder, GraphBuild, SchemaViolation};
pub use entity::{Entity, EntityGraph, EntityKind, RelationType, Relationship, namespace_of};
