//! Entity graph construction from normalized analysis artifacts
//!
//! Several analysis passes may describe the same entity (an interface seen
//! from its declaration and from an implementation, a module seen from two
//! files). Records are merged by `entity_id`: relationships and source hashes
//! are unioned, metadata keeps the first value per key.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::artifact::{AnalysisArtifact, ArtifactBatch};
use super::entity::{Entity, EntityGraph, EntityKind, RelationType, Relationship};
use crate::types::{EntityId, Fingerprinter, SyncError};

/// A rejected artifact or relationship, kept for the run report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaViolation {
    /// File or tool the artifact came from
    pub origin: String,
    /// Identity, when one could be derived
    pub entity: Option<String>,
    pub reason: String,
    /// Whether the whole entity was excluded (false: only a relationship was dropped)
    pub excluded: bool,
}

impl SchemaViolation {
    pub fn to_error(&self) -> SyncError {
        let artifact = match &self.entity {
            Some(id) => format!("{} ({})", self.origin, id),
            None => self.origin.clone(),
        };
        SyncError::schema(artifact, self.reason.clone())
    }
}

/// Built graph plus everything that was rejected on the way
#[derive(Debug, Clone, Default)]
pub struct GraphBuild {
    pub graph: EntityGraph,
    pub violations: Vec<SchemaViolation>,
}

#[derive(Debug)]
struct PendingEntity {
    kind: EntityKind,
    qualified_name: String,
    source_hashes: BTreeSet<String>,
    relationships: BTreeSet<Relationship>,
    metadata: BTreeMap<String, String>,
    source_path: Option<String>,
}

/// Accumulates artifacts and deduplicates them by identity
#[derive(Debug, Default)]
pub struct EntityGraphBuilder {
    pending: BTreeMap<EntityId, PendingEntity>,
    violations: Vec<SchemaViolation>,
}

impl EntityGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, batch: &ArtifactBatch) {
        for artifact in &batch.artifacts {
            self.add(&batch.origin, artifact);
        }
    }

    pub fn add(&mut self, origin: &str, artifact: &AnalysisArtifact) {
        let derived = artifact.derived_id();

        let Some(kind) = EntityKind::parse(&artifact.kind) else {
            self.reject(origin, derived, format!("unknown kind '{}'", artifact.kind));
            return;
        };

        let Some(id) = derived.map(EntityId::from) else {
            self.reject(
                origin,
                None,
                "no entity_id and no qualified_name to derive a stable identity",
            );
            return;
        };

        let source_hash = match artifact.source_hash.as_deref().map(str::trim) {
            Some(hash) if !hash.is_empty() => hash.to_string(),
            _ => {
                self.reject(origin, Some(id.to_string()), "missing source_hash");
                return;
            }
        };

        let qualified_name = if artifact.qualified_name.trim().is_empty() {
            id.as_str()
                .split_once(':')
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| id.to_string())
        } else {
            artifact.qualified_name.trim().to_string()
        };

        let mut relationships = BTreeSet::new();
        for rel in &artifact.relationships {
            let target = rel.target.trim();
            if target.is_empty() {
                self.report(origin, &id, format!("relationship '{}' has no target", rel.relation));
                continue;
            }
            let Some(relation) = RelationType::parse(&rel.relation) else {
                self.report(
                    origin,
                    &id,
                    format!("unknown relation type '{}' to '{}'", rel.relation, target),
                );
                continue;
            };
            if target == id.as_str() {
                continue;
            }
            relationships.insert(Relationship::new(relation, target));
        }

        match self.pending.get_mut(&id) {
            Some(existing) if existing.kind != kind => {
                let reason = format!(
                    "conflicting kind '{}' for identity already seen as '{}'",
                    kind, existing.kind
                );
                self.reject(origin, Some(id.to_string()), reason);
            }
            Some(existing) => {
                debug!(entity_id = %id, origin, "Merging duplicate entity");
                existing.source_hashes.insert(source_hash);
                existing.relationships.extend(relationships);
                // Greatest value wins so the merge does not depend on pass order
                for (key, value) in &artifact.metadata {
                    match existing.metadata.get_mut(key) {
                        Some(current) if *current >= *value => {}
                        Some(current) => *current = value.clone(),
                        None => {
                            existing.metadata.insert(key.clone(), value.clone());
                        }
                    }
                }
                if let Some(path) = &artifact.source_path
                    && existing.source_path.as_ref().is_none_or(|p| path < p)
                {
                    existing.source_path = Some(path.clone());
                }
            }
            None => {
                self.pending.insert(
                    id,
                    PendingEntity {
                        kind,
                        qualified_name,
                        source_hashes: BTreeSet::from([source_hash]),
                        relationships,
                        metadata: artifact.metadata.clone(),
                        source_path: artifact.source_path.clone(),
                    },
                );
            }
        }
    }

    fn reject(&mut self, origin: &str, entity: Option<String>, reason: impl Into<String>) {
        self.violations.push(SchemaViolation {
            origin: origin.to_string(),
            entity,
            reason: reason.into(),
            excluded: true,
        });
    }

    fn report(&mut self, origin: &str, id: &EntityId, reason: String) {
        self.violations.push(SchemaViolation {
            origin: origin.to_string(),
            entity: Some(id.to_string()),
            reason,
            excluded: false,
        });
    }

    pub fn build(self) -> GraphBuild {
        let entities: BTreeMap<EntityId, Entity> = self
            .pending
            .into_iter()
            .map(|(id, p)| {
                let content_fingerprint = Fingerprinter::domain("entity")
                    .field(p.kind.as_str())
                    .field(&p.qualified_name)
                    .fields(&p.source_hashes)
                    .fields(p.metadata.iter().map(|(k, v)| format!("{}={}", k, v)))
                    .finish();
                let entity = Entity {
                    id: id.clone(),
                    kind: p.kind,
                    qualified_name: p.qualified_name,
                    content_fingerprint,
                    relationships: p.relationships,
                    source_path: p.source_path,
                    metadata: p.metadata,
                };
                (id, entity)
            })
            .collect();

        let mut violations = self.violations;
        violations.sort();

        let excluded = violations.iter().filter(|v| v.excluded).count();
        if excluded > 0 {
            warn!(excluded, "Artifacts excluded for schema violations");
        }
        debug!(
            entities = entities.len(),
            violations = violations.len(),
            "Entity graph built"
        );

        GraphBuild {
            graph: EntityGraph::from_map(entities),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(artifacts: Vec<AnalysisArtifact>) -> GraphBuild {
        let mut builder = EntityGraphBuilder::new();
        builder.add_batch(&ArtifactBatch {
            origin: "test.entities.json".into(),
            artifacts,
        });
        builder.build()
    }

    #[test]
    fn test_missing_identity_is_reported_not_dropped() {
        let result = build(vec![
            AnalysisArtifact::new("class", "", "h1"),
            AnalysisArtifact::new("class", "shop::Order", "h2"),
        ]);

        assert_eq!(result.graph.len(), 1);
        assert_eq!(result.violations.len(), 1);
        assert!(result.violations[0].excluded);
        assert!(result.violations[0].reason.contains("stable identity"));
        assert!(matches!(
            result.violations[0].to_error(),
            SyncError::SchemaViolation { .. }
        ));
    }

    #[test]
    fn test_missing_source_hash_and_unknown_kind_are_rejected() {
        let mut no_hash = AnalysisArtifact::new("function", "billing::charge", "");
        no_hash.source_hash = None;
        let result = build(vec![no_hash, AnalysisArtifact::new("widget", "ui::Button", "h")]);

        assert!(result.graph.is_empty());
        assert_eq!(result.violations.len(), 2);
        assert!(result.violations.iter().all(|v| v.excluded));
    }

    #[test]
    fn test_duplicates_merge_relationships() {
        let declared = AnalysisArtifact::new("interface", "shop::Repo", "decl")
            .with_relationship("contains", "method:shop::Repo::find");
        let implemented = AnalysisArtifact::new("trait", "shop::Repo", "impl")
            .with_relationship("references", "class:shop::Order");

        let result = build(vec![declared, implemented]);

        assert_eq!(result.graph.len(), 1);
        let repo = result
            .graph
            .get(&EntityId::from("interface:shop::Repo"))
            .unwrap();
        assert_eq!(repo.relationships.len(), 2);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_fingerprint_independent_of_pass_order() {
        let a = AnalysisArtifact::new("class", "shop::Order", "h1")
            .with_metadata("visibility", "pub")
            .with_metadata("module", "shop");
        let b = AnalysisArtifact::new("class", "shop::Order", "h2")
            .with_metadata("visibility", "pub(crate)")
            .with_metadata("docs", "An order");

        let first = build(vec![a.clone(), b.clone()]);
        let second = build(vec![b, a]);

        let id = EntityId::from("class:shop::Order");
        let (first, second) = (first.graph.get(&id).unwrap(), second.graph.get(&id).unwrap());
        assert_eq!(first.content_fingerprint, second.content_fingerprint);
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.metadata["visibility"], "pub(crate)");
        assert_eq!(first.metadata.len(), 3);
    }

    #[test]
    fn test_fingerprint_tracks_source_and_metadata() {
        let base = build(vec![AnalysisArtifact::new("function", "f", "h1")]);
        let edited = build(vec![AnalysisArtifact::new("function", "f", "h2")]);
        let annotated = build(vec![
            AnalysisArtifact::new("function", "f", "h1").with_metadata("signature", "fn f()"),
        ]);

        let id = EntityId::from("function:f");
        let fp = |g: &GraphBuild| g.graph.get(&id).unwrap().content_fingerprint.clone();
        assert_ne!(fp(&base), fp(&edited));
        assert_ne!(fp(&base), fp(&annotated));
    }

    #[test]
    fn test_conflicting_kind_for_explicit_id() {
        let mut first = AnalysisArtifact::new("class", "shop::Order", "h1");
        first.entity_id = Some("order".into());
        let mut second = AnalysisArtifact::new("function", "shop::order", "h2");
        second.entity_id = Some("order".into());

        let result = build(vec![first, second]);

        assert_eq!(result.graph.len(), 1);
        assert_eq!(
            result.graph.get(&EntityId::from("order")).unwrap().kind,
            EntityKind::Class
        );
        assert!(result.violations[0].reason.contains("conflicting kind"));
    }

    #[test]
    fn test_unknown_relation_keeps_entity() {
        let artifact = AnalysisArtifact::new("class", "shop::Order", "h1")
            .with_relationship("befriends", "class:shop::Customer")
            .with_relationship("calls", "class:shop::Order");

        let result = build(vec![artifact]);

        let order = result.graph.get(&EntityId::from("class:shop::Order")).unwrap();
        assert!(order.relationships.is_empty());
        assert_eq!(result.violations.len(), 1);
        assert!(!result.violations[0].excluded);
    }
}
