//! Change detection against the previous run's fingerprint store
//!
//! Pure functions over two inputs: the current entity graph and the
//! fingerprints committed by the last successful run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::model::{EntityGraph, EntityKind};
use crate::types::EntityId;

/// Persisted per-entity fingerprint from a previous run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintEntry {
    pub kind: EntityKind,
    pub qualified_name: String,
    pub content_fingerprint: String,
    pub relationship_fingerprint: String,
}

/// Fingerprint store contents keyed by entity identity
pub type FingerprintMap = BTreeMap<EntityId, FingerprintEntry>;

/// Disjoint classification of entity identities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// New entities and entities whose content fingerprint differs
    pub changed: BTreeSet<EntityId>,
    pub unchanged: BTreeSet<EntityId>,
    /// Present in the previous run, absent now
    pub removed: BTreeSet<EntityId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

pub struct ChangeDetector;

impl ChangeDetector {
    /// Classify every current and previous identity into exactly one set
    pub fn detect(graph: &EntityGraph, previous: &FingerprintMap) -> ChangeSet {
        let mut changes = ChangeSet::default();

        for entity in graph.iter() {
            match previous.get(&entity.id) {
                Some(prev) if prev.content_fingerprint == entity.content_fingerprint => {
                    changes.unchanged.insert(entity.id.clone());
                }
                _ => {
                    changes.changed.insert(entity.id.clone());
                }
            }
        }

        changes.removed = previous
            .keys()
            .filter(|id| !graph.contains(id))
            .cloned()
            .collect();

        debug!(
            changed = changes.changed.len(),
            unchanged = changes.unchanged.len(),
            removed = changes.removed.len(),
            "Change detection complete"
        );
        changes
    }

    /// Entities whose documentation must be regenerated.
    ///
    /// `changed` plus entities whose own relationship set changed plus entities
    /// holding a relationship to a changed or removed entity. Exactly one hop:
    /// dependents of dependents are not pulled in.
    pub fn regeneration_set(
        graph: &EntityGraph,
        previous: &FingerprintMap,
        changes: &ChangeSet,
    ) -> BTreeSet<EntityId> {
        let mut set = changes.changed.clone();

        for entity in graph.iter() {
            if let Some(prev) = previous.get(&entity.id)
                && prev.relationship_fingerprint != entity.relationship_fingerprint()
            {
                set.insert(entity.id.clone());
            }
        }

        let incoming = graph.incoming();
        for target in changes.changed.iter().chain(changes.removed.iter()) {
            if let Some(sources) = incoming.get(target) {
                set.extend(sources.iter().cloned());
            }
        }

        set
    }

    /// Fingerprint store contents to commit for the current graph
    pub fn snapshot(graph: &EntityGraph) -> FingerprintMap {
        graph
            .iter()
            .map(|e| {
                (
                    e.id.clone(),
                    FingerprintEntry {
                        kind: e.kind,
                        qualified_name: e.qualified_name.clone(),
                        content_fingerprint: e.content_fingerprint.clone(),
                        relationship_fingerprint: e.relationship_fingerprint(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisArtifact, ArtifactBatch, EntityGraphBuilder};

    fn graph(artifacts: Vec<AnalysisArtifact>) -> EntityGraph {
        let mut builder = EntityGraphBuilder::new();
        builder.add_batch(&ArtifactBatch {
            origin: "test".into(),
            artifacts,
        });
        builder.build().graph
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn test_first_run_everything_changed() {
        let g = graph(vec![
            AnalysisArtifact::new("class", "A", "h1"),
            AnalysisArtifact::new("class", "B", "h1"),
        ]);
        let changes = ChangeDetector::detect(&g, &FingerprintMap::new());
        assert_eq!(changes.changed.len(), 2);
        assert!(changes.unchanged.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_sets_are_disjoint() {
        let before = graph(vec![
            AnalysisArtifact::new("class", "A", "h1"),
            AnalysisArtifact::new("class", "B", "h1"),
            AnalysisArtifact::new("class", "C", "h1"),
        ]);
        let previous = ChangeDetector::snapshot(&before);

        let after = graph(vec![
            AnalysisArtifact::new("class", "A", "h1"),
            AnalysisArtifact::new("class", "B", "h2"),
            AnalysisArtifact::new("class", "D", "h1"),
        ]);
        let changes = ChangeDetector::detect(&after, &previous);

        assert_eq!(changes.unchanged, BTreeSet::from([id("class:A")]));
        assert_eq!(changes.changed, BTreeSet::from([id("class:B"), id("class:D")]));
        assert_eq!(changes.removed, BTreeSet::from([id("class:C")]));
        assert!(changes.changed.is_disjoint(&changes.unchanged));
        assert!(changes.changed.is_disjoint(&changes.removed));
    }

    #[test]
    fn test_regeneration_is_one_hop() {
        // C -> B -> A ; A changes
        let before = graph(vec![
            AnalysisArtifact::new("class", "A", "h1"),
            AnalysisArtifact::new("class", "B", "h1").with_relationship("calls", "class:A"),
            AnalysisArtifact::new("class", "C", "h1").with_relationship("calls", "class:B"),
        ]);
        let previous = ChangeDetector::snapshot(&before);

        let after = graph(vec![
            AnalysisArtifact::new("class", "A", "h2"),
            AnalysisArtifact::new("class", "B", "h1").with_relationship("calls", "class:A"),
            AnalysisArtifact::new("class", "C", "h1").with_relationship("calls", "class:B"),
        ]);
        let changes = ChangeDetector::detect(&after, &previous);
        let regen = ChangeDetector::regeneration_set(&after, &previous, &changes);

        assert!(regen.contains(&id("class:A")));
        assert!(regen.contains(&id("class:B")));
        assert!(!regen.contains(&id("class:C")));
    }

    #[test]
    fn test_relationship_change_and_removed_target_trigger_regeneration() {
        let before = graph(vec![
            AnalysisArtifact::new("class", "A", "h1"),
            AnalysisArtifact::new("class", "B", "h1"),
            AnalysisArtifact::new("class", "Gone", "h1"),
            AnalysisArtifact::new("class", "User", "h1").with_relationship("calls", "class:Gone"),
        ]);
        let previous = ChangeDetector::snapshot(&before);

        let after = graph(vec![
            AnalysisArtifact::new("class", "A", "h1").with_relationship("imports", "class:B"),
            AnalysisArtifact::new("class", "B", "h1"),
            AnalysisArtifact::new("class", "User", "h1").with_relationship("calls", "class:Gone"),
        ]);
        let changes = ChangeDetector::detect(&after, &previous);
        let regen = ChangeDetector::regeneration_set(&after, &previous, &changes);

        assert!(changes.changed.is_empty());
        assert_eq!(regen, BTreeSet::from([id("class:A"), id("class:User")]));
    }
}
