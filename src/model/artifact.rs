//! Normalized analysis artifact schema
//!
//! Language analyzers (built-in or external tools writing `*.entities.json`)
//! all emit this shape. Fields are kept loose (`kind` and relation types are
//! strings) so a malformed record can be reported instead of failing the
//! whole file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::EntityKind;
use crate::types::EntityId;

/// One analyzed code unit as reported by a language capability
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisArtifact {
    /// Explicit stable identity; derived from kind + qualified name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    pub kind: String,

    #[serde(default)]
    pub qualified_name: String,

    /// Hash of the normalized source text of this unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,

    #[serde(default)]
    pub relationships: Vec<ArtifactRelationship>,

    /// Documentation-relevant metadata (signature, visibility, module, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// File the unit was found in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRelationship {
    #[serde(alias = "type")]
    pub relation: String,
    /// Target entity id
    pub target: String,
}

impl AnalysisArtifact {
    pub fn new(kind: &str, qualified_name: impl Into<String>, source_hash: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            qualified_name: qualified_name.into(),
            source_hash: Some(source_hash.into()),
            ..Self::default()
        }
    }

    pub fn with_relationship(mut self, relation: &str, target: impl Into<String>) -> Self {
        self.relationships.push(ArtifactRelationship {
            relation: relation.to_string(),
            target: target.into(),
        });
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Identity this artifact resolves to, if one can be derived
    pub fn derived_id(&self) -> Option<String> {
        match self.entity_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id.to_string()),
            _ => {
                let name = self.qualified_name.trim();
                let kind = self.kind.trim();
                if name.is_empty() || kind.is_empty() {
                    None
                } else {
                    let kind = EntityKind::parse(kind)
                        .map(|k| k.as_str().to_string())
                        .unwrap_or_else(|| kind.to_lowercase());
                    Some(EntityId::derive(&kind, name).into_inner())
                }
            }
        }
    }
}

/// Artifacts read from one source, labelled with where they came from
#[derive(Debug, Clone, Default)]
pub struct ArtifactBatch {
    pub origin: String,
    pub artifacts: Vec<AnalysisArtifact>,
}
