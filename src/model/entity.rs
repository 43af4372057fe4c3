//! Unified code entity graph

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{EntityId, Fingerprinter};

/// Kind of documentable code unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Class,
    Interface,
    Type,
    Function,
    Method,
    ApiEndpoint,
    ConfigFile,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Function => "function",
            Self::Method => "method",
            Self::ApiEndpoint => "api_endpoint",
            Self::ConfigFile => "config_file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "module" | "package" | "namespace" => Some(Self::Module),
            "class" | "struct" => Some(Self::Class),
            "interface" | "trait" | "protocol" => Some(Self::Interface),
            "type" | "enum" | "type_alias" => Some(Self::Type),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "api_endpoint" | "api" | "endpoint" | "route" => Some(Self::ApiEndpoint),
            "config_file" | "config" => Some(Self::ConfigFile),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship type between two entities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Contains,
    Calls,
    Imports,
    Implements,
    Extends,
    Exposes,
    References,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Calls => "calls",
            Self::Imports => "imports",
            Self::Implements => "implements",
            Self::Extends => "extends",
            Self::Exposes => "exposes",
            Self::References => "references",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "contains" | "owns" => Some(Self::Contains),
            "calls" => Some(Self::Calls),
            "imports" | "depends_on" => Some(Self::Imports),
            "implements" => Some(Self::Implements),
            "extends" | "inherits" => Some(Self::Extends),
            "exposes" | "routes_to" => Some(Self::Exposes),
            "references" | "uses" => Some(Self::References),
            _ => None,
        }
    }
}

/// Directed relationship `(relation_type, target_entity_id)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Relationship {
    pub relation: RelationType,
    pub target: EntityId,
}

impl Relationship {
    pub fn new(relation: RelationType, target: impl Into<EntityId>) -> Self {
        Self {
            relation,
            target: target.into(),
        }
    }
}

/// A documentable code unit with a stable identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub qualified_name: String,
    /// Hash of normalized source plus relevant metadata
    pub content_fingerprint: String,
    /// Ordered set of outgoing relationships
    pub relationships: BTreeSet<Relationship>,
    /// First file the entity was observed in
    pub source_path: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Entity {
    /// Fingerprint of the outgoing relationship set
    pub fn relationship_fingerprint(&self) -> String {
        Fingerprinter::domain("relationships")
            .fields(
                self.relationships
                    .iter()
                    .map(|r| format!("{}>{}", r.relation.as_str(), r.target)),
            )
            .finish()
    }

    /// Enclosing namespace of the qualified name (`shop::orders::Order` -> `shop::orders`)
    pub fn namespace(&self) -> &str {
        namespace_of(&self.qualified_name)
    }

    /// Last segment of the qualified name
    pub fn short_name(&self) -> &str {
        let ns = self.namespace();
        if ns.is_empty() {
            &self.qualified_name
        } else {
            self.qualified_name[ns.len()..].trim_start_matches([':', '.'])
        }
    }
}

/// Namespace part of a `::` or `.` separated qualified name
pub fn namespace_of(qualified_name: &str) -> &str {
    if let Some((ns, _)) = qualified_name.rsplit_once("::") {
        ns
    } else if let Some((ns, _)) = qualified_name.rsplit_once('.') {
        ns
    } else {
        ""
    }
}

/// Deduplicated graph of entities keyed by stable identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityGraph {
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(entities: BTreeMap<EntityId, Entity>) -> Self {
        Self { entities }
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entities in identity order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities.keys()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Reverse relationship index: target -> entities pointing at it
    pub fn incoming(&self) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
        let mut index: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
        for entity in self.entities.values() {
            for rel in &entity.relationships {
                index
                    .entry(rel.target.clone())
                    .or_default()
                    .insert(entity.id.clone());
            }
        }
        index
    }
}
