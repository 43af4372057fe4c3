//! Synthesized documentation fragments

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::EntityId;

/// Kind of documentation a block carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    ApiReference,
    Architecture,
    UseCase,
    Diagram,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiReference => "api-reference",
            Self::Architecture => "architecture",
            Self::UseCase => "use-case",
            Self::Diagram => "diagram",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "api-reference" | "api" => Ok(Self::ApiReference),
            "architecture" => Ok(Self::Architecture),
            "use-case" => Ok(Self::UseCase),
            "diagram" => Ok(Self::Diagram),
            _ => Err(format!(
                "Unknown doc type: {}. Valid values: api-reference, architecture, use-case, diagram",
                s
            )),
        }
    }
}

/// Documentation fragment for one entity group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBlock {
    pub source_entity_ids: BTreeSet<EntityId>,
    pub doc_type: DocType,
    /// Opaque rendered payload (markdown text or diagram source)
    pub body: String,
    /// Hash of every input that produced the body
    pub generation_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_serde_and_parse() {
        let json = serde_json::to_string(&DocType::ApiReference).unwrap();
        assert_eq!(json, "\"api-reference\"");
        assert_eq!("use_case".parse::<DocType>().unwrap(), DocType::UseCase);
        assert!("poem".parse::<DocType>().is_err());
    }
}
