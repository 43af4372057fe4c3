//! Pre-computed artifacts written by external analysis tools
//!
//! Any tool can contribute entities by writing `<name>.entities.json` next to
//! the sources, either as a bare array of artifacts or as
//! `{ "artifacts": [...] }`.

use serde::Deserialize;
use std::path::Path;

use super::traits::LanguageAnalyzer;
use crate::constants::analysis::ARTIFACT_SUFFIX;
use crate::model::{AnalysisArtifact, ArtifactBatch};
use crate::types::{Result, SyncError};

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    List(Vec<AnalysisArtifact>),
    Wrapped { artifacts: Vec<AnalysisArtifact> },
}

pub struct ArtifactFileAnalyzer;

impl LanguageAnalyzer for ArtifactFileAnalyzer {
    fn name(&self) -> &'static str {
        "artifact-file"
    }

    fn supports(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(ARTIFACT_SUFFIX))
    }

    fn analyze(&self, path: &str, content: &str) -> Result<ArtifactBatch> {
        let file: ArtifactFile =
            serde_json::from_str(content).map_err(|e| SyncError::SchemaViolation {
                artifact: path.to_string(),
                reason: format!("unreadable artifact file: {}", e),
            })?;

        let mut artifacts = match file {
            ArtifactFile::List(list) => list,
            ArtifactFile::Wrapped { artifacts } => artifacts,
        };
        for artifact in &mut artifacts {
            if artifact.source_path.is_none() {
                artifact.source_path = Some(path.to_string());
            }
        }

        Ok(ArtifactBatch {
            origin: path.to_string(),
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_suffix_only() {
        let analyzer = ArtifactFileAnalyzer;
        assert!(analyzer.supports(Path::new("gen/java.entities.json")));
        assert!(!analyzer.supports(Path::new("package.json")));
    }

    #[test]
    fn test_reads_both_shapes() {
        let analyzer = ArtifactFileAnalyzer;
        let bare = r#"[{"kind": "class", "qualified_name": "com.shop.Order", "source_hash": "h1"}]"#;
        let wrapped = r#"{"artifacts": [{"entity_id": "api:orders", "kind": "api_endpoint",
            "source_hash": "h2", "relationships": [{"type": "exposes", "target": "class:com.shop.Order"}]}]}"#;

        let batch = analyzer.analyze("a.entities.json", bare).unwrap();
        assert_eq!(batch.artifacts[0].derived_id().as_deref(), Some("class:com.shop.Order"));
        assert_eq!(batch.artifacts[0].source_path.as_deref(), Some("a.entities.json"));

        let batch = analyzer.analyze("b.entities.json", wrapped).unwrap();
        assert_eq!(batch.artifacts[0].relationships[0].relation, "exposes");
    }

    #[test]
    fn test_unreadable_file_is_schema_violation() {
        let err = ArtifactFileAnalyzer.analyze("bad.entities.json", "{not json").unwrap_err();
        assert!(matches!(err, SyncError::SchemaViolation { .. }));
    }
}
