//! Analyzer selection and whole-tree analysis

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::parser::{ArtifactFileAnalyzer, LanguageAnalyzer, PythonAnalyzer, RustAnalyzer};
use super::scanner::FileScanner;
use crate::config::AnalysisConfig;
use crate::model::ArtifactBatch;
use crate::types::Result;

/// A file no analyzer could process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct AnalysisOutput {
    pub batches: Vec<ArtifactBatch>,
    pub failures: Vec<AnalysisFailure>,
    pub files_scanned: usize,
}

/// Ordered set of language analyzers; the first that supports a path wins
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// External artifact files, Rust and Python
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(ArtifactFileAnalyzer));
        registry.register(Box::new(RustAnalyzer::new()?));
        registry.register(Box::new(PythonAnalyzer::new()?));
        Ok(registry)
    }

    pub fn register(&mut self, analyzer: Box<dyn LanguageAnalyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn analyzer_for(&self, path: &Path) -> Option<&dyn LanguageAnalyzer> {
        self.analyzers
            .iter()
            .find(|a| a.supports(path))
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Scan `root` and analyze every supported file.
    ///
    /// Unreadable or unparsable files are recorded and skipped; they never
    /// abort the scan.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn analyze_tree(&self, root: &Path, config: &AnalysisConfig) -> Result<AnalysisOutput> {
        let files = FileScanner::from_config(root, config)?.scan()?;
        let mut output = AnalysisOutput {
            files_scanned: files.len(),
            ..AnalysisOutput::default()
        };

        for file in files {
            let Some(analyzer) = self.analyzer_for(&file.path) else {
                continue;
            };

            let content = match std::fs::read_to_string(&file.path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %file.relative, error = %e, "Failed to read source file");
                    output.failures.push(AnalysisFailure {
                        path: file.relative,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match analyzer.analyze(&file.relative, &content) {
                Ok(batch) => {
                    debug!(
                        path = %file.relative,
                        analyzer = analyzer.name(),
                        artifacts = batch.artifacts.len(),
                        "Analyzed"
                    );
                    output.batches.push(batch);
                }
                Err(e) => {
                    warn!(path = %file.relative, error = %e, "Analysis failed");
                    output.failures.push(AnalysisFailure {
                        path: file.relative,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            files = output.files_scanned,
            batches = output.batches.len(),
            failures = output.failures.len(),
            "Analysis complete"
        );
        Ok(output)
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
