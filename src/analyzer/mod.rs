//! Code Analyzer Module
//!
//! Turns a source tree into normalized analysis artifacts:
//! - File scanning with gitignore support
//! - Pluggable per-language analyzers chosen by path
//! - Reading artifacts written by external tools

pub mod parser;
pub mod registry;
pub mod scanner;

pub use parser::{ArtifactFileAnalyzer, LanguageAnalyzer, PythonAnalyzer, RustAnalyzer};
pub use registry::{AnalysisFailure, AnalysisOutput, AnalyzerRegistry};
pub use scanner::{FileScanner, ScannedFile};
