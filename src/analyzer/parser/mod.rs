//! Language analyzers
//!
//! Tree-sitter analyzers for Rust and Python plus a reader for artifacts
//! produced by external tools. All emit the normalized artifact schema.

pub mod artifact_file;
pub mod python;
pub mod rust_lang;
pub mod traits;

pub use artifact_file::ArtifactFileAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use traits::{
    LanguageAnalyzer, create_ts_parser, get_node_text, has_extension, parse_tree, source_hash,
};
