use std::path::Path;

use crate::model::ArtifactBatch;
use crate::types::{Result, SyncError, normalize_body, sha256_hex};

/// Pluggable language capability.
///
/// Analyzers turn one source file into normalized artifacts. The pipeline
/// never branches on language: the registry asks each analyzer whether it
/// supports a path and uses the first that does.
pub trait LanguageAnalyzer: Send + Sync {
    /// Short identifier used in logs and reports
    fn name(&self) -> &'static str;

    fn supports(&self, path: &Path) -> bool;

    /// Analyze one file. `path` is relative to the source root.
    fn analyze(&self, path: &str, content: &str) -> Result<ArtifactBatch>;
}

/// Extract text content from a tree-sitter node.
/// Returns empty string if extraction fails (with debug logging).
#[inline]
pub fn get_node_text<'a>(node: tree_sitter::Node, content: &'a [u8]) -> &'a str {
    node.utf8_text(content).unwrap_or_else(|e| {
        tracing::debug!(
            "UTF-8 extraction failed at {}:{}-{}:{}: {}",
            node.start_position().row + 1,
            node.start_position().column,
            node.end_position().row + 1,
            node.end_position().column,
            e
        );
        ""
    })
}

/// Create a tree-sitter parser for the given language.
pub fn create_ts_parser<L: Into<tree_sitter::Language>>(
    language: L,
    lang_name: &str,
    path: &str,
) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.into())
        .map_err(|e| SyncError::Parse {
            message: format!("Failed to set {} language: {}", lang_name, e),
            path: path.to_string(),
        })?;
    Ok(parser)
}

/// Parse `content` into a syntax tree.
///
/// Syntax errors are logged and the recovered tree is still returned, so a
/// half-edited file keeps contributing the units that parsed cleanly.
pub fn parse_tree(
    parser: &mut tree_sitter::Parser,
    content: &str,
    lang_name: &str,
    path: &str,
) -> Result<tree_sitter::Tree> {
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| SyncError::Parse {
            message: format!("Failed to parse {} file", lang_name),
            path: path.to_string(),
        })?;
    if tree.root_node().has_error() {
        tracing::warn!(path, language = lang_name, "Syntax errors; using recovered tree");
    }
    Ok(tree)
}

/// Position-independent hash of a unit's source text
pub fn source_hash(text: &str) -> String {
    sha256_hex(&normalize_body(text))
}

/// File extension check shared by the tree-sitter analyzers
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}
