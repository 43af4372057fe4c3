//! Rust analyzer over tree-sitter-rust
//!
//! Module paths come from the file location (`src/shop/orders.rs` ->
//! `crate::shop::orders`), so identities survive edits that move code
//! around inside a file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tree_sitter::Node;

use super::traits::{
    LanguageAnalyzer, create_ts_parser, get_node_text, has_extension, parse_tree, source_hash,
};
use crate::model::{AnalysisArtifact, ArtifactBatch, namespace_of};
use crate::types::{EntityId, Result};

pub struct RustAnalyzer;

impl RustAnalyzer {
    pub fn new() -> Result<Self> {
        // Validate parser creation at construction time
        let _ = create_ts_parser(tree_sitter_rust::LANGUAGE, "Rust", "")?;
        Ok(Self)
    }
}

impl LanguageAnalyzer for RustAnalyzer {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["rs"])
    }

    fn analyze(&self, path: &str, content: &str) -> Result<ArtifactBatch> {
        let mut parser = create_ts_parser(tree_sitter_rust::LANGUAGE, "Rust", path)?;
        let tree = parse_tree(&mut parser, content, "Rust", path)?;

        let module = module_path(path);
        let mut walker = Walker {
            path,
            source: content.as_bytes(),
            artifacts: Vec::new(),
        };
        let scope = walker.walk_items(tree.root_node(), &module);

        let file_module = scope.attach(
            AnalysisArtifact::new("module", &module, source_hash(content))
                .with_metadata("module", &module)
                .with_source_path(path),
        );

        let mut artifacts = Vec::with_capacity(walker.artifacts.len() + 1);
        artifacts.push(file_module);
        artifacts.extend(walker.artifacts);

        Ok(ArtifactBatch {
            origin: path.to_string(),
            artifacts,
        })
    }
}

/// Module path of a Rust source file
pub fn module_path(path: &str) -> String {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if let Some(pos) = parts.iter().position(|p| *p == "src") {
        parts.drain(..=pos);
    }
    if let Some(last) = parts.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(last);
        let is_root = parts.is_empty() && matches!(stem, "lib" | "main");
        if !is_root && stem != "mod" {
            parts.push(stem);
        }
    }

    let mut module = String::from("crate");
    for part in parts {
        module.push_str("::");
        module.push_str(part);
    }
    module
}

/// Resolve a path as written in `module` to a crate-absolute path
fn resolve_path(module: &str, path: &str) -> String {
    let path = path.trim();
    if path == "crate" || path.starts_with("crate::") {
        return path.to_string();
    }
    if path.starts_with("super::") || path.starts_with("self::") {
        let mut base = module.to_string();
        let mut rest = path;
        loop {
            if let Some(r) = rest.strip_prefix("super::") {
                base = parent_module(&base);
                rest = r;
            } else if let Some(r) = rest.strip_prefix("self::") {
                rest = r;
            } else {
                break;
            }
        }
        return format!("{}::{}", base, rest);
    }
    if path.contains("::") {
        return path.to_string();
    }
    format!("{}::{}", module, path)
}

fn parent_module(module: &str) -> String {
    match module.rsplit_once("::") {
        Some((parent, _)) => parent.to_string(),
        None => module.to_string(),
    }
}

/// `&mut Vec<T>` -> `Vec`, `shop::Order<'a>` -> `shop::Order`
fn base_type_name(text: &str) -> String {
    let text = text
        .trim()
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim_start_matches("dyn ")
        .trim();
    let end = text.find('<').unwrap_or(text.len());
    text[..end].trim().to_string()
}

/// Module targeted by a crate-local `use`, `None` for external crates
fn import_target(module: &str, text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches(';');
    let text = text.split(" as ").next()?.trim();
    let text = match text.find("::{") {
        Some(i) => &text[..i],
        None => text,
    };
    let text = text.trim_end_matches("::*");
    let local = text == "crate"
        || text.starts_with("crate::")
        || text.starts_with("self::")
        || text.starts_with("super::");
    if !local {
        return None;
    }

    let path = resolve_path(module, text);
    let last = path.rsplit("::").next().unwrap_or(&path);
    let target = if last.chars().next().is_some_and(char::is_uppercase) {
        namespace_of(&path).to_string()
    } else {
        path.clone()
    };
    (!target.is_empty() && target != module).then_some(target)
}

fn id(kind: &str, qualified_name: &str) -> String {
    EntityId::derive(kind, qualified_name).into_inner()
}

/// Relationships collected while walking one module body
#[derive(Default)]
struct Scope {
    contains: Vec<String>,
    imports: BTreeSet<String>,
}

impl Scope {
    fn attach(self, mut artifact: AnalysisArtifact) -> AnalysisArtifact {
        for child in self.contains {
            artifact = artifact.with_relationship("contains", child);
        }
        for module in self.imports {
            artifact = artifact.with_relationship("imports", id("module", &module));
        }
        artifact
    }
}

struct Walker<'a> {
    path: &'a str,
    source: &'a [u8],
    artifacts: Vec<AnalysisArtifact>,
}

impl Walker<'_> {
    fn text(&self, node: Node) -> &str {
        get_node_text(node, self.source)
    }

    fn field_text(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
            .filter(|s| !s.is_empty())
    }

    fn unit(&self, kind: &str, qualified_name: &str, node: Node, module: &str) -> AnalysisArtifact {
        let mut artifact = AnalysisArtifact::new(kind, qualified_name, source_hash(self.text(node)))
            .with_metadata("module", module)
            .with_source_path(self.path);
        let mut cursor = node.walk();
        let visibility = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "visibility_modifier")
            .map(|c| self.text(c).to_string());
        if let Some(vis) = visibility {
            artifact = artifact.with_metadata("visibility", vis);
        }
        artifact
    }

    /// Declaration text up to the body, whitespace collapsed
    fn signature(&self, node: Node) -> String {
        let end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        let text = std::str::from_utf8(&self.source[node.start_byte()..end]).unwrap_or_default();
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn walk_items(&mut self, body: Node, module: &str) -> Scope {
        let mut scope = Scope::default();
        // Declared type name -> artifact index, for attaching impl blocks
        let mut declared: BTreeMap<String, usize> = BTreeMap::new();
        let mut impls = Vec::new();

        let mut cursor = body.walk();
        let items: Vec<Node> = body.named_children(&mut cursor).collect();

        for item in items {
            let kind = match item.kind() {
                "struct_item" | "union_item" => "class",
                "enum_item" | "type_item" => "type",
                "trait_item" => "interface",
                "function_item" => "function",
                "mod_item" => {
                    self.module_item(item, module, &mut scope);
                    continue;
                }
                "impl_item" => {
                    impls.push(item);
                    continue;
                }
                "use_declaration" => {
                    if let Some(arg) = item.child_by_field_name("argument")
                        && let Some(target) = import_target(module, self.text(arg))
                    {
                        scope.imports.insert(target);
                    }
                    continue;
                }
                _ => continue,
            };

            let Some(name) = self.field_text(item, "name") else {
                continue;
            };
            let qn = format!("{}::{}", module, name);
            let mut artifact = self.unit(kind, &qn, item, module);

            if kind == "function" {
                artifact = artifact.with_metadata("signature", self.signature(item));
            }
            if kind == "interface"
                && let Some(trait_body) = item.child_by_field_name("body")
            {
                for method in self.methods(trait_body, &qn, module, None) {
                    artifact = artifact.with_relationship("contains", method);
                }
            }

            scope.contains.push(id(kind, &qn));
            declared.insert(name, self.artifacts.len());
            self.artifacts.push(artifact);
        }

        for item in impls {
            self.impl_block(item, module, &declared);
        }

        scope
    }

    fn module_item(&mut self, item: Node, module: &str, scope: &mut Scope) {
        let Some(name) = self.field_text(item, "name") else {
            return;
        };
        let qn = format!("{}::{}", module, name);
        scope.contains.push(id("module", &qn));

        // `mod foo;` is analyzed from its own file
        let Some(inner) = item.child_by_field_name("body") else {
            return;
        };
        let index = self.artifacts.len();
        let placeholder = self.unit("module", &qn, item, &qn);
        self.artifacts.push(placeholder);
        let inner_scope = self.walk_items(inner, &qn);
        let artifact = std::mem::take(&mut self.artifacts[index]);
        self.artifacts[index] = inner_scope.attach(artifact);
    }

    fn impl_block(&mut self, item: Node, module: &str, declared: &BTreeMap<String, usize>) {
        let Some(type_node) = item.child_by_field_name("type") else {
            return;
        };
        let type_name = base_type_name(self.text(type_node));
        if type_name.is_empty() {
            return;
        }
        let type_qn = resolve_path(module, &type_name);
        let trait_qn = item
            .child_by_field_name("trait")
            .map(|t| resolve_path(module, &base_type_name(self.text(t))));

        let owner = declared.get(&type_name).copied();
        let owner_id = match owner {
            Some(i) => id(&self.artifacts[i].kind, &type_qn),
            None => id("class", &type_qn),
        };

        let Some(body) = item.child_by_field_name("body") else {
            return;
        };
        let reference = owner.is_none().then_some(owner_id.as_str());
        let methods = self.methods(body, &type_qn, module, reference);

        if let Some(trait_qn) = &trait_qn {
            for method in &methods {
                if let Some(artifact) = self
                    .artifacts
                    .iter_mut()
                    .rev()
                    .find(|a| id("method", &a.qualified_name) == *method)
                {
                    artifact.metadata.insert("trait".to_string(), trait_qn.clone());
                }
            }
        }

        if let Some(index) = owner {
            let mut artifact = std::mem::take(&mut self.artifacts[index]);
            for method in methods {
                artifact = artifact.with_relationship("contains", method);
            }
            if let Some(trait_qn) = trait_qn {
                artifact = artifact.with_relationship("implements", id("interface", &trait_qn));
            }
            self.artifacts[index] = artifact;
        }
    }

    /// Emit method artifacts for a trait or impl body; returns their ids
    fn methods(
        &mut self,
        body: Node,
        owner_qn: &str,
        module: &str,
        reference: Option<&str>,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        let mut cursor = body.walk();
        let items: Vec<Node> = body.named_children(&mut cursor).collect();

        for item in items {
            if !matches!(item.kind(), "function_item" | "function_signature_item") {
                continue;
            }
            let Some(name) = self.field_text(item, "name") else {
                continue;
            };
            let qn = format!("{}::{}", owner_qn, name);
            let mut artifact = self
                .unit("method", &qn, item, module)
                .with_metadata("signature", self.signature(item));
            if let Some(target) = reference {
                artifact = artifact.with_relationship("references", target);
            }
            ids.push(id("method", &qn));
            self.artifacts.push(artifact);
        }
        ids
    }
}
