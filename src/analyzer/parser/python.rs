//! Python analyzer over tree-sitter-python
//!
//! Besides classes and functions, framework route decorators
//! (`@app.get("/orders")`, `@bp.route("/x", methods=["POST"])`) are surfaced
//! as API endpoint entities that expose the decorated function.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use tree_sitter::Node;

use super::traits::{
    LanguageAnalyzer, create_ts_parser, get_node_text, has_extension, parse_tree, source_hash,
};
use crate::model::{AnalysisArtifact, ArtifactBatch};
use crate::types::{EntityId, Result};

static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^@[\w.]+\.(get|post|put|patch|delete|head|options|route|api_route)\(\s*[rRbBuU]?["']([^"']*)["']"#,
    )
    .expect("route pattern is valid")
});

static METHODS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"methods\s*=\s*[\[(]\s*["'](\w+)["']"#).expect("methods pattern is valid")
});

pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Result<Self> {
        let _ = create_ts_parser(tree_sitter_python::LANGUAGE, "Python", "")?;
        Ok(Self)
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn name(&self) -> &'static str {
        "python"
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["py"])
    }

    fn analyze(&self, path: &str, content: &str) -> Result<ArtifactBatch> {
        let mut parser = create_ts_parser(tree_sitter_python::LANGUAGE, "Python", path)?;
        let tree = parse_tree(&mut parser, content, "Python", path)?;

        let module = module_path(path);
        let is_package = path.ends_with("__init__.py");
        let mut walker = Walker {
            path,
            source: content.as_bytes(),
            module: &module,
            is_package,
            artifacts: Vec::new(),
        };

        let mut contains = Vec::new();
        let mut imports = BTreeSet::new();
        walker.walk_module(tree.root_node(), &mut contains, &mut imports);

        let mut file_module = AnalysisArtifact::new("module", &module, source_hash(content))
            .with_metadata("module", &module)
            .with_source_path(path);
        for child in contains {
            file_module = file_module.with_relationship("contains", child);
        }
        for target in imports {
            file_module = file_module.with_relationship("imports", id("module", &target));
        }

        let mut artifacts = Vec::with_capacity(walker.artifacts.len() + 1);
        artifacts.push(file_module);
        artifacts.extend(walker.artifacts);

        Ok(ArtifactBatch {
            origin: path.to_string(),
            artifacts,
        })
    }
}

/// Dotted module path of a Python file (`src/shop/api.py` -> `shop.api`)
pub fn module_path(path: &str) -> String {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.first() == Some(&"src") {
        parts.remove(0);
    }
    if let Some(last) = parts.pop() {
        let stem = last.strip_suffix(".py").unwrap_or(last);
        if stem != "__init__" || parts.is_empty() {
            parts.push(stem);
        }
    }
    parts.join(".")
}

/// `(verb, route)` of a framework route decorator
fn route_of(decorator: &str) -> Option<(String, String)> {
    let caps = ROUTE_RE.captures(decorator.trim())?;
    let verb = &caps[1];
    let route = caps[2].to_string();
    let method = if matches!(verb, "route" | "api_route") {
        METHODS_RE
            .captures(decorator)
            .map(|m| m[1].to_uppercase())
            .unwrap_or_else(|| "GET".to_string())
    } else {
        verb.to_uppercase()
    };
    Some((method, route))
}

fn id(kind: &str, qualified_name: &str) -> String {
    EntityId::derive(kind, qualified_name).into_inner()
}

struct Walker<'a> {
    path: &'a str,
    source: &'a [u8],
    module: &'a str,
    is_package: bool,
    artifacts: Vec<AnalysisArtifact>,
}

impl Walker<'_> {
    fn text(&self, node: Node) -> &str {
        get_node_text(node, self.source)
    }

    fn unit(&self, kind: &str, qualified_name: &str, node: Node) -> AnalysisArtifact {
        AnalysisArtifact::new(kind, qualified_name, source_hash(self.text(node)))
            .with_metadata("module", self.module)
            .with_source_path(self.path)
    }

    fn walk_module(
        &mut self,
        root: Node,
        contains: &mut Vec<String>,
        imports: &mut BTreeSet<String>,
    ) {
        let mut cursor = root.walk();
        let children: Vec<Node> = root.named_children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "import_statement" => self.plain_import(child, imports),
                "import_from_statement" => {
                    if let Some(name) = child.child_by_field_name("module_name")
                        && let Some(target) = self.resolve_import(self.text(name))
                    {
                        imports.insert(target);
                    }
                }
                "class_definition" | "function_definition" => {
                    contains.extend(self.definition(child, child, &[], None));
                }
                "decorated_definition" => {
                    let decorators = self.decorators(child);
                    if let Some(def) = child.child_by_field_name("definition") {
                        contains.extend(self.definition(child, def, &decorators, None));
                    }
                }
                _ => {}
            }
        }
    }

    fn plain_import(&self, node: Node, imports: &mut BTreeSet<String>) {
        let mut cursor = node.walk();
        for name in node.named_children(&mut cursor) {
            let dotted = match name.kind() {
                "dotted_name" => Some(name),
                "aliased_import" => name.child_by_field_name("name"),
                _ => None,
            };
            if let Some(dotted) = dotted
                && let Some(target) = self.resolve_import(self.text(dotted))
            {
                imports.insert(target);
            }
        }
    }

    /// Project-local module an import refers to
    fn resolve_import(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if text.starts_with('.') {
            let dots = text.chars().take_while(|c| *c == '.').count();
            let rest = &text[dots..];
            let mut base: Vec<&str> = self.module.split('.').filter(|p| !p.is_empty()).collect();
            if !self.is_package {
                base.pop();
            }
            for _ in 1..dots {
                base.pop();
            }
            if !rest.is_empty() {
                base.push(rest);
            }
            let target = base.join(".");
            return (!target.is_empty() && target != self.module).then_some(target);
        }

        // Absolute imports count only inside the same top-level package
        let top = self.module.split('.').next().unwrap_or_default();
        let same_package = text == top || text.starts_with(&format!("{}.", top));
        (same_package && text != self.module).then(|| text.to_string())
    }

    fn decorators(&self, decorated: Node) -> Vec<String> {
        let mut cursor = decorated.walk();
        decorated
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|c| self.text(c).to_string())
            .collect()
    }

    /// Emit artifacts for a class or function; returns ids for `contains`.
    ///
    /// `outer` spans the decorators, `def` is the definition itself.
    fn definition(
        &mut self,
        outer: Node,
        def: Node,
        decorators: &[String],
        owner: Option<&str>,
    ) -> Vec<String> {
        match def.kind() {
            "class_definition" if owner.is_none() => self.class(outer, def, decorators),
            "function_definition" => self.function(outer, def, decorators, owner),
            _ => Vec::new(),
        }
    }

    fn class(&mut self, outer: Node, def: Node, decorators: &[String]) -> Vec<String> {
        let Some(name) = def.child_by_field_name("name").map(|n| self.text(n).to_string()) else {
            return Vec::new();
        };
        let qn = format!("{}.{}", self.module, name);
        let mut artifact = self.unit("class", &qn, outer);
        if !decorators.is_empty() {
            artifact = artifact.with_metadata("decorators", decorators.join(" "));
        }

        if let Some(bases) = def.child_by_field_name("superclasses") {
            let mut cursor = bases.walk();
            let bases: Vec<Node> = bases.named_children(&mut cursor).collect();
            for base in bases {
                let target = match base.kind() {
                    "identifier" => {
                        let base = self.text(base);
                        (base != "object").then(|| format!("{}.{}", self.module, base))
                    }
                    "attribute" => Some(self.text(base).to_string()),
                    _ => None,
                };
                if let Some(target) = target {
                    artifact = artifact.with_relationship("extends", id("class", &target));
                }
            }
        }

        let index = self.artifacts.len();
        self.artifacts.push(artifact);

        let mut members = Vec::new();
        if let Some(body) = def.child_by_field_name("body") {
            let mut cursor = body.walk();
            let children: Vec<Node> = body.named_children(&mut cursor).collect();
            for child in children {
                match child.kind() {
                    "function_definition" => {
                        members.extend(self.definition(child, child, &[], Some(&qn)));
                    }
                    "decorated_definition" => {
                        let decorators = self.decorators(child);
                        if let Some(inner) = child.child_by_field_name("definition") {
                            members.extend(self.definition(child, inner, &decorators, Some(&qn)));
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut artifact = std::mem::take(&mut self.artifacts[index]);
        for member in members {
            artifact = artifact.with_relationship("contains", member);
        }
        self.artifacts[index] = artifact;

        vec![id("class", &qn)]
    }

    fn function(
        &mut self,
        outer: Node,
        def: Node,
        decorators: &[String],
        owner: Option<&str>,
    ) -> Vec<String> {
        let Some(name) = def.child_by_field_name("name").map(|n| self.text(n).to_string()) else {
            return Vec::new();
        };
        let (kind, qn) = match owner {
            Some(class) => ("method", format!("{}.{}", class, name)),
            None => ("function", format!("{}.{}", self.module, name)),
        };

        let end = def
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| def.end_byte());
        let signature = std::str::from_utf8(&self.source[def.start_byte()..end])
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut artifact = self
            .unit(kind, &qn, outer)
            .with_metadata("signature", signature.trim_end_matches(':'));
        if !decorators.is_empty() {
            artifact = artifact.with_metadata("decorators", decorators.join(" "));
        }
        self.artifacts.push(artifact);

        let function_id = id(kind, &qn);
        let mut ids = vec![function_id.clone()];

        if let Some((method, route)) = decorators.iter().find_map(|d| route_of(d)) {
            let endpoint = self
                .unit("api_endpoint", &qn, outer)
                .with_metadata("route", format!("{} {}", method, route))
                .with_relationship("exposes", function_id);
            ids.push(id("api_endpoint", &qn));
            self.artifacts.push(endpoint);
        }

        ids
    }
}
