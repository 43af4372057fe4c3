//! Content generation capability
//!
//! The generator is an external collaborator: given one entity group and
//! its surrounding context it returns a rendered body. Everything about
//! caching, retries and failure isolation lives in the adapter, so a
//! generator only has to make one attempt.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::{GeneratorConfig, GeneratorKind};
use crate::hierarchy::EntityGroup;
use crate::model::{DocType, EntityGraph, EntityKind, RelationType};
use crate::types::{EntityId, PageKey, Result};

use super::http::HttpGenerator;

/// Produces a body for one entity group
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generator name for logging
    fn name(&self) -> &str;

    /// Model identity; part of every generation fingerprint
    fn model(&self) -> &str;

    /// Render the group. One attempt, no retries.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

pub type SharedGenerator = Arc<dyn ContentGenerator>;

/// Build the generator selected by configuration
pub fn create_generator(config: &GeneratorConfig) -> Result<SharedGenerator> {
    match config.kind {
        GeneratorKind::Outline => Ok(Arc::new(OutlineGenerator::new(&config.model))),
        GeneratorKind::Http => Ok(Arc::new(HttpGenerator::new(config)?)),
    }
}

// =============================================================================
// Request
// =============================================================================

/// Outgoing relationship of a group member
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelationSummary {
    pub relation: RelationType,
    pub target: EntityId,
    /// Qualified name of the target when it exists in the graph
    pub target_name: Option<String>,
}

/// What the generator sees of one entity
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub qualified_name: String,
    pub short_name: String,
    pub source_path: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub relationships: Vec<RelationSummary>,
}

/// Input for one generation call
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationRequest {
    pub page_key: PageKey,
    pub group_key: String,
    pub title: String,
    pub doc_type: DocType,
    /// Members ordered by entity id
    pub entities: Vec<EntitySummary>,
    /// Relationship targets outside the group, by id
    pub context: BTreeSet<EntityId>,
}

impl GenerationRequest {
    pub fn from_group(group: &EntityGroup, graph: &EntityGraph) -> Self {
        let mut context = BTreeSet::new();
        let entities = group
            .entity_ids
            .iter()
            .filter_map(|id| graph.get(id))
            .map(|entity| {
                let relationships = entity
                    .relationships
                    .iter()
                    .map(|rel| {
                        if !group.entity_ids.contains(&rel.target) {
                            context.insert(rel.target.clone());
                        }
                        RelationSummary {
                            relation: rel.relation,
                            target: rel.target.clone(),
                            target_name: graph.get(&rel.target).map(|t| t.qualified_name.clone()),
                        }
                    })
                    .collect();
                EntitySummary {
                    id: entity.id.clone(),
                    kind: entity.kind,
                    qualified_name: entity.qualified_name.clone(),
                    short_name: entity.short_name().to_string(),
                    source_path: entity.source_path.clone(),
                    metadata: entity.metadata.clone(),
                    relationships,
                }
            })
            .collect();

        Self {
            page_key: group.page_key.clone(),
            group_key: group.group_key.clone(),
            title: group.title.clone(),
            doc_type: group.doc_type,
            entities,
            context,
        }
    }

    /// Plain-text rendering of the request for model prompts
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "Write the {} documentation page \"{}\" (group `{}`).\n\n## Entities\n",
            self.doc_type, self.title, self.group_key
        );
        for entity in &self.entities {
            prompt.push_str(&format!("\n### {} `{}`\n", entity.kind, entity.qualified_name));
            if let Some(path) = &entity.source_path {
                prompt.push_str(&format!("- source: {}\n", path));
            }
            for (key, value) in &entity.metadata {
                prompt.push_str(&format!("- {}: {}\n", key, value));
            }
            for rel in &entity.relationships {
                let target = rel.target_name.as_deref().unwrap_or(rel.target.as_str());
                prompt.push_str(&format!("- {} {}\n", rel.relation.as_str(), target));
            }
        }
        prompt
    }
}

// =============================================================================
// Outline generator
// =============================================================================

/// Deterministic generator that renders entity metadata as markdown.
///
/// Needs no network access. Useful as the default and for offline runs.
#[derive(Debug, Clone)]
pub struct OutlineGenerator {
    model: String,
}

impl OutlineGenerator {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
        }
    }

    pub fn render(request: &GenerationRequest) -> String {
        let mut body = format!("# {}\n\n", request.title);
        match request.doc_type {
            DocType::ApiReference => render_api_reference(&mut body, request),
            DocType::Architecture => render_architecture(&mut body, request),
            DocType::UseCase => render_use_case(&mut body, request),
            DocType::Diagram => render_diagram(&mut body, request),
        }
        body
    }
}

impl Default for OutlineGenerator {
    fn default() -> Self {
        Self::new("outline-v1")
    }
}

#[async_trait]
impl ContentGenerator for OutlineGenerator {
    fn name(&self) -> &str {
        "outline"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(Self::render(request))
    }
}

fn relation_lines(body: &mut String, entity: &EntitySummary) {
    for rel in &entity.relationships {
        let target = rel.target_name.as_deref().unwrap_or(rel.target.as_str());
        body.push_str(&format!("- {} `{}`\n", rel.relation.as_str(), target));
    }
}

fn render_api_reference(body: &mut String, request: &GenerationRequest) {
    for entity in &request.entities {
        body.push_str(&format!("## `{}`\n\n", entity.short_name));
        body.push_str(&format!("- kind: {}\n", entity.kind));
        body.push_str(&format!("- path: `{}`\n", entity.qualified_name));
        if let Some(signature) = entity.metadata.get("signature") {
            body.push_str(&format!("- signature: `{}`\n", signature));
        }
        if let Some(route) = entity.metadata.get("route") {
            body.push_str(&format!("- route: `{}`\n", route));
        }
        relation_lines(body, entity);
        body.push('\n');
    }
}

fn render_architecture(body: &mut String, request: &GenerationRequest) {
    body.push_str(&format!(
        "`{}` groups {} entities.\n\n",
        request.group_key,
        request.entities.len()
    ));
    body.push_str("| Entity | Kind | Relationships |\n|---|---|---|\n");
    for entity in &request.entities {
        body.push_str(&format!(
            "| `{}` | {} | {} |\n",
            entity.short_name,
            entity.kind,
            entity.relationships.len()
        ));
    }
    if !request.context.is_empty() {
        body.push_str("\n## Depends on\n\n");
        for target in &request.context {
            body.push_str(&format!("- `{}`\n", target));
        }
    }
}

fn render_use_case(body: &mut String, request: &GenerationRequest) {
    for entity in &request.entities {
        let heading = entity
            .metadata
            .get("route")
            .cloned()
            .unwrap_or_else(|| entity.short_name.clone());
        body.push_str(&format!("## {}\n\n", heading));
        body.push_str(&format!("Handled by `{}`.\n\n", entity.qualified_name));
        relation_lines(body, entity);
        if !entity.relationships.is_empty() {
            body.push('\n');
        }
    }
}

fn render_diagram(body: &mut String, request: &GenerationRequest) {
    let node = |id: &EntityId| -> String {
        id.as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };

    body.push_str("```mermaid\ngraph TD\n");
    for entity in &request.entities {
        body.push_str(&format!(
            "    {}[\"{}\"]\n",
            node(&entity.id),
            entity.short_name
        ));
    }
    for entity in &request.entities {
        for rel in &entity.relationships {
            body.push_str(&format!(
                "    {} -->|{}| {}\n",
                node(&entity.id),
                rel.relation.as_str(),
                node(&rel.target)
            ));
        }
    }
    body.push_str("```\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisArtifact, ArtifactBatch, EntityGraphBuilder};

    fn graph() -> EntityGraph {
        let mut builder = EntityGraphBuilder::new();
        builder.add_batch(&ArtifactBatch {
            origin: "test".into(),
            artifacts: vec![
                AnalysisArtifact::new("class", "shop::Order", "h1")
                    .with_metadata("signature", "pub struct Order")
                    .with_relationship("implements", "interface:shop::Priced"),
                AnalysisArtifact::new("interface", "shop::Priced", "h2"),
            ],
        });
        builder.build().graph
    }

    fn group(doc_type: DocType) -> EntityGroup {
        EntityGroup {
            page_key: PageKey::from("API/shop"),
            title: "shop".into(),
            rule_index: 0,
            group_key: "shop".into(),
            doc_type,
            entity_ids: BTreeSet::from([EntityId::from("class:shop::Order")]),
        }
    }

    #[test]
    fn test_request_collects_outside_context() {
        let request = GenerationRequest::from_group(&group(DocType::ApiReference), &graph());

        assert_eq!(request.entities.len(), 1);
        assert_eq!(request.entities[0].short_name, "Order");
        assert_eq!(
            request.entities[0].relationships[0].target_name.as_deref(),
            Some("shop::Priced")
        );
        assert!(request.context.contains(&EntityId::from("interface:shop::Priced")));
        assert!(request.prompt().contains("implements shop::Priced"));
    }

    #[tokio::test]
    async fn test_outline_is_deterministic() {
        let generator = OutlineGenerator::default();
        let request = GenerationRequest::from_group(&group(DocType::ApiReference), &graph());

        let first = generator.generate(&request).await.unwrap();
        let second = generator.generate(&request).await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("# shop\n"));
        assert!(first.contains("- signature: `pub struct Order`"));
    }

    #[test]
    fn test_diagram_renders_mermaid_edges() {
        let request = GenerationRequest::from_group(&group(DocType::Diagram), &graph());
        let body = OutlineGenerator::render(&request);

        assert!(body.contains("```mermaid"));
        assert!(body.contains("class_shop__Order -->|implements| interface_shop__Priced"));
    }

    #[test]
    fn test_factory_selects_outline_by_default() {
        let generator = create_generator(&GeneratorConfig::default()).unwrap();
        assert_eq!(generator.name(), "outline");
        assert_eq!(generator.model(), "outline-v1");
    }
}
