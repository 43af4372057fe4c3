//! Organizational template: which entities become which pages
//!
//! A template is an ordered list of section rules. Each rule selects
//! entities by kind, assigns them a doc type, and places them under a fixed
//! page path, optionally split into one page per module or per entity.
//! Page keys depend only on the rule path and the grouping key, never on
//! generated content.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::model::{DocType, Entity, EntityGraph, EntityKind};
use crate::types::{EntityId, PageKey, Result, SyncError, humanize, key_segment};

/// How a section splits its entities into pages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GroupBy {
    /// One page at the rule path
    #[default]
    None,
    /// One child page per module
    Module,
    /// One child page per entity
    Entity,
}

/// Sibling ordering for grouped pages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PageOrder {
    #[default]
    Alphabetical,
    LargestFirst,
}

/// One section of the documentation tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionRule {
    /// Page path of the section (`Architecture`, `API/Reference`)
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub doc_type: DocType,
    /// Entity kinds routed to this section; empty selects every kind
    #[serde(default)]
    pub kinds: Vec<EntityKind>,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub order: PageOrder,
}

impl SectionRule {
    pub fn new(path: &str, doc_type: DocType, kinds: &[EntityKind], group_by: GroupBy) -> Self {
        Self {
            path: path.to_string(),
            title: None,
            doc_type,
            kinds: kinds.to_vec(),
            group_by,
            order: PageOrder::Alphabetical,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_order(mut self, order: PageOrder) -> Self {
        self.order = order;
        self
    }

    pub fn page_key(&self) -> PageKey {
        PageKey::new(self.path.trim())
    }

    /// Title of the section page
    pub fn section_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            let last = self.path.rsplit(PageKey::SEPARATOR).next().unwrap_or(&self.path);
            last.replace(['-', '_'], " ")
        })
    }

    fn selects(&self, entity: &Entity) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&entity.kind)
    }
}

/// Entities that share one page and one content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGroup {
    pub page_key: PageKey,
    pub title: String,
    /// Index of the producing rule in the template
    pub rule_index: usize,
    /// Logical grouping name (module path, entity name, or section path)
    pub group_key: String,
    pub doc_type: DocType,
    pub entity_ids: BTreeSet<EntityId>,
}

/// Ordered list of section rules
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct OrganizationTemplate {
    pub sections: Vec<SectionRule>,
}

impl Default for OrganizationTemplate {
    fn default() -> Self {
        use EntityKind::*;
        Self {
            sections: vec![
                SectionRule::new("Overview", DocType::Architecture, &[Module], GroupBy::None),
                SectionRule::new(
                    "Architecture",
                    DocType::Architecture,
                    &[Module, Class, Interface],
                    GroupBy::Module,
                ),
                SectionRule::new(
                    "API",
                    DocType::ApiReference,
                    &[Class, Interface, Type, Function, Method, ApiEndpoint],
                    GroupBy::Module,
                ),
                SectionRule::new("Use-Cases", DocType::UseCase, &[ApiEndpoint], GroupBy::Entity)
                    .with_title("Use Cases"),
                SectionRule::new(
                    "Diagrams",
                    DocType::Diagram,
                    &[Module, Interface, Class],
                    GroupBy::None,
                ),
            ],
        }
    }
}

impl OrganizationTemplate {
    pub fn new(sections: Vec<SectionRule>) -> Self {
        Self { sections }
    }

    /// Load a template from a YAML list of section rules
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let template: Self = serde_yaml::from_str(&content)?;
        template.validate()?;
        Ok(template)
    }

    /// Reject templates that cannot produce a well-formed tree
    pub fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(SyncError::Config(
                "Template must define at least one section".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.sections {
            let path = rule.path.trim();
            if path.is_empty() {
                return Err(SyncError::Config("Template section with empty path".to_string()));
            }
            if path
                .split(PageKey::SEPARATOR)
                .any(|segment| segment.trim().is_empty() || segment != segment.trim())
            {
                return Err(SyncError::Config(format!(
                    "Template section path '{}' has an empty or padded segment",
                    rule.path
                )));
            }
            if !seen.insert(path.to_string()) {
                return Err(SyncError::Config(format!(
                    "Duplicate template section path '{}'",
                    rule.path
                )));
            }
        }
        Ok(())
    }

    /// Split the graph into page groups.
    ///
    /// Two groups landing on the same page key is a template error, raised
    /// here rather than surfacing later as a runtime conflict.
    pub fn group(&self, graph: &EntityGraph) -> Result<Vec<EntityGroup>> {
        self.validate()?;

        let mut groups = Vec::new();
        let mut claimed: BTreeMap<PageKey, String> = BTreeMap::new();

        for (rule_index, rule) in self.sections.iter().enumerate() {
            let mut buckets: BTreeMap<String, BTreeSet<EntityId>> = BTreeMap::new();
            for entity in graph.iter().filter(|e| rule.selects(e)) {
                let key = match rule.group_by {
                    GroupBy::None => rule.path.trim().to_string(),
                    GroupBy::Module => module_of(entity),
                    GroupBy::Entity => entity.qualified_name.clone(),
                };
                buckets.entry(key).or_default().insert(entity.id.clone());
            }

            let mut rule_groups: Vec<EntityGroup> = buckets
                .into_iter()
                .map(|(group_key, entity_ids)| {
                    let (page_key, title) = match rule.group_by {
                        GroupBy::None => (rule.page_key(), rule.section_title()),
                        GroupBy::Module | GroupBy::Entity => (
                            rule.page_key().child(&segment_for(&group_key)),
                            humanize(&group_key),
                        ),
                    };
                    EntityGroup {
                        page_key,
                        title,
                        rule_index,
                        group_key,
                        doc_type: rule.doc_type,
                        entity_ids,
                    }
                })
                .collect();

            match rule.order {
                PageOrder::Alphabetical => rule_groups
                    .sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.page_key.cmp(&b.page_key))),
                PageOrder::LargestFirst => rule_groups.sort_by(|a, b| {
                    b.entity_ids
                        .len()
                        .cmp(&a.entity_ids.len())
                        .then_with(|| a.page_key.cmp(&b.page_key))
                }),
            }

            for group in rule_groups {
                if let Some(previous) = claimed.insert(group.page_key.clone(), group.group_key.clone()) {
                    return Err(SyncError::Config(format!(
                        "Page key collision at '{}': groups '{}' and '{}' map to the same page",
                        group.page_key, previous, group.group_key
                    )));
                }
                groups.push(group);
            }
        }

        Ok(groups)
    }
}

/// Module an entity is documented under
pub fn module_of(entity: &Entity) -> String {
    if let Some(module) = entity.metadata.get("module").filter(|m| !m.is_empty()) {
        return module.clone();
    }
    let module = match entity.kind {
        EntityKind::Module => entity.qualified_name.as_str(),
        _ => entity.namespace(),
    };
    if module.is_empty() {
        "root".to_string()
    } else {
        module.to_string()
    }
}

fn segment_for(group_key: &str) -> String {
    let segment = key_segment(group_key);
    if segment.is_empty() {
        "root".to_string()
    } else {
        segment
    }
}
