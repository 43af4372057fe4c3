//! Deterministic assembly of the candidate page tree
//!
//! Input is the grouped entities plus whatever blocks synthesis produced.
//! Groups without a block become deferred pages. Intermediate path segments
//! become section pages that index their children.

use std::collections::BTreeMap;
use tracing::debug;

use super::template::{EntityGroup, GroupBy, OrganizationTemplate};
use super::tree::{PageNode, PageTree};
use crate::model::ContentBlock;
use crate::types::{PageKey, Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftKind {
    /// Implicit parent created for a path segment
    Section,
    /// Page carrying a content block (or deferred)
    Group,
}

#[derive(Debug)]
struct Draft {
    key: PageKey,
    title: String,
    kind: DraftKind,
    block: Option<ContentBlock>,
    deferred: bool,
    children: Vec<usize>,
}

/// Builds the page tree from groups and blocks
pub struct HierarchyBuilder<'a> {
    template: &'a OrganizationTemplate,
    drafts: Vec<Draft>,
    by_key: BTreeMap<PageKey, usize>,
    roots: Vec<usize>,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(template: &'a OrganizationTemplate) -> Self {
        Self {
            template,
            drafts: Vec::new(),
            by_key: BTreeMap::new(),
            roots: Vec::new(),
        }
    }

    /// Assemble the tree. `groups` must come from `template.group()`, which
    /// already fixes their order; `blocks` is keyed by group page key.
    pub fn build(
        mut self,
        groups: &[EntityGroup],
        blocks: &BTreeMap<PageKey, ContentBlock>,
    ) -> Result<PageTree> {
        let mut by_rule: BTreeMap<usize, Vec<&EntityGroup>> = BTreeMap::new();
        for group in groups {
            by_rule.entry(group.rule_index).or_default().push(group);
        }

        let template = self.template;
        for (rule_index, rule) in template.sections.iter().enumerate() {
            let Some(rule_groups) = by_rule.get(&rule_index) else {
                continue;
            };

            if rule.group_by != GroupBy::None {
                let section = rule.page_key();
                self.ensure_section(&section, Some(rule.section_title()))?;
            }

            for group in rule_groups {
                self.insert_group(group, blocks.get(&group.page_key).cloned())?;
            }
        }

        let roots = self.roots.clone();
        let tree = PageTree::new(roots.into_iter().map(|i| self.materialize(i)).collect());
        debug!(
            pages = tree.len(),
            deferred = tree.deferred_count(),
            "Page tree assembled"
        );
        Ok(tree)
    }

    fn insert_group(&mut self, group: &EntityGroup, block: Option<ContentBlock>) -> Result<()> {
        if let Some(&existing) = self.by_key.get(&group.page_key) {
            let draft = &mut self.drafts[existing];
            if draft.kind == DraftKind::Group {
                return Err(SyncError::Config(format!(
                    "Page key collision at '{}': two sections produce the same page",
                    group.page_key
                )));
            }
            // A section page created for a deeper rule now gets its own content
            draft.kind = DraftKind::Group;
            draft.title = group.title.clone();
            draft.deferred = block.is_none();
            draft.block = block;
            return Ok(());
        }

        let deferred = block.is_none();
        let index = self.push(Draft {
            key: group.page_key.clone(),
            title: group.title.clone(),
            kind: DraftKind::Group,
            block,
            deferred,
            children: Vec::new(),
        });
        self.attach(index, &group.page_key)
    }

    /// Make sure a section page (and all its ancestors) exists
    fn ensure_section(&mut self, key: &PageKey, title: Option<String>) -> Result<usize> {
        if let Some(&existing) = self.by_key.get(key) {
            return Ok(existing);
        }

        let title = title.unwrap_or_else(|| {
            key.as_str()
                .rsplit(PageKey::SEPARATOR)
                .next()
                .unwrap_or(key.as_str())
                .replace(['-', '_'], " ")
        });
        let index = self.push(Draft {
            key: key.clone(),
            title,
            kind: DraftKind::Section,
            block: None,
            deferred: false,
            children: Vec::new(),
        });
        self.attach(index, key)?;
        Ok(index)
    }

    fn push(&mut self, draft: Draft) -> usize {
        let index = self.drafts.len();
        self.by_key.insert(draft.key.clone(), index);
        self.drafts.push(draft);
        index
    }

    fn attach(&mut self, index: usize, key: &PageKey) -> Result<()> {
        match key.parent() {
            Some(parent) => {
                let parent_index = self.ensure_section(&parent, None)?;
                self.drafts[parent_index].children.push(index);
            }
            None => self.roots.push(index),
        }
        Ok(())
    }

    fn materialize(&self, index: usize) -> PageNode {
        let draft = &self.drafts[index];
        PageNode {
            page_key: draft.key.clone(),
            title: draft.title.clone(),
            content_blocks: draft.block.iter().cloned().collect(),
            children: draft
                .children
                .iter()
                .map(|&child| self.materialize(child))
                .collect(),
            deferred: draft.deferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::template::SectionRule;
    use crate::model::{DocType, EntityKind};
    use crate::types::EntityId;
    use std::collections::BTreeSet;

    fn group(rule_index: usize, key: &str, title: &str) -> EntityGroup {
        EntityGroup {
            page_key: PageKey::from(key),
            title: title.to_string(),
            rule_index,
            group_key: title.to_lowercase(),
            doc_type: DocType::ApiReference,
            entity_ids: BTreeSet::from([EntityId::from(format!("class:{}", title))]),
        }
    }

    fn block(body: &str) -> ContentBlock {
        ContentBlock {
            source_entity_ids: BTreeSet::new(),
            doc_type: DocType::ApiReference,
            body: body.to_string(),
            generation_fingerprint: body.to_string(),
        }
    }

    fn template() -> OrganizationTemplate {
        OrganizationTemplate::new(vec![
            SectionRule::new("Overview", DocType::Architecture, &[EntityKind::Module], GroupBy::None),
            SectionRule::new("API", DocType::ApiReference, &[EntityKind::Class], GroupBy::Module),
        ])
    }

    #[test]
    fn test_builds_sections_and_defers_missing_blocks() {
        let template = template();
        let groups = vec![
            group(0, "Overview", "Overview"),
            group(1, "API/orders", "Orders"),
            group(1, "API/users", "Users"),
        ];
        let blocks = BTreeMap::from([
            (PageKey::from("Overview"), block("intro")),
            (PageKey::from("API/orders"), block("orders")),
        ]);

        let tree = HierarchyBuilder::new(&template).build(&groups, &blocks).unwrap();

        let keys: Vec<&str> = tree.preorder().iter().map(|v| v.node.page_key.as_str()).collect();
        assert_eq!(keys, vec!["Overview", "API", "API/orders", "API/users"]);

        let users = tree.get(&PageKey::from("API/users")).unwrap();
        assert!(users.deferred);
        assert!(!tree.get(&PageKey::from("API/orders")).unwrap().deferred);
        assert!(!tree.get(&PageKey::from("API")).unwrap().deferred);
    }

    #[test]
    fn test_nested_rule_path_creates_ancestors() {
        let template = OrganizationTemplate::new(vec![SectionRule::new(
            "Architecture/Diagrams",
            DocType::Diagram,
            &[],
            GroupBy::None,
        )]);
        let groups = vec![group(0, "Architecture/Diagrams", "Diagrams")];
        let blocks = BTreeMap::from([(PageKey::from("Architecture/Diagrams"), block("graph TD"))]);

        let tree = HierarchyBuilder::new(&template).build(&groups, &blocks).unwrap();

        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].page_key.as_str(), "Architecture");
        assert_eq!(tree.roots[0].children[0].page_key.as_str(), "Architecture/Diagrams");
    }

    #[test]
    fn test_build_is_deterministic() {
        let template = template();
        let groups = vec![group(1, "API/orders", "Orders"), group(1, "API/users", "Users")];
        let blocks = BTreeMap::from([
            (PageKey::from("API/orders"), block("orders")),
            (PageKey::from("API/users"), block("users")),
        ]);

        let a = HierarchyBuilder::new(&template).build(&groups, &blocks).unwrap();
        let b = HierarchyBuilder::new(&template).build(&groups, &blocks).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
