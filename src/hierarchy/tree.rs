//! Page tree assembled from content blocks

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ContentBlock;
use crate::types::{PageKey, page_content_hash};

/// A node in the candidate documentation tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageNode {
    pub page_key: PageKey,
    pub title: String,
    pub content_blocks: Vec<ContentBlock>,
    pub children: Vec<PageNode>,
    /// Content generation failed this run; the page keeps its remote state
    #[serde(default)]
    pub deferred: bool,
}

impl PageNode {
    pub fn new(page_key: PageKey, title: impl Into<String>) -> Self {
        Self {
            page_key,
            title: title.into(),
            content_blocks: Vec::new(),
            children: Vec::new(),
            deferred: false,
        }
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content_blocks.push(block);
        self
    }

    pub fn with_child(mut self, child: PageNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Rendered page body.
    ///
    /// Pages without blocks render an index of their children, so section
    /// pages change only when their set of children changes.
    pub fn body(&self) -> String {
        if !self.content_blocks.is_empty() {
            return self
                .content_blocks
                .iter()
                .map(|b| b.body.trim_end())
                .collect::<Vec<_>>()
                .join("\n\n");
        }
        let mut body = format!("# {}\n", self.title);
        if !self.children.is_empty() {
            body.push('\n');
            for child in &self.children {
                body.push_str(&format!("- {} (`{}`)\n", child.title, child.page_key));
            }
        }
        body
    }

    /// Hash compared against `last_published_hash`
    pub fn content_hash(&self) -> String {
        page_content_hash(&self.title, &self.body())
    }
}

/// Candidate documentation tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageTree {
    pub roots: Vec<PageNode>,
}

/// A node visited in pre-order together with its parent key
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub node: &'a PageNode,
    pub parent: Option<&'a PageKey>,
}

impl PageTree {
    pub fn new(roots: Vec<PageNode>) -> Self {
        Self { roots }
    }

    /// Top-down pre-order, siblings in tree order
    pub fn preorder(&self) -> Vec<Visit<'_>> {
        fn walk<'a>(node: &'a PageNode, parent: Option<&'a PageKey>, out: &mut Vec<Visit<'a>>) {
            out.push(Visit { node, parent });
            for child in &node.children {
                walk(child, Some(&node.page_key), out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, None, &mut out);
        }
        out
    }

    /// Index of every node by key
    pub fn index(&self) -> BTreeMap<&PageKey, Visit<'_>> {
        self.preorder()
            .into_iter()
            .map(|v| (&v.node.page_key, v))
            .collect()
    }

    pub fn get(&self, key: &PageKey) -> Option<&PageNode> {
        self.preorder()
            .into_iter()
            .find(|v| &v.node.page_key == key)
            .map(|v| v.node)
    }

    pub fn len(&self) -> usize {
        self.preorder().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn deferred_count(&self) -> usize {
        self.preorder().iter().filter(|v| v.node.deferred).count()
    }
}
