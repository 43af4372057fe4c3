//! Page hierarchy: organizational template, grouping and tree assembly

pub mod builder;
pub mod template;
pub mod tree;

pub use builder::HierarchyBuilder;
pub use template::{EntityGroup, GroupBy, OrganizationTemplate, PageOrder, SectionRule, module_of};
pub use tree::{PageNode, PageTree, Visit};
