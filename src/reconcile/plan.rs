//! Mutation plan produced by reconciliation

use serde::{Deserialize, Serialize};

use crate::types::{Fingerprinter, PageKey};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Skip,
    Conflict,
    OrphanArchive,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Conflict => "conflict",
            Self::OrphanArchive => "orphan_archive",
        }
    }

    /// Whether applying the operation calls the platform
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::OrphanArchive)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an operation was chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NewPage,
    ContentChanged,
    RestoreArchived,
    Unchanged,
    GenerationDeferred,
    ParentUnavailable,
    AlreadyArchived,
    ManualEdit,
    RemoteMissing,
    MalformedRemote,
    UnownedRemotePage,
    Orphaned,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPage => "new_page",
            Self::ContentChanged => "content_changed",
            Self::RestoreArchived => "restore_archived",
            Self::Unchanged => "unchanged",
            Self::GenerationDeferred => "generation_deferred",
            Self::ParentUnavailable => "parent_unavailable",
            Self::AlreadyArchived => "already_archived",
            Self::ManualEdit => "manual_edit",
            Self::RemoteMissing => "remote_missing",
            Self::MalformedRemote => "malformed_remote",
            Self::UnownedRemotePage => "unowned_remote_page",
            Self::Orphaned => "orphaned",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered page content carried by Create and Update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PagePayload {
    pub title: String,
    pub body: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedOperation {
    pub kind: OperationKind,
    pub page_key: PageKey,
    pub reason: Reason,
    /// Tree parent for Create/Update; record parent for orphans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<PageKey>,
    /// Known remote identifier (record or live claim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PagePayload>,
    /// Live content differs from what this system last published
    #[serde(default)]
    pub manual_edit: bool,
}

impl PlannedOperation {
    pub fn new(kind: OperationKind, page_key: PageKey, reason: Reason) -> Self {
        Self {
            kind,
            page_key,
            reason,
            parent_key: None,
            remote_id: None,
            payload: None,
            manual_edit: false,
        }
    }

    pub fn with_parent(mut self, parent: Option<PageKey>) -> Self {
        self.parent_key = parent;
        self
    }

    pub fn with_remote_id(mut self, remote_id: Option<String>) -> Self {
        self.remote_id = remote_id;
        self
    }

    pub fn with_payload(mut self, payload: PagePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_manual_edit(mut self, manual_edit: bool) -> Self {
        self.manual_edit = manual_edit;
        self
    }
}

/// Per-outcome operation counts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub update: usize,
    pub skip: usize,
    pub conflict: usize,
    pub orphan_archive: usize,
}

/// Ordered operations for one run.
///
/// Upserts come first in top-down tree order, then orphan archives in
/// post-order. `plan_id` is a hash over the operations, so identical inputs
/// give an identical id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MutationPlan {
    pub plan_id: String,
    pub operations: Vec<PlannedOperation>,
}

impl MutationPlan {
    pub fn new(operations: Vec<PlannedOperation>) -> Self {
        let mut fp = Fingerprinter::domain("plan");
        for op in &operations {
            fp.push(op.kind.as_str());
            fp.push(op.page_key.as_str());
            fp.push(op.reason.as_str());
            fp.push(op.parent_key.as_ref().map(|k| k.as_str()).unwrap_or(""));
            fp.push(op.remote_id.as_deref().unwrap_or(""));
            fp.push(
                op.payload
                    .as_ref()
                    .map(|p| p.content_hash.as_str())
                    .unwrap_or(""),
            );
            fp.push(if op.manual_edit { "1" } else { "0" });
        }
        Self {
            plan_id: fp.finish(),
            operations,
        }
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for op in &self.operations {
            match op.kind {
                OperationKind::Create => counts.create += 1,
                OperationKind::Update => counts.update += 1,
                OperationKind::Skip => counts.skip += 1,
                OperationKind::Conflict => counts.conflict += 1,
                OperationKind::OrphanArchive => counts.orphan_archive += 1,
            }
        }
        counts
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &PlannedOperation> {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Conflict)
    }

    /// True when applying the plan would not touch the platform
    pub fn is_noop(&self) -> bool {
        !self.operations.iter().any(|op| op.kind.is_mutation())
    }

    pub fn get(&self, key: &PageKey) -> Option<&PlannedOperation> {
        self.operations.iter().find(|op| &op.page_key == key)
    }

    pub fn to_json(&self) -> crate::types::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_id_tracks_operations() {
        let a = MutationPlan::new(vec![PlannedOperation::new(
            OperationKind::Skip,
            "Overview".into(),
            Reason::Unchanged,
        )]);
        let b = MutationPlan::new(vec![PlannedOperation::new(
            OperationKind::Skip,
            "Overview".into(),
            Reason::Unchanged,
        )]);
        let c = MutationPlan::new(vec![PlannedOperation::new(
            OperationKind::Skip,
            "Overview".into(),
            Reason::GenerationDeferred,
        )]);
        assert_eq!(a.plan_id, b.plan_id);
        assert_ne!(a.plan_id, c.plan_id);
        assert!(a.is_noop());
    }

    #[test]
    fn test_operation_serializes_snake_case() {
        let op = PlannedOperation::new(OperationKind::OrphanArchive, "Legacy/Notes".into(), Reason::Orphaned);
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"orphan_archive\""));
        assert!(json.contains("\"orphaned\""));
        assert!(!json.contains("payload"));
    }
}
