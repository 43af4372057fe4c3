//! Reconciliation of the candidate tree against published state
//!
//! A pure, synchronous function of three frozen inputs. It never writes
//! over content it did not publish itself: any divergence between the live
//! page and `last_published_hash` turns a would-be Update into a Conflict.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use super::plan::{MutationPlan, OperationKind, PagePayload, PlannedOperation, Reason};
use super::record::{LiveRemoteSnapshot, RecordMap, RemotePageRecord};
use crate::hierarchy::{PageNode, PageTree};
use crate::types::PageKey;

/// Compute the mutation plan for one run.
///
/// Operations for candidate pages come first in pre-order (parents before
/// children, siblings in tree order). Pages only known from records come
/// last in post-order over their recorded parent links.
#[instrument(skip_all, fields(candidate = candidate.len(), records = records.len(), live = live.len()))]
pub fn reconcile(
    candidate: &PageTree,
    records: &RecordMap,
    live: &LiveRemoteSnapshot,
) -> MutationPlan {
    let mut operations = Vec::new();
    // Keys that will not exist on the platform after this plan
    let mut unavailable: BTreeSet<PageKey> = BTreeSet::new();
    let mut candidate_keys: BTreeSet<&PageKey> = BTreeSet::new();

    for visit in candidate.preorder() {
        let node = visit.node;
        let key = &node.page_key;
        candidate_keys.insert(key);
        let parent = visit.parent.cloned();
        let parent_unavailable = parent.as_ref().is_some_and(|p| unavailable.contains(p));

        let op = match records.get(key) {
            None => plan_unrecorded(node, parent, parent_unavailable, live),
            Some(record) => plan_recorded(node, parent, record, live),
        };

        let exists_after = match op.kind {
            OperationKind::Create | OperationKind::Update => true,
            OperationKind::Skip | OperationKind::Conflict => records
                .get(key)
                .is_some_and(|r| !r.is_archived() && op.reason != Reason::RemoteMissing),
            OperationKind::OrphanArchive => false,
        };
        if !exists_after {
            unavailable.insert(key.clone());
        }

        debug!(page_key = %key, op = %op.kind, reason = %op.reason, "Planned");
        operations.push(op);
    }

    operations.extend(plan_orphans(records, &candidate_keys, live));

    MutationPlan::new(operations)
}

fn payload(node: &PageNode) -> PagePayload {
    let body = node.body();
    PagePayload {
        title: node.title.clone(),
        content_hash: crate::types::page_content_hash(&node.title, &body),
        body,
    }
}

fn plan_unrecorded(
    node: &PageNode,
    parent: Option<PageKey>,
    parent_unavailable: bool,
    live: &LiveRemoteSnapshot,
) -> PlannedOperation {
    let key = node.page_key.clone();

    if node.deferred {
        return PlannedOperation::new(OperationKind::Skip, key, Reason::GenerationDeferred)
            .with_parent(parent);
    }

    if let Some(claim) = live.claimed(&key) {
        return PlannedOperation::new(OperationKind::Conflict, key, Reason::UnownedRemotePage)
            .with_parent(parent)
            .with_remote_id(Some(claim.remote_id.clone()));
    }

    if live.has_unidentified(&key) {
        return PlannedOperation::new(OperationKind::Conflict, key, Reason::MalformedRemote)
            .with_parent(parent);
    }

    if parent_unavailable {
        return PlannedOperation::new(OperationKind::Skip, key, Reason::ParentUnavailable)
            .with_parent(parent);
    }

    PlannedOperation::new(OperationKind::Create, key, Reason::NewPage)
        .with_parent(parent)
        .with_payload(payload(node))
}

fn plan_recorded(
    node: &PageNode,
    parent: Option<PageKey>,
    record: &RemotePageRecord,
    live: &LiveRemoteSnapshot,
) -> PlannedOperation {
    let key = node.page_key.clone();
    let remote_id = Some(record.remote_id.clone());
    let base = |kind, reason| {
        PlannedOperation::new(kind, key.clone(), reason)
            .with_parent(parent.clone())
            .with_remote_id(remote_id.clone())
    };

    let Some(live_page) = live.get(&record.remote_id) else {
        return base(OperationKind::Conflict, missing_reason(&key, live));
    };

    let Some(live_hash) = live_page.content_hash() else {
        return base(OperationKind::Conflict, Reason::MalformedRemote);
    };

    let manual_edit =
        live_hash != record.last_published_hash || live_page.archived != record.is_archived();

    if node.deferred {
        return base(OperationKind::Skip, Reason::GenerationDeferred).with_manual_edit(manual_edit);
    }

    if manual_edit {
        let rendered = payload(node);
        if !record.is_archived() && rendered.content_hash == record.last_published_hash {
            // Nothing of ours to push; leave the human edit alone
            return base(OperationKind::Skip, Reason::Unchanged).with_manual_edit(true);
        }
        return base(OperationKind::Conflict, Reason::ManualEdit).with_manual_edit(true);
    }

    if record.is_archived() {
        return base(OperationKind::Update, Reason::RestoreArchived).with_payload(payload(node));
    }

    let rendered = payload(node);
    if rendered.content_hash == record.last_published_hash {
        base(OperationKind::Skip, Reason::Unchanged)
    } else {
        base(OperationKind::Update, Reason::ContentChanged).with_payload(rendered)
    }
}

/// Why a recorded page has no live counterpart under its remote id
fn missing_reason(key: &PageKey, live: &LiveRemoteSnapshot) -> Reason {
    if live.has_unidentified(key) {
        Reason::MalformedRemote
    } else {
        Reason::RemoteMissing
    }
}

/// Operations for records with no candidate page, children before parents
fn plan_orphans(
    records: &RecordMap,
    candidate_keys: &BTreeSet<&PageKey>,
    live: &LiveRemoteSnapshot,
) -> Vec<PlannedOperation> {
    let orphans: BTreeMap<&PageKey, &RemotePageRecord> = records
        .iter()
        .filter(|(key, _)| !candidate_keys.contains(key))
        .collect();

    let mut children: BTreeMap<&PageKey, Vec<&PageKey>> = BTreeMap::new();
    let mut roots: Vec<&PageKey> = Vec::new();
    for (key, record) in &orphans {
        match record.parent_key.as_ref().filter(|p| orphans.contains_key(p)) {
            Some(parent) => children.entry(parent).or_default().push(*key),
            None => roots.push(*key),
        }
    }

    fn visit<'a>(
        key: &'a PageKey,
        children: &BTreeMap<&'a PageKey, Vec<&'a PageKey>>,
        out: &mut Vec<&'a PageKey>,
    ) {
        if let Some(kids) = children.get(key) {
            for child in kids {
                visit(*child, children, out);
            }
        }
        out.push(key);
    }

    let mut order = Vec::with_capacity(orphans.len());
    for root in roots {
        visit(root, &children, &mut order);
    }

    order
        .into_iter()
        .map(|key| {
            let record = orphans[key];
            let base = |kind, reason| {
                PlannedOperation::new(kind, key.clone(), reason)
                    .with_parent(record.parent_key.clone())
                    .with_remote_id(Some(record.remote_id.clone()))
            };
            if record.is_archived() {
                return base(OperationKind::Skip, Reason::AlreadyArchived);
            }
            match live.get(&record.remote_id) {
                None => base(OperationKind::Conflict, missing_reason(key, live)),
                Some(page) => {
                    let manual = page
                        .content_hash()
                        .is_none_or(|h| h != record.last_published_hash);
                    base(OperationKind::OrphanArchive, Reason::Orphaned).with_manual_edit(manual)
                }
            }
        })
        .collect()
}
