//! Plan application
//!
//! Operations are partitioned by top-level subtree (`page_key` root
//! segment). Subtrees run concurrently up to the configured bound; inside a
//! subtree operations run in plan order, so a parent is created before any
//! child that needs its remote id. Orphan archives run after every upsert.
//!
//! Every successful mutation is journaled under `(plan_id, page_key)`
//! before the next one starts. Re-running a plan skips journaled
//! operations, which makes a retry after a partial failure a no-op for
//! everything that already went through. A mutation that went through but
//! could not be journaled fails, and the rest of its subtree is not
//! attempted.

use chrono::Utc;
use dashmap::DashMap;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use super::platform::{PageWrite, SharedPlatform};
use crate::config::StageConfig;
use crate::constants::publish as defaults;
use crate::reconcile::{LiveRemoteSnapshot, MutationPlan, OperationKind, PlannedOperation, RecordMap};
use crate::storage::{JournalEntry, JournalOp, PublishJournal};
use crate::types::{PageKey, Result, SyncError};
use crate::util::{CancelFlag, RetryPolicy, retry_call, with_timeout};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Applied,
    /// Journaled by an earlier attempt of the same plan
    AlreadyApplied,
    Skipped,
    Conflict,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResult {
    pub page_key: PageKey,
    pub kind: OperationKind,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    fn new(op: &PlannedOperation, status: OperationStatus) -> Self {
        Self {
            page_key: op.page_key.clone(),
            kind: op.kind,
            status,
            remote_id: op.remote_id.clone(),
            attempts: 0,
            error: None,
        }
    }

    fn failed(op: &PlannedOperation, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            attempts,
            error: Some(error.into()),
            ..Self::new(op, OperationStatus::Failed)
        }
    }
}

/// What applying a plan did
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub plan_id: String,
    /// One result per planned operation, in plan order
    pub results: Vec<OperationResult>,
    /// Records after every applied operation
    #[serde(skip)]
    pub records: RecordMap,
    pub cancelled: bool,
}

impl PublishOutcome {
    pub fn count(&self, status: OperationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results
            .iter()
            .filter(|r| r.status == OperationStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Shared state of one `publish` call
struct ApplyContext<'a> {
    plan_id: &'a str,
    journaled: BTreeMap<PageKey, JournalEntry>,
    remote_ids: DashMap<PageKey, String>,
    /// Subtree root segments stopped by a journal write failure
    halted: DashMap<String, String>,
    cancel: &'a CancelFlag,
}

type Applied = (usize, OperationResult, Option<JournalEntry>);

pub struct Publisher {
    platform: SharedPlatform,
    journal: Option<PublishJournal>,
    retry: RetryPolicy,
    timeout: Duration,
    concurrency: usize,
}

impl Publisher {
    pub fn new(platform: SharedPlatform) -> Self {
        Self {
            platform,
            journal: None,
            retry: RetryPolicy::new(
                defaults::DEFAULT_MAX_RETRIES,
                defaults::BASE_DELAY_MS,
                defaults::MAX_DELAY_SECS,
            ),
            timeout: Duration::from_secs(defaults::CALL_TIMEOUT_SECS),
            concurrency: defaults::DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_config(
        platform: SharedPlatform,
        journal: PublishJournal,
        stage: &StageConfig,
        timeout: Duration,
    ) -> Self {
        Self::new(platform)
            .with_journal(journal)
            .with_retry(stage.retry_policy())
            .with_timeout(timeout)
            .with_concurrency(stage.concurrency)
    }

    pub fn with_journal(mut self, journal: PublishJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn platform_name(&self) -> &str {
        self.platform.name()
    }

    /// Live snapshot of the documentation root, retried like any other call
    pub async fn snapshot(&self) -> Result<LiveRemoteSnapshot> {
        let operation = "platform snapshot";
        retry_call(&self.retry, operation, || {
            with_timeout(self.timeout, self.platform.snapshot(), operation)
        })
        .await
        .result
    }

    /// Apply `plan` on top of `records`.
    ///
    /// Per-operation failures are reported in the outcome; only journal
    /// read failures end the call with an error.
    #[instrument(skip_all, fields(plan_id = %plan.plan_id, operations = plan.operations.len()))]
    pub async fn publish(
        &self,
        plan: &MutationPlan,
        records: &RecordMap,
        cancel: &CancelFlag,
    ) -> Result<PublishOutcome> {
        let journaled: BTreeMap<PageKey, JournalEntry> = match &self.journal {
            Some(journal) => journal
                .entries()?
                .into_iter()
                .filter(|e| e.plan_id == plan.plan_id)
                .map(|e| (e.page_key.clone(), e))
                .collect(),
            None => BTreeMap::new(),
        };
        if !journaled.is_empty() {
            info!(entries = journaled.len(), "Resuming partially applied plan");
        }

        let remote_ids: DashMap<PageKey, String> = records
            .iter()
            .map(|(key, r)| (key.clone(), r.remote_id.clone()))
            .collect();
        for entry in journaled.values() {
            remote_ids.insert(entry.page_key.clone(), entry.remote_id.clone());
        }

        let ctx = ApplyContext {
            plan_id: &plan.plan_id,
            journaled,
            remote_ids,
            halted: DashMap::new(),
            cancel,
        };

        let (orphans, upserts): (Vec<_>, Vec<_>) = plan
            .operations
            .iter()
            .enumerate()
            .partition(|(_, op)| op.kind == OperationKind::OrphanArchive);

        let mut applied = self.apply_subtrees(upserts, &ctx).await;
        applied.extend(self.apply_subtrees(orphans, &ctx).await);
        applied.sort_by_key(|(index, _, _)| *index);

        let mut records = records.clone();
        let mut results = Vec::with_capacity(applied.len());
        for (index, result, entry) in applied {
            if let Some(entry) = entry {
                entry.apply(&mut records);
            }
            let op = &plan.operations[index];
            if op.manual_edit
                && let Some(record) = records.get_mut(&op.page_key)
            {
                record.manual_edit_flag = true;
            }
            results.push(result);
        }

        let outcome = PublishOutcome {
            plan_id: plan.plan_id.clone(),
            results,
            records,
            cancelled: cancel.is_cancelled(),
        };

        info!(
            applied = outcome.count(OperationStatus::Applied),
            resumed = outcome.count(OperationStatus::AlreadyApplied),
            failed = outcome.count(OperationStatus::Failed),
            conflicts = outcome.count(OperationStatus::Conflict),
            "Publish complete"
        );

        Ok(outcome)
    }

    async fn apply_subtrees(
        &self,
        operations: Vec<(usize, &PlannedOperation)>,
        ctx: &ApplyContext<'_>,
    ) -> Vec<Applied> {
        let mut subtrees: BTreeMap<&str, Vec<(usize, &PlannedOperation)>> = BTreeMap::new();
        for (index, op) in operations {
            subtrees
                .entry(op.page_key.root_segment())
                .or_default()
                .push((index, op));
        }

        futures::stream::iter(subtrees.into_values())
            .map(|ops| self.apply_sequence(ops, ctx))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<Vec<Applied>>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn apply_sequence(
        &self,
        operations: Vec<(usize, &PlannedOperation)>,
        ctx: &ApplyContext<'_>,
    ) -> Vec<Applied> {
        let mut out = Vec::with_capacity(operations.len());
        for (index, op) in operations {
            if ctx.cancel.is_cancelled() {
                out.push((index, OperationResult::new(op, OperationStatus::Cancelled), None));
                continue;
            }
            let root = op.page_key.root_segment();
            let mutates = !matches!(op.kind, OperationKind::Skip | OperationKind::Conflict);
            if mutates && let Some(reason) = ctx.halted.get(root) {
                out.push((index, OperationResult::failed(op, 0, reason.clone()), None));
                continue;
            }
            let (result, entry) = self.apply_one(op, ctx).await;
            if result.status == OperationStatus::Failed && entry.is_some() {
                ctx.halted.insert(
                    root.to_string(),
                    format!("not attempted: journal write failed for {}", op.page_key),
                );
            }
            out.push((index, result, entry));
        }
        out
    }

    async fn apply_one(
        &self,
        op: &PlannedOperation,
        ctx: &ApplyContext<'_>,
    ) -> (OperationResult, Option<JournalEntry>) {
        let journal_op = match op.kind {
            OperationKind::Skip => return (OperationResult::new(op, OperationStatus::Skipped), None),
            OperationKind::Conflict => {
                return (OperationResult::new(op, OperationStatus::Conflict), None);
            }
            OperationKind::Create => JournalOp::Create,
            OperationKind::Update => JournalOp::Update,
            OperationKind::OrphanArchive => JournalOp::Archive,
        };

        if let Some(entry) = ctx.journaled.get(&op.page_key)
            && entry.operation == journal_op
        {
            debug!(page_key = %op.page_key, "Already applied by an earlier attempt");
            let mut result = OperationResult::new(op, OperationStatus::AlreadyApplied);
            result.remote_id = Some(entry.remote_id.clone());
            return (result, Some(entry.clone()));
        }

        let (remote_id, attempts) = match self.call(op, journal_op, ctx).await {
            Ok(done) => done,
            Err((attempts, reason)) => {
                warn!(page_key = %op.page_key, op = %op.kind, error = %reason, "Operation failed");
                return (OperationResult::failed(op, attempts, reason), None);
            }
        };
        ctx.remote_ids.insert(op.page_key.clone(), remote_id.clone());

        let (title, content_hash) = op
            .payload
            .as_ref()
            .map(|p| (p.title.clone(), p.content_hash.clone()))
            .unwrap_or_default();
        let entry = JournalEntry {
            plan_id: ctx.plan_id.to_string(),
            page_key: op.page_key.clone(),
            operation: journal_op,
            remote_id: remote_id.clone(),
            parent_key: op.parent_key.clone(),
            title,
            content_hash,
            applied_at: Utc::now(),
        };
        if let Some(journal) = &self.journal
            && let Err(e) = journal.record(&entry)
        {
            error!(page_key = %op.page_key, error = %e, "Applied operation could not be journaled");
            let mut result =
                OperationResult::failed(op, attempts, format!("applied but not journaled: {}", e));
            result.remote_id = Some(remote_id);
            return (result, Some(entry));
        }

        debug!(page_key = %op.page_key, op = %op.kind, remote_id = %remote_id, "Applied");
        let mut result = OperationResult::new(op, OperationStatus::Applied);
        result.remote_id = Some(remote_id);
        result.attempts = attempts;
        (result, Some(entry))
    }

    /// Issue the platform call for one mutation. Returns the page's remote
    /// id and the attempts it took.
    async fn call(
        &self,
        op: &PlannedOperation,
        journal_op: JournalOp,
        ctx: &ApplyContext<'_>,
    ) -> std::result::Result<(String, u32), (u32, String)> {
        let known_id = op
            .remote_id
            .clone()
            .or_else(|| ctx.remote_ids.get(&op.page_key).map(|id| id.clone()));
        let operation = format!("{} {}", op.kind, op.page_key);

        let write = op.payload.as_ref().map(|p| PageWrite {
            page_key: op.page_key.clone(),
            title: p.title.clone(),
            body: p.body.clone(),
        });

        let attempted = match journal_op {
            JournalOp::Create => {
                let Some(write) = write else {
                    return Err((0, "create without payload".to_string()));
                };
                let parent_id = match &op.parent_key {
                    None => None,
                    Some(parent) => match ctx.remote_ids.get(parent) {
                        Some(id) => Some(id.clone()),
                        None => {
                            return Err((0, format!("parent page {} is unavailable", parent)));
                        }
                    },
                };
                retry_call(&self.retry, &operation, || {
                    with_timeout(
                        self.timeout,
                        self.platform.create(parent_id.as_deref(), &write),
                        &operation,
                    )
                })
                .await
            }
            JournalOp::Update => {
                let (Some(write), Some(remote_id)) = (write, known_id) else {
                    return Err((0, "update without payload or remote id".to_string()));
                };
                let attempted = retry_call(&self.retry, &operation, || {
                    with_timeout(self.timeout, self.platform.update(&remote_id, &write), &operation)
                })
                .await;
                map_attempted(attempted, remote_id)
            }
            JournalOp::Archive => {
                let Some(remote_id) = known_id else {
                    return Err((0, "archive without remote id".to_string()));
                };
                let attempted = retry_call(&self.retry, &operation, || {
                    with_timeout(self.timeout, self.platform.archive(&remote_id), &operation)
                })
                .await;
                map_attempted(attempted, remote_id)
            }
        };

        match attempted.result {
            Ok(remote_id) => Ok((remote_id, attempted.attempts)),
            Err(e) => Err((attempted.attempts, publish_error(op, &e).to_string())),
        }
    }
}

fn map_attempted(
    attempted: crate::util::Attempted<()>,
    remote_id: String,
) -> crate::util::Attempted<String> {
    crate::util::Attempted {
        result: attempted.result.map(|_| remote_id),
        attempts: attempted.attempts,
    }
}

fn publish_error(op: &PlannedOperation, err: &SyncError) -> SyncError {
    SyncError::PublishFailed {
        page_key: op.page_key.to_string(),
        operation: op.kind.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::platform::RemotePlatform;
    use crate::reconcile::{LivePage, PagePayload, Reason, RemotePageRecord};
    use crate::storage::Database;
    use crate::types::{ErrorCategory, ExternalError, page_content_hash};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory platform with scripted failures
    #[derive(Default)]
    struct MockPlatform {
        pages: Mutex<BTreeMap<String, LivePage>>,
        parents: Mutex<BTreeMap<String, Option<String>>>,
        failing_keys: BTreeSet<String>,
        calls: AtomicUsize,
    }

    impl MockPlatform {
        fn failing(keys: &[&str]) -> Self {
            Self {
                failing_keys: keys.iter().map(|k| k.to_string()).collect(),
                ..Self::default()
            }
        }

        fn check(&self, key: &PageKey) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_keys.contains(key.as_str()) {
                return Err(ExternalError::new(ErrorCategory::Transient, "unavailable").into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemotePlatform for MockPlatform {
        fn name(&self) -> &str {
            "mock"
        }

        async fn snapshot(&self) -> Result<LiveRemoteSnapshot> {
            let pages = self.pages.lock().unwrap().values().cloned().collect();
            Ok(LiveRemoteSnapshot::new(pages))
        }

        async fn create(&self, parent: Option<&str>, page: &PageWrite) -> Result<String> {
            self.check(&page.page_key)?;
            let id = format!("id-{}", page.page_key);
            self.parents
                .lock()
                .unwrap()
                .insert(id.clone(), parent.map(str::to_string));
            self.pages.lock().unwrap().insert(
                id.clone(),
                LivePage {
                    remote_id: id.clone(),
                    page_key: Some(page.page_key.clone()),
                    title: Some(page.title.clone()),
                    body: Some(page.body.clone()),
                    archived: false,
                },
            );
            Ok(id)
        }

        async fn update(&self, remote_id: &str, page: &PageWrite) -> Result<()> {
            self.check(&page.page_key)?;
            let mut pages = self.pages.lock().unwrap();
            let live = pages.get_mut(remote_id).ok_or_else(|| {
                SyncError::from(ExternalError::new(ErrorCategory::NotFound, remote_id))
            })?;
            live.body = Some(page.body.clone());
            live.archived = false;
            Ok(())
        }

        async fn archive(&self, remote_id: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(page) = self.pages.lock().unwrap().get_mut(remote_id) {
                page.archived = true;
            }
            Ok(())
        }
    }

    fn payload(key: &str) -> PagePayload {
        let body = format!("# {}\n", key);
        PagePayload {
            title: key.to_string(),
            content_hash: page_content_hash(key, &body),
            body,
        }
    }

    fn create(key: &str, parent: Option<&str>) -> PlannedOperation {
        PlannedOperation::new(OperationKind::Create, key.into(), Reason::NewPage)
            .with_parent(parent.map(PageKey::from))
            .with_payload(payload(key))
    }

    fn record(key: &str) -> RemotePageRecord {
        RemotePageRecord {
            page_key: key.into(),
            remote_id: format!("id-{}", key),
            parent_key: None,
            title: key.to_string(),
            last_published_hash: "old".into(),
            last_published_at: Utc::now(),
            manual_edit_flag: false,
            archived_at: None,
        }
    }

    fn publisher(platform: Arc<MockPlatform>) -> Publisher {
        Publisher::new(platform).with_retry(RetryPolicy::immediate(1))
    }

    fn journal() -> PublishJournal {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        PublishJournal::new(Arc::new(db), "docs")
    }

    #[tokio::test]
    async fn test_children_use_parent_remote_id() {
        let platform = Arc::new(MockPlatform::default());
        let plan = MutationPlan::new(vec![create("API", None), create("API/shop", Some("API"))]);

        let outcome = publisher(platform.clone())
            .publish(&plan, &RecordMap::new(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.count(OperationStatus::Applied), 2);
        assert_eq!(
            platform.parents.lock().unwrap()["id-API/shop"].as_deref(),
            Some("id-API")
        );
        let child = &outcome.records[&PageKey::from("API/shop")];
        assert_eq!(child.parent_key, Some(PageKey::from("API")));
        assert_eq!(child.last_published_hash, payload("API/shop").content_hash);
    }

    #[tokio::test]
    async fn test_failed_subtree_does_not_block_siblings() {
        let platform = Arc::new(MockPlatform::failing(&["API"]));
        let plan = MutationPlan::new(vec![
            create("API", None),
            create("API/shop", Some("API")),
            create("Guide", None),
        ]);

        let outcome = publisher(platform.clone())
            .publish(&plan, &RecordMap::new(), &CancelFlag::new())
            .await
            .unwrap();

        let statuses: Vec<_> = outcome.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                OperationStatus::Failed,
                OperationStatus::Failed,
                OperationStatus::Applied
            ]
        );
        assert_eq!(outcome.results[0].attempts, 2);
        assert!(outcome.results[1].error.as_ref().unwrap().contains("unavailable"));
        assert!(outcome.records.contains_key(&PageKey::from("Guide")));
        assert!(!outcome.records.contains_key(&PageKey::from("API")));
        // 2 attempts for API, none for its child, 1 for Guide
        assert_eq!(platform.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_journal_write_failure_stops_subtree() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.execute(
            "CREATE TRIGGER reject_journal BEFORE INSERT ON publish_journal
             BEGIN SELECT RAISE(ABORT, 'journal unavailable'); END",
            &[],
        )
        .unwrap();
        let platform = Arc::new(MockPlatform::default());
        let plan = MutationPlan::new(vec![
            create("API", None),
            create("API/shop", Some("API")),
            create("Guide", None),
        ]);

        let outcome = publisher(platform.clone())
            .with_journal(PublishJournal::new(Arc::new(db), "docs"))
            .with_concurrency(1)
            .publish(&plan, &RecordMap::new(), &CancelFlag::new())
            .await
            .unwrap();

        let api = &outcome.results[0];
        assert_eq!(api.status, OperationStatus::Failed);
        assert!(api.error.as_ref().unwrap().contains("not journaled"));
        assert_eq!(api.remote_id.as_deref(), Some("id-API"));
        // The page exists remotely, so the record is kept for commit
        assert!(outcome.records.contains_key(&PageKey::from("API")));

        let shop = &outcome.results[1];
        assert_eq!(shop.status, OperationStatus::Failed);
        assert_eq!(shop.attempts, 0);
        assert!(!platform.pages.lock().unwrap().contains_key("id-API/shop"));

        // Other subtrees hit the same failure on their first mutation
        assert_eq!(outcome.results[2].status, OperationStatus::Failed);
        assert_eq!(platform.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rerun_skips_journaled_operations() {
        let platform = Arc::new(MockPlatform::failing(&["Guide"]));
        let journal = journal();
        let plan = MutationPlan::new(vec![create("API", None), create("Guide", None)]);

        let first = publisher(platform.clone())
            .with_journal(journal.clone())
            .publish(&plan, &RecordMap::new(), &CancelFlag::new())
            .await
            .unwrap();
        assert!(first.has_failures());

        let healthy = Arc::new(MockPlatform::default());
        let second = publisher(healthy.clone())
            .with_journal(journal)
            .publish(&plan, &RecordMap::new(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(second.results[0].status, OperationStatus::AlreadyApplied);
        assert_eq!(second.results[1].status, OperationStatus::Applied);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.records.len(), 2);
    }

    #[tokio::test]
    async fn test_manual_edit_skip_sets_flag_and_archive_keeps_record() {
        let platform = Arc::new(MockPlatform::default());
        let records: RecordMap = [record("Guide"), record("Old")]
            .into_iter()
            .map(|r| (r.page_key.clone(), r))
            .collect();
        let plan = MutationPlan::new(vec![
            PlannedOperation::new(OperationKind::Skip, "Guide".into(), Reason::ManualEdit)
                .with_remote_id(Some("id-Guide".into()))
                .with_manual_edit(true),
            PlannedOperation::new(OperationKind::OrphanArchive, "Old".into(), Reason::Orphaned)
                .with_remote_id(Some("id-Old".into())),
        ]);

        let outcome = publisher(platform)
            .publish(&plan, &records, &CancelFlag::new())
            .await
            .unwrap();

        assert!(outcome.records[&PageKey::from("Guide")].manual_edit_flag);
        assert!(outcome.records[&PageKey::from("Old")].is_archived());
        assert_eq!(outcome.count(OperationStatus::Skipped), 1);
    }

    #[tokio::test]
    async fn test_cancelled_publish_applies_nothing() {
        let platform = Arc::new(MockPlatform::default());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let plan = MutationPlan::new(vec![create("API", None)]);

        let outcome = publisher(platform.clone())
            .publish(&plan, &RecordMap::new(), &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.count(OperationStatus::Cancelled), 1);
        assert_eq!(platform.calls.load(Ordering::SeqCst), 0);
    }
}
