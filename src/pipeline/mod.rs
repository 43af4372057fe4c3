//! Sync pipeline
//!
//! One run per documentation root:
//!
//! ```text
//! lock -> load state -> analyze -> graph -> detect -> group -> synthesize
//!      -> hierarchy -> live snapshot -> reconcile -> publish -> commit
//! ```
//!
//! State is read once before analysis and committed once after publishing.
//! A failed or cancelled run commits nothing; operations it already applied
//! stay in the publish journal and are folded back in by the next run.

mod report;

pub use report::{
    ChangeCounts, ConflictSummary, PublishCounts, RunReport, RunStage, SynthesisCounts,
};

pub use crate::util::CancelFlag;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::analyzer::AnalyzerRegistry;
use crate::config::{Config, ConfigLoader};
use crate::constants::{cache, state};
use crate::detect::ChangeDetector;
use crate::feedback::{FeedbackQueue, JsonlFeedbackSink};
use crate::hierarchy::HierarchyBuilder;
use crate::model::{EntityGraph, EntityGraphBuilder, GraphBuild};
use crate::publish::{Publisher, SharedPlatform, create_platform};
use crate::reconcile::{MutationPlan, reconcile};
use crate::storage::{
    Database, PublishJournal, RootLock, RunHistory, SharedDatabase, StateSnapshot, StateStore,
};
use crate::synth::{BlockCache, SharedGenerator, SynthesizerAdapter, create_generator};
use crate::types::{Result, SyncError};

/// Plan computed without publishing
#[derive(Debug, Clone)]
pub struct PlanPreview {
    pub plan: MutationPlan,
    pub report: RunReport,
}

/// Everything up to and including reconciliation
struct Prepared {
    graph: EntityGraph,
    plan: MutationPlan,
    publisher: Publisher,
}

pub struct SyncPipeline {
    project_root: PathBuf,
    config: Config,
    db: SharedDatabase,
    generator: SharedGenerator,
    platform: SharedPlatform,
    registry: AnalyzerRegistry,
    cancel: CancelFlag,
}

impl SyncPipeline {
    /// Open the state database and build the configured collaborators
    pub fn open(project_root: &Path, config: Config) -> Result<Self> {
        if !ConfigLoader::is_project_initialized(project_root) {
            return Err(SyncError::NotInitialized);
        }
        config.validate()?;

        let db = Database::open(ConfigLoader::state_db_path(project_root))?;
        db.initialize()?;

        let generator = create_generator(&config.generator)?;
        let platform = create_platform(&config.platform, project_root)?;

        Self::new(project_root, config, Arc::new(db), generator, platform)
    }

    pub fn new(
        project_root: &Path,
        config: Config,
        db: SharedDatabase,
        generator: SharedGenerator,
        platform: SharedPlatform,
    ) -> Result<Self> {
        Ok(Self {
            project_root: project_root.to_path_buf(),
            config,
            db,
            generator,
            platform,
            registry: AnalyzerRegistry::with_defaults()?,
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run at the next stage boundary or operation
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> SharedDatabase {
        self.db.clone()
    }

    fn root(&self) -> String {
        self.config.documentation_root().to_string()
    }

    fn source_root(&self) -> PathBuf {
        match &self.config.project.source_root {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.project_root.join(path),
            None => self.project_root.clone(),
        }
    }

    /// Load committed state with journaled operations of an interrupted
    /// run folded in
    fn load_state(&self, root: &str, report: &mut RunReport) -> Result<StateSnapshot> {
        let mut snapshot = StateStore::new(self.db.clone()).load(root)?;
        let journal = PublishJournal::new(self.db.clone(), root);
        report.recovered_operations = journal.recover(&mut snapshot.records)?;
        if report.recovered_operations > 0 {
            info!(
                entries = report.recovered_operations,
                "Recovered operations from an interrupted run"
            );
        }
        report.complete(RunStage::LoadState);
        Ok(snapshot)
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Compute the mutation plan without publishing or committing
    #[instrument(skip_all, fields(root = %self.config.documentation_root()))]
    pub async fn plan(&self) -> Result<PlanPreview> {
        let root = self.root();
        let mut report = RunReport::new(&root, true);

        let state = self.load_state(&root, &mut report)?;
        let prepared = self.prepare(&root, &state, &mut report).await?;

        report.finish();
        Ok(PlanPreview {
            plan: prepared.plan,
            report,
        })
    }

    /// Run the full pipeline and commit the resulting state
    #[instrument(skip_all, fields(root = %self.config.documentation_root()))]
    pub async fn sync(&self) -> Result<RunReport> {
        let root = self.root();
        let mut report = RunReport::new(&root, false);

        let _lock = RootLock::acquire(&ConfigLoader::project_dir(&self.project_root), &root)?;
        report.complete(RunStage::Lock);

        let state = self.load_state(&root, &mut report)?;
        let prepared = self.prepare(&root, &state, &mut report).await?;

        self.cancel.check(RunStage::Publish.as_str())?;
        let outcome = prepared
            .publisher
            .publish(&prepared.plan, &state.records, &self.cancel)
            .await?;
        report.record_publish(&outcome);
        if outcome.cancelled {
            return Err(SyncError::Cancelled {
                stage: RunStage::Publish.to_string(),
            });
        }
        report.complete(RunStage::Publish);

        let version = StateStore::new(self.db.clone()).commit(&StateSnapshot {
            root: root.clone(),
            version: state.version,
            fingerprints: ChangeDetector::snapshot(&prepared.graph),
            records: outcome.records,
        })?;
        report.state_version = Some(version);
        report.complete(RunStage::Commit);
        report.finish();

        info!(
            version,
            applied = report.publish.applied,
            conflicts = report.conflicts.len(),
            generation_failures = report.generation_failures.len(),
            publish_failures = report.publish_failures.len(),
            "Sync committed"
        );

        self.after_commit(&root, &report).await;
        Ok(report)
    }

    /// Housekeeping that never fails a committed run
    async fn after_commit(&self, root: &str, report: &RunReport) {
        let history = RunHistory::new(self.db.clone());
        if let (Some(started), Some(finished)) = (report.started_at, report.finished_at)
            && let Err(e) = history.save(root, started, finished, report)
        {
            warn!(error = %e, "Failed to save run report");
        }
        if let Err(e) = history.prune(state::RUN_HISTORY_KEEP) {
            warn!(error = %e, "Failed to prune run history");
        }

        if let Err(e) = BlockCache::new(self.db.clone()).prune(cache::CACHE_EXPIRATION_DAYS) {
            warn!(error = %e, "Failed to prune block cache");
        }

        let sink_path = if self.config.feedback.sink.is_absolute() {
            self.config.feedback.sink.clone()
        } else {
            self.project_root.join(&self.config.feedback.sink)
        };
        let sink = JsonlFeedbackSink::new(sink_path);
        if let Err(e) = FeedbackQueue::new(self.db.clone()).forward(&sink).await {
            warn!(error = %e, "Feedback forwarding failed, items stay pending");
        }
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn prepare(
        &self,
        root: &str,
        state: &StateSnapshot,
        report: &mut RunReport,
    ) -> Result<Prepared> {
        let analysis = self
            .registry
            .analyze_tree(&self.source_root(), &self.config.analysis)?;
        report.files_scanned = analysis.files_scanned;
        report.analysis_failures = analysis.failures;
        report.complete(RunStage::Analyze);
        self.cancel.check(RunStage::Analyze.as_str())?;

        let mut builder = EntityGraphBuilder::new();
        for batch in &analysis.batches {
            builder.add_batch(batch);
        }
        let GraphBuild { graph, violations } = builder.build();
        for violation in &violations {
            warn!(error = %violation.to_error(), excluded = violation.excluded, "Schema violation");
        }
        report.entities = graph.len();
        report.schema_violations = violations;
        report.complete(RunStage::BuildGraph);

        let changes = ChangeDetector::detect(&graph, &state.fingerprints);
        let regeneration = ChangeDetector::regeneration_set(&graph, &state.fingerprints, &changes);
        report.changes = ChangeCounts {
            changed: changes.changed.len(),
            unchanged: changes.unchanged.len(),
            removed: changes.removed.len(),
            regenerate: regeneration.len(),
        };
        report.complete(RunStage::Detect);

        let template = self.config.organization_template(&self.project_root)?;
        let groups = template.group(&graph)?;
        report.complete(RunStage::Group);
        self.cancel.check(RunStage::Group.as_str())?;

        let timeouts = self.config.timeouts();
        let adapter = SynthesizerAdapter::from_config(
            self.generator.clone(),
            Arc::new(BlockCache::new(self.db.clone())),
            &self.config.synthesis,
            timeouts.generation,
        );
        let synthesis = adapter
            .synthesize_all(&groups, &graph, &regeneration, &self.cancel)
            .await?;
        report.record_synthesis(&synthesis, groups.len());
        report.complete(RunStage::Synthesize);

        let tree = HierarchyBuilder::new(&template).build(&groups, &synthesis.blocks)?;
        report.pages = tree.len();
        report.deferred_pages = tree.deferred_count();
        report.complete(RunStage::Hierarchy);
        self.cancel.check(RunStage::Hierarchy.as_str())?;

        let publisher = Publisher::from_config(
            self.platform.clone(),
            PublishJournal::new(self.db.clone(), root),
            &self.config.publish,
            timeouts.platform,
        );
        let live = publisher.snapshot().await?;
        report.complete(RunStage::Snapshot);

        let plan = reconcile(&tree, &state.records, &live);
        report.record_plan(&plan);
        report.complete(RunStage::Reconcile);

        info!(
            plan_id = %plan.plan_id,
            pages = report.pages,
            create = report.plan.create,
            update = report.plan.update,
            conflicts = report.plan.conflict,
            orphans = report.plan.orphan_archive,
            "Plan ready"
        );

        Ok(Prepared {
            graph,
            plan,
            publisher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageKey;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/shop")).unwrap();
        fs::write(
            dir.path().join("src/shop/orders.rs"),
            "pub struct Order {\n    pub id: u64,\n}\n\npub fn total(order: &Order) -> u64 {\n    order.id\n}\n",
        )
        .unwrap();
        ConfigLoader::init_project(dir.path(), Some("demo")).unwrap();
        dir
    }

    fn pipeline(dir: &TempDir) -> SyncPipeline {
        SyncPipeline::open(dir.path(), Config::default()).unwrap()
    }

    fn wiki_pages(dir: &TempDir) -> Vec<(String, String)> {
        let path = dir.path().join("wiki/docs/index.json");
        if !path.exists() {
            return Vec::new();
        }
        let index = fs::read_to_string(path).unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        index["pages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| {
                (
                    p["page_key"].as_str().unwrap().to_string(),
                    p["file"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_open_requires_initialized_project() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SyncPipeline::open(dir.path(), Config::default()),
            Err(SyncError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_first_sync_publishes_and_second_is_noop() {
        let dir = project();

        let first = pipeline(&dir).sync().await.unwrap();
        assert!(first.entities > 0);
        assert!(first.plan.create > 0);
        assert_eq!(first.publish.applied, first.plan.create);
        assert_eq!(first.state_version, Some(1));
        assert_eq!(first.exit_code(), 0);
        assert_eq!(wiki_pages(&dir).len(), first.plan.create);

        let second = pipeline(&dir).sync().await.unwrap();
        assert_eq!(second.plan.create, 0);
        assert_eq!(second.plan.update, 0);
        assert_eq!(second.publish.applied, 0);
        assert_eq!(second.changes.changed, 0);
        assert_eq!(second.synthesis.generated, 0);
        assert_eq!(second.state_version, Some(2));

        let latest: Option<RunReport> = RunHistory::new(pipeline(&dir).database())
            .latest("docs")
            .unwrap();
        assert_eq!(latest.unwrap().state_version, Some(2));
    }

    #[tokio::test]
    async fn test_plan_does_not_publish_or_commit() {
        let dir = project();
        let pipeline = pipeline(&dir);

        let preview = pipeline.plan().await.unwrap();
        assert!(preview.report.plan_only);
        assert!(preview.plan.counts().create > 0);
        assert!(wiki_pages(&dir).is_empty());

        let state = StateStore::new(pipeline.database()).load("docs").unwrap();
        assert_eq!(state.version, 0);
        assert!(state.records.is_empty());
    }

    #[tokio::test]
    async fn test_manual_edit_is_left_alone() {
        let dir = project();
        pipeline(&dir).sync().await.unwrap();

        let (key, file) = wiki_pages(&dir).into_iter().next().unwrap();
        let path = dir.path().join("wiki/docs").join(&file);
        fs::write(&path, "# Rewritten by hand\n").unwrap();

        let preview = pipeline(&dir).plan().await.unwrap();
        let op = preview.plan.get(&PageKey::from(key.as_str())).unwrap();
        assert!(op.manual_edit);
        assert!(preview.plan.is_noop());

        pipeline(&dir).sync().await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Rewritten by hand\n");
    }

    #[tokio::test]
    async fn test_held_lock_rejects_second_sync() {
        let dir = project();
        let _held = RootLock::acquire(&ConfigLoader::project_dir(dir.path()), "docs").unwrap();

        assert!(matches!(
            pipeline(&dir).sync().await,
            Err(SyncError::Locked { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing() {
        let dir = project();
        let pipeline = pipeline(&dir);
        pipeline.cancel_flag().cancel();

        assert!(matches!(
            pipeline.sync().await,
            Err(SyncError::Cancelled { .. })
        ));
        let state = StateStore::new(pipeline.database()).load("docs").unwrap();
        assert_eq!(state.version, 0);
    }
}
