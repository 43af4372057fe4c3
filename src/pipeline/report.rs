//! Run report persisted to run history and printed by the CLI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalysisFailure;
use crate::model::SchemaViolation;
use crate::publish::{OperationResult, OperationStatus, PublishOutcome};
use crate::reconcile::{MutationPlan, PlanCounts, Reason};
use crate::synth::{GenerationFailure, SynthesisOutcome};
use crate::types::PageKey;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Lock,
    LoadState,
    Analyze,
    BuildGraph,
    Detect,
    Group,
    Synthesize,
    Hierarchy,
    Snapshot,
    Reconcile,
    Publish,
    Commit,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::LoadState => "load_state",
            Self::Analyze => "analyze",
            Self::BuildGraph => "build_graph",
            Self::Detect => "detect",
            Self::Group => "group",
            Self::Synthesize => "synthesize",
            Self::Hierarchy => "hierarchy",
            Self::Snapshot => "snapshot",
            Self::Reconcile => "reconcile",
            Self::Publish => "publish",
            Self::Commit => "commit",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeCounts {
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Changed plus one-hop dependents
    pub regenerate: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisCounts {
    pub groups: usize,
    pub generated: usize,
    pub cached: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishCounts {
    pub applied: usize,
    pub resumed: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictSummary {
    pub page_key: PageKey,
    pub reason: Reason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub root: String,
    pub plan_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed_stages: Vec<RunStage>,

    pub files_scanned: usize,
    pub analysis_failures: Vec<AnalysisFailure>,
    pub entities: usize,
    pub schema_violations: Vec<SchemaViolation>,
    pub changes: ChangeCounts,

    pub synthesis: SynthesisCounts,
    pub generation_failures: Vec<GenerationFailure>,

    pub pages: usize,
    pub deferred_pages: usize,
    pub plan: PlanCounts,
    pub conflicts: Vec<ConflictSummary>,

    /// Journal entries from an interrupted run folded in at start
    pub recovered_operations: usize,
    pub publish: PublishCounts,
    pub publish_failures: Vec<OperationResult>,

    /// State version after commit
    pub state_version: Option<u64>,
}

impl RunReport {
    pub fn new(root: &str, plan_only: bool) -> Self {
        Self {
            root: root.to_string(),
            plan_only,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn complete(&mut self, stage: RunStage) {
        self.completed_stages.push(stage);
    }

    pub fn record_synthesis(&mut self, outcome: &SynthesisOutcome, groups: usize) {
        self.synthesis = SynthesisCounts {
            groups,
            generated: outcome.generated,
            cached: outcome.cached,
            failed: outcome.failures.len(),
        };
        self.generation_failures = outcome.failures.clone();
    }

    pub fn record_plan(&mut self, plan: &MutationPlan) {
        self.plan_id = Some(plan.plan_id.clone());
        self.plan = plan.counts();
        self.conflicts = plan
            .conflicts()
            .map(|op| ConflictSummary {
                page_key: op.page_key.clone(),
                reason: op.reason,
            })
            .collect();
    }

    pub fn record_publish(&mut self, outcome: &PublishOutcome) {
        self.publish = PublishCounts {
            applied: outcome.count(OperationStatus::Applied),
            resumed: outcome.count(OperationStatus::AlreadyApplied),
            skipped: outcome.count(OperationStatus::Skipped),
            conflicts: outcome.count(OperationStatus::Conflict),
            failed: outcome.count(OperationStatus::Failed),
            cancelled: outcome.count(OperationStatus::Cancelled),
        };
        self.publish_failures = outcome.failures().cloned().collect();
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Some page failed to generate or publish, or needs manual resolution
    pub fn has_page_problems(&self) -> bool {
        !self.generation_failures.is_empty()
            || !self.publish_failures.is_empty()
            || !self.conflicts.is_empty()
    }

    /// Process exit code: 0 clean, 2 when any page failed or conflicted
    pub fn exit_code(&self) -> i32 {
        if self.has_page_problems() { 2 } else { 0 }
    }
}
