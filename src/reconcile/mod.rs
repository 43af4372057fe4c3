//! Reconciliation engine: candidate tree vs. published records vs. live pages

pub mod engine;
pub mod plan;
pub mod record;

pub use engine::reconcile;
pub use plan::{MutationPlan, OperationKind, PagePayload, PlanCounts, PlannedOperation, Reason};
pub use record::{LivePage, LiveRemoteSnapshot, RecordMap, RemotePageRecord};
