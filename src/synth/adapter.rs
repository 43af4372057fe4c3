//! Content Synthesizer Adapter
//!
//! Wraps a [`ContentGenerator`] with:
//! - a generation fingerprint over every input of a group, so identical
//!   inputs are served from the [`BlockCache`] without calling out
//! - bounded retries with backoff and a per-call timeout
//! - bounded parallelism across groups with per-group failure isolation
//!
//! A group whose generation fails after the retry bound is reported as a
//! [`GenerationFailure`] and simply has no block; the hierarchy builder turns
//! it into a deferred page.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cache::BlockCache;
use super::generator::{GenerationRequest, SharedGenerator};
use crate::config::StageConfig;
use crate::constants::synthesis as defaults;
use crate::hierarchy::EntityGroup;
use crate::model::{ContentBlock, EntityGraph};
use crate::types::{EntityId, Fingerprinter, PageKey, Result, SyncError};
use crate::util::{CancelFlag, RetryPolicy, retry_call, with_timeout};

/// A group that produced no block this run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationFailure {
    pub page_key: PageKey,
    pub group_key: String,
    pub reason: String,
    pub attempts: u32,
}

/// Result of synthesizing every group of a run
#[derive(Debug, Default)]
pub struct SynthesisOutcome {
    /// Blocks keyed by group page key
    pub blocks: BTreeMap<PageKey, ContentBlock>,
    pub failures: Vec<GenerationFailure>,
    /// Groups that called the generator
    pub generated: usize,
    /// Groups served from the cache
    pub cached: usize,
    /// Groups with a member in the regeneration set
    pub stale: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockSource {
    Cache,
    Generated,
}

pub struct SynthesizerAdapter {
    generator: SharedGenerator,
    cache: Arc<BlockCache>,
    retry: RetryPolicy,
    timeout: Duration,
    concurrency: usize,
}

impl SynthesizerAdapter {
    pub fn new(generator: SharedGenerator, cache: Arc<BlockCache>) -> Self {
        Self {
            generator,
            cache,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(defaults::CALL_TIMEOUT_SECS),
            concurrency: defaults::DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_config(
        generator: SharedGenerator,
        cache: Arc<BlockCache>,
        stage: &StageConfig,
        timeout: Duration,
    ) -> Self {
        Self::new(generator, cache)
            .with_retry(stage.retry_policy())
            .with_timeout(timeout)
            .with_concurrency(stage.concurrency)
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

    /// Hash of every input that shapes the group's body.
    ///
    /// Covers the model, doc type, page placement, each member's content and
    /// relationship fingerprints, and the content fingerprint of every
    /// relationship target outside the group (one hop of context).
    pub fn generation_fingerprint(&self, group: &EntityGroup, graph: &EntityGraph) -> String {
        let mut context: BTreeSet<&EntityId> = BTreeSet::new();
        let members: Vec<String> = group
            .entity_ids
            .iter()
            .map(|id| match graph.get(id) {
                Some(entity) => {
                    context.extend(
                        entity
                            .relationships
                            .iter()
                            .map(|r| &r.target)
                            .filter(|t| !group.entity_ids.contains(*t)),
                    );
                    format!(
                        "{}|{}|{}",
                        id,
                        entity.content_fingerprint,
                        entity.relationship_fingerprint()
                    )
                }
                None => format!("{}|-", id),
            })
            .collect();

        let context = context.into_iter().map(|target| {
            let fp = graph
                .get(target)
                .map(|e| e.content_fingerprint.as_str())
                .unwrap_or("-");
            format!("{}|{}", target, fp)
        });

        Fingerprinter::domain("generation")
            .field(self.generator.model())
            .field(group.doc_type.as_str())
            .field(group.page_key.as_str())
            .field(&group.title)
            .field(&group.group_key)
            .fields(members)
            .fields(context)
            .finish()
    }

    /// Block for one group. Idempotent per generation fingerprint: a cached
    /// block is returned without invoking the generator.
    pub async fn synthesize(&self, group: &EntityGroup, graph: &EntityGraph) -> Result<ContentBlock> {
        self.resolve(group, graph).await.map(|(block, _)| block)
    }

    async fn resolve(
        &self,
        group: &EntityGroup,
        graph: &EntityGraph,
    ) -> Result<(ContentBlock, BlockSource)> {
        let fingerprint = self.generation_fingerprint(group, graph);

        match self.cache.get(&fingerprint) {
            Ok(Some(block)) => return Ok((block, BlockSource::Cache)),
            Ok(None) => {}
            Err(e) => warn!(page_key = %group.page_key, error = %e, "Block cache read failed"),
        }

        let request = GenerationRequest::from_group(group, graph);
        let operation = format!("generate {}", group.page_key);
        let attempted = retry_call(&self.retry, &operation, || {
            with_timeout(self.timeout, self.generator.generate(&request), &operation)
        })
        .await;

        let body = match attempted.result {
            Ok(body) if !body.trim().is_empty() => body,
            Ok(_) => {
                return Err(SyncError::GenerationFailed {
                    group: group.group_key.clone(),
                    reason: "generator returned an empty body".to_string(),
                    attempts: attempted.attempts,
                });
            }
            Err(e) => {
                return Err(SyncError::GenerationFailed {
                    group: group.group_key.clone(),
                    reason: e.to_string(),
                    attempts: attempted.attempts,
                });
            }
        };

        let block = ContentBlock {
            source_entity_ids: group.entity_ids.clone(),
            doc_type: group.doc_type,
            body,
            generation_fingerprint: fingerprint,
        };

        if let Err(e) = self.cache.put(&group.group_key, &block) {
            warn!(page_key = %group.page_key, error = %e, "Block cache write failed");
        }

        Ok((block, BlockSource::Generated))
    }

    /// Synthesize every group with bounded parallelism.
    ///
    /// Which groups call the generator is decided by the generation
    /// fingerprint alone. It covers the members and their one-hop context,
    /// so a cache miss happens exactly for groups touching `regeneration`
    /// (or whose template inputs changed). `regeneration` is only used to
    /// report `stale`.
    ///
    /// Failures are collected per group and never abort the batch. Only
    /// cancellation ends the stage with an error.
    #[instrument(skip_all, fields(groups = groups.len()))]
    pub async fn synthesize_all(
        &self,
        groups: &[EntityGroup],
        graph: &EntityGraph,
        regeneration: &BTreeSet<EntityId>,
        cancel: &CancelFlag,
    ) -> Result<SynthesisOutcome> {
        let mut outcome = SynthesisOutcome {
            stale: groups
                .iter()
                .filter(|g| g.entity_ids.iter().any(|id| regeneration.contains(id)))
                .count(),
            ..SynthesisOutcome::default()
        };

        let mut stream = futures::stream::iter(groups)
            .map(|group| async move {
                if cancel.is_cancelled() {
                    return (group, None);
                }
                (group, Some(self.resolve(group, graph).await))
            })
            .buffer_unordered(self.concurrency);

        while let Some((group, result)) = stream.next().await {
            match result {
                None => {}
                Some(Ok((block, source))) => {
                    match source {
                        BlockSource::Cache => outcome.cached += 1,
                        BlockSource::Generated => outcome.generated += 1,
                    }
                    outcome.blocks.insert(group.page_key.clone(), block);
                }
                Some(Err(e)) => {
                    warn!(page_key = %group.page_key, error = %e, "Content generation failed");
                    let attempts = match &e {
                        SyncError::GenerationFailed { attempts, .. } => *attempts,
                        _ => 0,
                    };
                    outcome.failures.push(GenerationFailure {
                        page_key: group.page_key.clone(),
                        group_key: group.group_key.clone(),
                        reason: e.to_string(),
                        attempts,
                    });
                }
            }
        }

        cancel.check("synthesize")?;

        outcome.failures.sort_by(|a, b| a.page_key.cmp(&b.page_key));
        if outcome.generated > 0 || !outcome.failures.is_empty() {
            info!(
                generated = outcome.generated,
                cached = outcome.cached,
                failed = outcome.failures.len(),
                "Synthesis complete"
            );
        } else {
            debug!(cached = outcome.cached, "All blocks served from cache");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ChangeDetector;
    use crate::model::{AnalysisArtifact, ArtifactBatch, DocType, EntityGraphBuilder};
    use crate::synth::generator::ContentGenerator;
    use crate::types::{ErrorCategory, ExternalError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that fails a scripted number of times per group
    #[derive(Default)]
    struct ScriptedGenerator {
        calls: AtomicUsize,
        transient_failures: Mutex<HashMap<String, usize>>,
        always_fail: BTreeSet<String>,
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-v1"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.always_fail.contains(&request.group_key) {
                return Err(ExternalError::new(ErrorCategory::Transient, "overloaded").into());
            }
            let mut pending = self.transient_failures.lock().unwrap();
            if let Some(left) = pending.get_mut(&request.group_key)
                && *left > 0
            {
                *left -= 1;
                return Err(ExternalError::new(ErrorCategory::RateLimit, "slow down").into());
            }
            Ok(format!("# {}\n", request.title))
        }
    }

    fn graph(order_hash: &str) -> EntityGraph {
        let mut builder = EntityGraphBuilder::new();
        builder.add_batch(&ArtifactBatch {
            origin: "test".into(),
            artifacts: vec![
                AnalysisArtifact::new("class", "shop::Order", order_hash),
                AnalysisArtifact::new("class", "billing::Invoice", "i1")
                    .with_relationship("references", "class:shop::Order"),
                AnalysisArtifact::new("class", "users::User", "u1"),
            ],
        });
        builder.build().graph
    }

    fn group(key: &str, id: &str) -> EntityGroup {
        EntityGroup {
            page_key: PageKey::from(format!("API/{}", key)),
            title: key.to_string(),
            rule_index: 0,
            group_key: key.to_string(),
            doc_type: DocType::ApiReference,
            entity_ids: BTreeSet::from([EntityId::from(id)]),
        }
    }

    fn groups() -> Vec<EntityGroup> {
        vec![
            group("shop", "class:shop::Order"),
            group("billing", "class:billing::Invoice"),
            group("users", "class:users::User"),
        ]
    }

    fn adapter(generator: Arc<ScriptedGenerator>, cache: Arc<BlockCache>) -> SynthesizerAdapter {
        SynthesizerAdapter::new(generator, cache)
            .with_retry(RetryPolicy::immediate(2))
            .with_concurrency(2)
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let generator = Arc::new(ScriptedGenerator::default());
        let cache = Arc::new(BlockCache::in_memory());
        let adapter = adapter(generator.clone(), cache);
        let graph = graph("o1");

        let first = adapter
            .synthesize_all(&groups(), &graph, &BTreeSet::new(), &CancelFlag::new())
            .await
            .unwrap();
        let second = adapter
            .synthesize_all(&groups(), &graph, &BTreeSet::new(), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(first.generated, 3);
        assert_eq!(second.cached, 3);
        assert_eq!(second.generated, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(first.blocks, second.blocks);
    }

    #[tokio::test]
    async fn test_change_regenerates_group_and_one_hop_dependents() {
        let generator = Arc::new(ScriptedGenerator::default());
        let cache = Arc::new(BlockCache::in_memory());
        let adapter = adapter(generator.clone(), cache);

        let before = graph("o1");
        adapter
            .synthesize_all(&groups(), &before, &BTreeSet::new(), &CancelFlag::new())
            .await
            .unwrap();

        let after = graph("o2");
        let previous = ChangeDetector::snapshot(&before);
        let changes = ChangeDetector::detect(&after, &previous);
        let regeneration = ChangeDetector::regeneration_set(&after, &previous, &changes);
        let outcome = adapter
            .synthesize_all(&groups(), &after, &regeneration, &CancelFlag::new())
            .await
            .unwrap();

        // shop changed; billing references it; users is untouched
        assert_eq!(outcome.generated, 2);
        assert_eq!(outcome.cached, 1);
        assert_eq!(outcome.stale, outcome.generated);
        assert!(outcome.blocks.contains_key(&PageKey::from("API/users")));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let generator = Arc::new(ScriptedGenerator::default());
        generator
            .transient_failures
            .lock()
            .unwrap()
            .insert("shop".to_string(), 2);
        let adapter = adapter(generator.clone(), Arc::new(BlockCache::in_memory()));

        let block = adapter
            .synthesize(&group("shop", "class:shop::Order"), &graph("o1"))
            .await
            .unwrap();

        assert_eq!(block.body, "# shop\n");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_group_does_not_block_others() {
        let generator = Arc::new(ScriptedGenerator {
            always_fail: BTreeSet::from(["billing".to_string()]),
            ..ScriptedGenerator::default()
        });
        let adapter = adapter(generator, Arc::new(BlockCache::in_memory()));
        let graph = graph("o1");
        let regeneration = BTreeSet::from([EntityId::from("class:billing::Invoice")]);

        let outcome = adapter
            .synthesize_all(&groups(), &graph, &regeneration, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.blocks.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].group_key, "billing");
        assert_eq!(outcome.failures[0].attempts, 3);
        assert_eq!(outcome.stale, 1);
        assert!(!outcome.blocks.contains_key(&PageKey::from("API/billing")));
    }

    #[tokio::test]
    async fn test_cancelled_stage_returns_error() {
        let generator = Arc::new(ScriptedGenerator::default());
        let adapter = adapter(generator.clone(), Arc::new(BlockCache::in_memory()));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = adapter
            .synthesize_all(&groups(), &graph("o1"), &BTreeSet::new(), &cancel)
            .await;

        assert!(matches!(result, Err(SyncError::Cancelled { .. })));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let adapter = adapter(
            Arc::new(ScriptedGenerator::default()),
            Arc::new(BlockCache::in_memory()),
        );
        let shop = group("shop", "class:shop::Order");

        assert_eq!(
            adapter.generation_fingerprint(&shop, &graph("o1")),
            adapter.generation_fingerprint(&shop, &graph("o1"))
        );
        assert_ne!(
            adapter.generation_fingerprint(&shop, &graph("o1")),
            adapter.generation_fingerprint(&shop, &graph("o2"))
        );

        let mut architecture = shop.clone();
        architecture.doc_type = DocType::Architecture;
        assert_ne!(
            adapter.generation_fingerprint(&shop, &graph("o1")),
            adapter.generation_fingerprint(&architecture, &graph("o1"))
        );
    }
}
