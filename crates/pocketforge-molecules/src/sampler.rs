//! Boundaries to the generative sampler and to the downstream consumer.
//!
//! The sampler runs outside this crate (on a GPU in production); the
//! orchestrator only prepares its inputs and awaits one batch at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::diffusion::NoiseSchedule;
use crate::heatmap::Heatmap;
use crate::scoring::ScoredCandidate;
use pocketforge_common::{PocketForgeError, Result};

// ── Sampler ──────────────────────────────────────────────────────────────────

/// Inputs for one sampling dispatch.
#[derive(Debug, Clone, Copy)]
pub struct SampleRequest<'a> {
    pub batch: usize,
    pub schedule: &'a NoiseSchedule,
    pub heatmap: &'a Heatmap,
    pub batch_size: usize,
    pub max_atoms: usize,
    pub min_feature_score: f64,
    /// Weight of the heatmap guidance relative to unconditional sampling
    pub heatmap_weight: f64,
}

/// Raw sampler output. `indices` and `match_scores` are parallel to `notations`
/// when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    pub notations: Vec<String>,
    #[serde(default)]
    pub indices: Vec<usize>,
    #[serde(default)]
    pub match_scores: Vec<f64>,
}

impl SampleBatch {
    pub fn from_notations<S: Into<String>>(notations: impl IntoIterator<Item = S>) -> Self {
        let notations: Vec<String> = notations.into_iter().map(Into::into).collect();
        Self {
            indices: (0..notations.len()).collect(),
            notations,
            match_scores: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.notations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notations.is_empty()
    }

    pub fn match_score(&self, position: usize) -> Option<f64> {
        self.match_scores.get(position).copied()
    }

    /// Keep the first `n` entries of every parallel column.
    pub fn truncate(&mut self, n: usize) {
        self.notations.truncate(n);
        self.indices.truncate(n);
        self.match_scores.truncate(n);
    }
}

#[async_trait]
pub trait MoleculeSampler: Send + Sync {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<SampleBatch>;
}

/// Replays pre-recorded batches in order, wrapping around at the end.
pub struct ReplaySampler {
    batches: Vec<SampleBatch>,
    cursor: AtomicUsize,
}

impl ReplaySampler {
    pub fn new(batches: Vec<SampleBatch>) -> Self {
        Self {
            batches,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn from_notations(batches: Vec<Vec<String>>) -> Self {
        Self::new(batches.into_iter().map(SampleBatch::from_notations).collect())
    }

    /// Number of `sample` calls served so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoleculeSampler for ReplaySampler {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<SampleBatch> {
        if self.batches.is_empty() {
            return Err(PocketForgeError::InvalidInput("replay sampler has no recorded batches".into()));
        }
        let call = self.cursor.fetch_add(1, Ordering::SeqCst);
        let mut batch = self.batches[call % self.batches.len()].clone();
        batch.truncate(request.batch_size);
        debug!(batch = request.batch, molecules = batch.len(), "Replayed sample batch");
        Ok(batch)
    }
}

// ── Candidate sink ───────────────────────────────────────────────────────────

/// Survivors of one batch, handed to the consumer.
#[derive(Debug, Clone, Serialize)]
pub struct EmittedBatch {
    pub run_id: Uuid,
    pub target: String,
    pub batch: usize,
    pub candidates: Vec<ScoredCandidate>,
}

#[async_trait]
pub trait CandidateSink: Send + Sync {
    async fn emit(&self, batch: &EmittedBatch) -> Result<()>;
}

/// Keeps every emitted batch in memory.
#[derive(Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<EmittedBatch>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn batches(&self) -> Vec<EmittedBatch> {
        self.batches.lock().await.clone()
    }

    pub async fn candidates(&self) -> Vec<ScoredCandidate> {
        self.batches
            .lock()
            .await
            .iter()
            .flat_map(|b| b.candidates.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl CandidateSink for CollectingSink {
    async fn emit(&self, batch: &EmittedBatch) -> Result<()> {
        self.batches.lock().await.push(batch.clone());
        Ok(())
    }
}
