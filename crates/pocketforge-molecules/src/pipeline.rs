//! Batched candidate generation for one target.
//!
//! Each batch runs through the same stages:
//!   1. Generate the conditioning heatmap around the active site
//!   2. Dispatch the sampler and await its batch
//!   3. Parse and fingerprint the returned notations
//!   4. Screen them against the target's reference library
//!   5. Emit the survivors to the candidate sink
//!
//! Pause and terminate are cooperative. Both are honoured at the checkpoint
//! before each batch, and terminate is also checked after fingerprinting and
//! after filtering. A sampler call already in flight always completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::diffusion::NoiseSchedule;
use crate::fingerprint::fingerprint_all;
use crate::heatmap::HeatmapGenerator;
use crate::ligand::Molecule;
use crate::pocket::PocketResult;
use crate::reference::ReferenceLibrary;
use crate::sampler::{CandidateSink, EmittedBatch, MoleculeSampler, SampleRequest};
use crate::scoring::{ScoredCandidate, SimilarityFilter};
use crate::smiles::MolecularGraph;
use crate::structure::AtomStore;
use pocketforge_common::{PeriodicTable, PocketForgeConfig, Result};

// ── States & control ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    GeneratingHeatmap,
    Sampling,
    Fingerprinting,
    Filtering,
    Emitting,
    Paused,
    Done,
    Terminated,
}

impl BatchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchState::Done | BatchState::Terminated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Terminate,
}

/// Cloneable remote control for a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    control: Arc<watch::Sender<Control>>,
    state: watch::Receiver<BatchState>,
}

impl OrchestratorHandle {
    /// Takes effect at the next batch boundary.
    pub fn pause(&self) {
        self.control.send_if_modified(|c| {
            if *c == Control::Run {
                *c = Control::Pause;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.control.send_if_modified(|c| {
            if *c == Control::Pause {
                *c = Control::Run;
                true
            } else {
                false
            }
        });
    }

    /// Irreversible; wins over a pending pause.
    pub fn terminate(&self) {
        self.control.send_replace(Control::Terminate);
    }

    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }
}

// ── Progress & summary ───────────────────────────────────────────────────────

/// Progress event emitted on every state change (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    pub run_id: Uuid,
    pub batch: usize,
    pub state: BatchState,
    pub message: String,
    pub candidates_emitted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub target: String,
    pub batches_completed: usize,
    pub total_batches: usize,
    pub final_state: BatchState,
    pub candidates: usize,
    pub parse_failures: usize,
    /// Notations dropped for being shorter than the configured minimum
    pub too_short: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ── Target ───────────────────────────────────────────────────────────────────

/// Everything the orchestrator knows about the protein being targeted.
pub struct TargetContext {
    pub name: String,
    pub store: Arc<AtomStore>,
    pub library: Arc<ReferenceLibrary>,
    pub table: PeriodicTable,
    /// When set, the heatmap is centred on this pocket instead of the
    /// configured active site.
    pub pocket: Option<PocketResult>,
}

impl TargetContext {
    pub fn new(name: &str, store: Arc<AtomStore>, library: Arc<ReferenceLibrary>) -> Self {
        Self {
            name: name.to_string(),
            store,
            library,
            table: PeriodicTable::standard(),
            pocket: None,
        }
    }

    pub fn with_pocket(mut self, pocket: PocketResult) -> Self {
        self.pocket = Some(pocket);
        self
    }

    pub fn with_table(mut self, table: PeriodicTable) -> Self {
        self.table = table;
        self
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

pub struct BatchOrchestrator {
    config: PocketForgeConfig,
    target: TargetContext,
    sampler: Arc<dyn MoleculeSampler>,
    sink: Arc<dyn CandidateSink>,
    control: Arc<watch::Sender<Control>>,
    state: watch::Sender<BatchState>,
    progress_tx: broadcast::Sender<BatchProgress>,
}

/// Per-run counters carried between batches.
struct RunCounters {
    run_id: Uuid,
    batches_completed: usize,
    candidates: usize,
    parse_failures: usize,
    too_short: usize,
}

/// A notation that parsed, with its position in the sampler batch.
struct ParsedCandidate {
    position: usize,
    notation: String,
    graph: MolecularGraph,
}

enum BatchOutcome {
    Completed,
    Terminated,
}

impl BatchOrchestrator {
    pub fn new(
        config: PocketForgeConfig,
        target: TargetContext,
        sampler: Arc<dyn MoleculeSampler>,
        sink: Arc<dyn CandidateSink>,
    ) -> Self {
        let (control, _) = watch::channel(Control::Run);
        let (state, _) = watch::channel(BatchState::Idle);
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            config,
            target,
            sampler,
            sink,
            control: Arc::new(control),
            state,
            progress_tx,
        }
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            control: Arc::clone(&self.control),
            state: self.state.subscribe(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// Run every configured batch, or until terminated.
    #[instrument(skip(self), fields(target = %self.target.name))]
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut counters = RunCounters {
            run_id: Uuid::new_v4(),
            batches_completed: 0,
            candidates: 0,
            parse_failures: 0,
            too_short: 0,
        };
        let total_batches = self.config.sampling.total_batches;

        let schedule = NoiseSchedule::linear(
            self.config.effective_timesteps(),
            self.config.schedule.beta_start,
            self.config.schedule.beta_end,
        )?;

        let mut heatmap_config = self.config.effective_heatmap();
        if let Some(pocket) = &self.target.pocket {
            heatmap_config = heatmap_config.centered_on(pocket.center);
        }
        let heatmaps = HeatmapGenerator::new(heatmap_config);

        info!(
            run_id = %counters.run_id,
            total_batches,
            timesteps = schedule.len(),
            "Starting candidate generation"
        );

        let mut control = self.control.subscribe();
        let mut final_state = BatchState::Done;

        for batch in 0..total_batches {
            if !self.checkpoint(&mut control, &counters, batch).await {
                final_state = BatchState::Terminated;
                break;
            }

            match self.run_batch(batch, &schedule, &heatmaps, &control, &mut counters).await? {
                BatchOutcome::Completed => counters.batches_completed += 1,
                BatchOutcome::Terminated => {
                    final_state = BatchState::Terminated;
                    break;
                }
            }
        }

        let message = match final_state {
            BatchState::Terminated => "Run terminated",
            _ => "Run complete",
        };
        self.transition(final_state, &counters, counters.batches_completed, message);

        let summary = RunSummary {
            run_id: counters.run_id,
            target: self.target.name.clone(),
            batches_completed: counters.batches_completed,
            total_batches,
            final_state,
            candidates: counters.candidates,
            parse_failures: counters.parse_failures,
            too_short: counters.too_short,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            batches = summary.batches_completed,
            candidates = summary.candidates,
            parse_failures = summary.parse_failures,
            duration_ms = summary.duration_ms(),
            state = ?summary.final_state,
            "Candidate generation finished"
        );
        Ok(summary)
    }

    /// Returns false when the run must stop. Pause waits here until resumed.
    async fn checkpoint(&self, control: &mut watch::Receiver<Control>, counters: &RunCounters, batch: usize) -> bool {
        loop {
            let current = *control.borrow_and_update();
            match current {
                Control::Run => return true,
                Control::Terminate => return false,
                Control::Pause => {
                    if self.state() != BatchState::Paused {
                        self.transition(BatchState::Paused, counters, batch, "Paused at batch boundary");
                    }
                    if control.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn terminate_requested(&self, control: &watch::Receiver<Control>) -> bool {
        *control.borrow() == Control::Terminate
    }

    async fn run_batch(
        &self,
        batch: usize,
        schedule: &NoiseSchedule,
        heatmaps: &HeatmapGenerator,
        control: &watch::Receiver<Control>,
        counters: &mut RunCounters,
    ) -> Result<BatchOutcome> {
        let sampling = &self.config.sampling;
        let library = &self.target.library;

        // ── Heatmap ──
        self.transition(BatchState::GeneratingHeatmap, counters, batch, "Generating heatmap");
        let heatmap = heatmaps.generate(&self.target.store)?;

        // ── Sampling ──
        self.transition(BatchState::Sampling, counters, batch, "Awaiting sampler");
        let request = SampleRequest {
            batch,
            schedule,
            heatmap: &heatmap,
            batch_size: self.config.effective_batch_size(),
            max_atoms: sampling.max_atoms,
            min_feature_score: sampling.min_feature_score,
            heatmap_weight: sampling.heatmap_weight,
        };
        let sampled = self.sampler.sample(request).await.map_err(|e| {
            error!(batch, "Sampler failed: {}", e);
            e
        })?;
        debug!(batch, molecules = sampled.len(), "Sampler returned");

        // ── Fingerprinting ──
        self.transition(BatchState::Fingerprinting, counters, batch, "Fingerprinting candidates");
        let mut parsed = Vec::with_capacity(sampled.len());
        for (position, notation) in sampled.notations.iter().enumerate() {
            if notation.trim().chars().count() < sampling.min_notation_length {
                counters.too_short += 1;
                continue;
            }
            match MolecularGraph::parse(notation, &self.target.table) {
                Ok(graph) => parsed.push(ParsedCandidate {
                    position,
                    notation: notation.trim().to_string(),
                    graph,
                }),
                Err(e) if e.is_recoverable() => {
                    warn!(batch, "Dropping candidate: {}", e);
                    counters.parse_failures += 1;
                }
                Err(e) => return Err(e),
            }
        }
        let graphs: Vec<MolecularGraph> = parsed.iter().map(|p| p.graph.clone()).collect();
        let fingerprints = fingerprint_all(&library.fp_kind, &graphs, library.fp_length, &self.target.table);

        if self.terminate_requested(control) {
            return Ok(BatchOutcome::Terminated);
        }

        // ── Filtering ──
        self.transition(BatchState::Filtering, counters, batch, "Screening against reference library");
        let hits = SimilarityFilter::from_config(&self.config.similarity).filter(&fingerprints, library);

        if self.terminate_requested(control) {
            return Ok(BatchOutcome::Terminated);
        }

        // ── Emitting ──
        self.transition(BatchState::Emitting, counters, batch, "Emitting candidates");
        let candidates: Vec<ScoredCandidate> = hits
            .iter()
            .map(|hit| {
                let p = &parsed[hit.index];
                ScoredCandidate {
                    molecule: Molecule::new(&p.notation, "sampler").with_graph(&p.graph),
                    similarity: hit.similarity,
                    batch,
                    match_score: sampled.match_score(p.position),
                }
            })
            .collect();
        counters.candidates += candidates.len();

        info!(
            batch,
            sampled = sampled.len(),
            parsed = parsed.len(),
            kept = candidates.len(),
            "Batch screened"
        );
        self.sink
            .emit(&EmittedBatch {
                run_id: counters.run_id,
                target: self.target.name.clone(),
                batch,
                candidates,
            })
            .await?;

        Ok(BatchOutcome::Completed)
    }

    fn transition(&self, state: BatchState, counters: &RunCounters, batch: usize, message: &str) {
        self.state.send_replace(state);
        // No subscribers is fine
        let _ = self.progress_tx.send(BatchProgress {
            run_id: counters.run_id,
            batch,
            state,
            message: message.to_string(),
            candidates_emitted: counters.candidates,
        });
    }
}
