//! Batch orchestrator control flow: pause, resume, terminate, low-power mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use pocketforge_common::{FingerprintKind, PeriodicTable, PocketForgeConfig, Result};
use pocketforge_molecules::pipeline::{BatchOrchestrator, BatchProgress, BatchState, OrchestratorHandle, TargetContext};
use pocketforge_molecules::reference::ReferenceLibrary;
use pocketforge_molecules::sampler::{CollectingSink, MoleculeSampler, ReplaySampler, SampleBatch, SampleRequest};
use pocketforge_molecules::structure::AtomStore;
use pocketforge_test_utils::{init_tracing, octahedral_cage, REFERENCE_ACTIVES};
use tokio::sync::broadcast;
use tokio::time::timeout;

#[derive(Clone, Copy)]
enum Hook {
    None,
    PauseDuring(usize),
    TerminateDuring(usize),
}

/// Replays a fixed batch and pokes the orchestrator from inside a sampling call.
struct HookSampler {
    inner: ReplaySampler,
    hook: Hook,
    handle: OnceLock<OrchestratorHandle>,
    last_batch_size: AtomicUsize,
    last_timesteps: AtomicUsize,
    last_heatmap_size: AtomicUsize,
}

impl HookSampler {
    fn new(hook: Hook) -> Arc<Self> {
        let batch = SampleBatch {
            notations: vec![REFERENCE_ACTIVES[0].to_string(), "CCCCCC".into(), "C1CC".into(), "N#N".into()],
            indices: vec![0, 1, 2, 3],
            match_scores: vec![0.9, 0.2, 0.1, 0.4],
        };
        Arc::new(Self {
            inner: ReplaySampler::new(vec![batch]),
            hook,
            handle: OnceLock::new(),
            last_batch_size: AtomicUsize::new(0),
            last_timesteps: AtomicUsize::new(0),
            last_heatmap_size: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MoleculeSampler for HookSampler {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<SampleBatch> {
        self.last_batch_size.store(request.batch_size, Ordering::SeqCst);
        self.last_timesteps.store(request.schedule.len(), Ordering::SeqCst);
        self.last_heatmap_size.store(request.heatmap.size, Ordering::SeqCst);

        if let Some(handle) = self.handle.get() {
            match self.hook {
                Hook::PauseDuring(b) if b == request.batch => handle.pause(),
                Hook::TerminateDuring(b) if b == request.batch => handle.terminate(),
                _ => {}
            }
        }
        self.inner.sample(request).await
    }
}

fn config(total_batches: usize) -> PocketForgeConfig {
    let mut config = PocketForgeConfig::default();
    config.schedule.timesteps = 50;
    config.sampling.total_batches = total_batches;
    config.heatmap.size = 16;
    config
}

fn orchestrator(
    config: PocketForgeConfig,
    sampler: &Arc<HookSampler>,
    sink: &Arc<CollectingSink>,
) -> Arc<BatchOrchestrator> {
    let table = PeriodicTable::standard();
    let library = ReferenceLibrary::generate("CAGE", &REFERENCE_ACTIVES[..1], FingerprintKind::Ecfp4, 512, &table).unwrap();
    let target = TargetContext::new(
        "CAGE",
        Arc::new(AtomStore::new(octahedral_cage(5.0))),
        Arc::new(library),
    );
    let orch = Arc::new(BatchOrchestrator::new(config, target, sampler.clone(), sink.clone()));
    let _ = sampler.handle.set(orch.handle());
    orch
}

async fn wait_for(rx: &mut broadcast::Receiver<BatchProgress>, state: BatchState) -> BatchProgress {
    timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.state == state {
                return event;
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_pause_keeps_progress_until_resume() {
    init_tracing();
    let sampler = HookSampler::new(Hook::PauseDuring(0));
    let sink = Arc::new(CollectingSink::new());
    let orch = orchestrator(config(3), &sampler, &sink);
    let handle = orch.handle();
    let mut rx = orch.subscribe();

    let run = tokio::spawn({
        let orch = orch.clone();
        async move { orch.run().await }
    });

    let paused = wait_for(&mut rx, BatchState::Paused).await;
    assert_eq!(paused.batch, 1);
    assert_eq!(handle.state(), BatchState::Paused);
    assert_eq!(sink.batches().await.len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sampler.inner.calls(), 1);
    assert_eq!(handle.state(), BatchState::Paused);

    handle.resume();
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.final_state, BatchState::Done);
    assert_eq!(summary.batches_completed, 3);
    assert_eq!(sampler.inner.calls(), 3);

    let batches: Vec<usize> = sink.batches().await.iter().map(|b| b.batch).collect();
    assert_eq!(batches, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_terminate_during_sampling_stops_after_fingerprinting() {
    let sampler = HookSampler::new(Hook::TerminateDuring(1));
    let sink = Arc::new(CollectingSink::new());
    let orch = orchestrator(config(4), &sampler, &sink);
    let mut rx = orch.subscribe();

    let summary = orch.run().await.unwrap();
    assert_eq!(summary.final_state, BatchState::Terminated);
    assert_eq!(summary.batches_completed, 1);
    // the in-flight sampling call still completed
    assert_eq!(sampler.inner.calls(), 2);
    assert_eq!(sink.batches().await.len(), 1);

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        states.push((event.batch, event.state));
    }
    assert!(states.contains(&(1, BatchState::Fingerprinting)));
    assert!(!states.contains(&(1, BatchState::Filtering)));
    assert_eq!(states.last().map(|s| s.1), Some(BatchState::Terminated));
}

#[tokio::test]
async fn test_terminate_while_paused() {
    let sampler = HookSampler::new(Hook::PauseDuring(0));
    let sink = Arc::new(CollectingSink::new());
    let orch = orchestrator(config(5), &sampler, &sink);
    let handle = orch.handle();
    let mut rx = orch.subscribe();

    let run = tokio::spawn({
        let orch = orch.clone();
        async move { orch.run().await }
    });
    wait_for(&mut rx, BatchState::Paused).await;
    handle.terminate();

    let summary = timeout(Duration::from_secs(10), run).await.unwrap().unwrap().unwrap();
    assert_eq!(summary.final_state, BatchState::Terminated);
    assert_eq!(summary.batches_completed, 1);
    assert_eq!(sampler.inner.calls(), 1);
}

#[tokio::test]
async fn test_candidates_carry_sampler_scores() {
    let sampler = HookSampler::new(Hook::None);
    let sink = Arc::new(CollectingSink::new());
    let orch = orchestrator(config(1), &sampler, &sink);

    let summary = orch.run().await.unwrap();
    assert_eq!(summary.final_state, BatchState::Done);
    // "N#N" is exactly the minimum length and parses
    assert_eq!(summary.too_short, 0);
    assert_eq!(summary.parse_failures, 0);

    let candidates = sink.candidates().await;
    let active = candidates
        .iter()
        .find(|c| c.molecule.notation == REFERENCE_ACTIVES[0])
        .unwrap();
    assert_eq!(active.similarity, 1.0);
    assert_eq!(active.match_score, Some(0.9));
    assert_eq!(active.batch, 0);
    assert_eq!(active.molecule.source, "sampler");
    assert!(active.molecule.atom_count.is_some());
}

#[tokio::test]
async fn test_low_power_mode_shrinks_requests() {
    let sampler = HookSampler::new(Hook::None);
    let sink = Arc::new(CollectingSink::new());
    let mut cfg = config(1);
    cfg.schedule.timesteps = 1000;
    cfg.heatmap.size = 32;
    cfg.sampling.low_power_mode = true;
    let orch = orchestrator(cfg, &sampler, &sink);

    orch.run().await.unwrap();
    assert_eq!(sampler.last_batch_size.load(Ordering::SeqCst), 30);
    assert_eq!(sampler.last_timesteps.load(Ordering::SeqCst), 500);
    assert_eq!(sampler.last_heatmap_size.load(Ordering::SeqCst), 16);
}
