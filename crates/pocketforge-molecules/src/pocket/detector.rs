//! End-to-end pocket detection: spheres, filter, clustering, scoring.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::alpha_sphere::AlphaSphereGenerator;
use super::dbscan::Dbscan;
use super::filter::SphereFilter;
use super::scorer::{PocketResult, PocketScorer};
use crate::structure::AtomStore;
use pocketforge_common::{PocketConfig, PocketForgeError, Result};

/// Pockets plus the counts of each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub pockets: Vec<PocketResult>,
    pub spheres_generated: usize,
    pub spheres_kept: usize,
    pub clusters: usize,
    pub noise: usize,
    pub truncated: bool,
    pub duration_ms: u64,
}

impl DetectionReport {
    pub fn best(&self) -> Option<&PocketResult> {
        self.pockets.first()
    }
}

pub struct PocketDetector {
    config: PocketConfig,
}

impl PocketDetector {
    pub fn new(config: PocketConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, store), fields(atoms = store.len()))]
    pub fn detect(&self, store: &AtomStore) -> Result<DetectionReport> {
        let t0 = std::time::Instant::now();

        let generation = AlphaSphereGenerator::new(&self.config).generate(store)?;
        let kept = SphereFilter::from_config(&self.config).apply(&generation.spheres);
        if kept.is_empty() {
            warn!("No alpha spheres survived filtering");
        }

        let clustering = Dbscan::from_config(&self.config).cluster(&kept);
        let pockets = PocketScorer::new(&self.config).score(&clustering, &kept, store)?;

        let report = DetectionReport {
            spheres_generated: generation.spheres.len(),
            spheres_kept: kept.len(),
            clusters: clustering.clusters.len(),
            noise: clustering.noise_count(),
            truncated: generation.truncated,
            pockets,
            duration_ms: t0.elapsed().as_millis() as u64,
        };
        info!(
            spheres = report.spheres_generated,
            kept = report.spheres_kept,
            clusters = report.clusters,
            pockets = report.pockets.len(),
            duration_ms = report.duration_ms,
            "Pocket detection complete"
        );
        Ok(report)
    }

    /// Run detection on the blocking pool.
    pub async fn detect_async(self: Arc<Self>, store: Arc<AtomStore>) -> Result<DetectionReport> {
        tokio::task::spawn_blocking(move || self.detect(&store))
            .await
            .map_err(|e| PocketForgeError::Other(anyhow::anyhow!("pocket detection task failed: {e}")))?
    }
}

/// Pharmacophore flags of a pocket, used when a target has no known actives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PocketFeatures {
    pub hydrophobic: bool,
    pub hbond_donor: bool,
    pub hbond_acceptor: bool,
}

impl PocketFeatures {
    pub fn from_pocket(pocket: &PocketResult) -> Self {
        Self {
            hydrophobic: pocket.hydrophobic_score >= 0.5,
            hbond_acceptor: pocket.polar_score >= 0.3,
            hbond_donor: pocket.polar_score >= 0.5,
        }
    }
}
