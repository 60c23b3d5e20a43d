//! Pocket descriptors and ranking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::alpha_sphere::AlphaSphere;
use super::dbscan::Clustering;
use crate::geometry::{distance, Vec3};
use crate::structure::AtomStore;
use pocketforge_common::{PocketConfig, PocketForgeError, Result};

/// A scored binding pocket, one per surviving cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketResult {
    /// Index of the source cluster
    pub id: usize,
    pub center: Vec3,
    /// Sum of member sphere volumes in Å³ (overlap not removed)
    pub volume: f64,
    pub alpha_sphere_count: usize,
    pub atom_count: usize,
    pub hydrophobic_score: f64,
    pub polar_score: f64,
    pub depth_score: f64,
    pub density: f64,
    pub composite_score: f64,
}

pub struct PocketScorer {
    min_volume: f64,
    max_pockets: usize,
}

impl PocketScorer {
    pub fn new(config: &PocketConfig) -> Self {
        Self {
            min_volume: config.min_pocket_volume,
            max_pockets: config.max_pockets,
        }
    }

    /// Score every cluster, drop small pockets and rank by composite score.
    pub fn score(&self, clustering: &Clustering, spheres: &[AlphaSphere], store: &AtomStore) -> Result<Vec<PocketResult>> {
        debug_assert_eq!(clustering.states.len(), spheres.len(), "clustering built from a different sphere set");
        if clustering.states.len() != spheres.len() {
            return Err(PocketForgeError::InvalidInput(format!(
                "clustering covers {} spheres but {} were given",
                clustering.states.len(),
                spheres.len()
            )));
        }

        let mut pockets: Vec<PocketResult> = clustering
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(id, members)| {
                let members: Vec<&AlphaSphere> = members.iter().map(|&i| &spheres[i]).collect();
                score_cluster(id, &members, store)
            })
            .filter(|p| p.volume >= self.min_volume)
            .collect();

        pockets.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        pockets.truncate(self.max_pockets);

        debug!("Scored {} pockets from {} clusters", pockets.len(), clustering.clusters.len());
        Ok(pockets)
    }
}

fn score_cluster(id: usize, members: &[&AlphaSphere], store: &AtomStore) -> PocketResult {
    let count = members.len() as f64;

    let total_weight: f64 = members.iter().map(|s| s.radius).sum();
    let center = if total_weight > 0.0 {
        let mut c = [0.0; 3];
        for s in members {
            for axis in 0..3 {
                c[axis] += s.center[axis] * s.radius;
            }
        }
        [c[0] / total_weight, c[1] / total_weight, c[2] / total_weight]
    } else {
        [0.0; 3]
    };

    let volume: f64 = members.iter().map(|s| s.volume()).sum();
    let hydrophobic_score = members.iter().map(|s| s.hydrophobicity).sum::<f64>() / count;
    let polar_score = members.iter().map(|s| s.polarity).sum::<f64>() / count;

    let depth_score = store
        .iter()
        .map(|a| (distance(&center, &a.position) - a.vdw_radius) / 10.0)
        .reduce(f64::min)
        .map_or(0.0, |d| d.clamp(0.0, 1.0));

    let composite_score =
        0.4 * (volume / 100.0) + 0.3 * hydrophobic_score + 0.1 * (1.0 - polar_score) + 0.2 * depth_score;
    let density = if volume > 0.0 { count / volume } else { 0.0 };
    let atom_count = members.iter().map(|s| s.enclosed_atom_count).sum();

    PocketResult {
        id,
        center,
        volume,
        alpha_sphere_count: members.len(),
        atom_count,
        hydrophobic_score,
        polar_score,
        depth_score,
        density,
        composite_score,
    }
}
