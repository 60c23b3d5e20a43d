//! Post-generation sphere filter.

use super::alpha_sphere::AlphaSphere;
use pocketforge_common::PocketConfig;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SphereFilter {
    pub min_radius: f64,
    pub max_radius: f64,
    pub min_hydrophobicity: f64,
    pub min_enclosed_atoms: usize,
}

impl SphereFilter {
    pub fn from_config(config: &PocketConfig) -> Self {
        Self {
            min_radius: config.min_alpha_radius,
            max_radius: config.max_alpha_radius,
            min_hydrophobicity: config.min_sphere_hydrophobicity,
            min_enclosed_atoms: 1,
        }
    }

    pub fn accepts(&self, sphere: &AlphaSphere) -> bool {
        sphere.radius >= self.min_radius
            && sphere.radius <= self.max_radius
            && sphere.hydrophobicity >= self.min_hydrophobicity
            && sphere.enclosed_atom_count >= self.min_enclosed_atoms
    }

    /// Surviving spheres, in input order.
    pub fn apply(&self, spheres: &[AlphaSphere]) -> Vec<AlphaSphere> {
        let kept: Vec<AlphaSphere> = spheres.iter().filter(|s| self.accepts(s)).cloned().collect();
        debug!("Sphere filter kept {}/{}", kept.len(), spheres.len());
        kept
    }
}
