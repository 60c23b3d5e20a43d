//! Run configuration for the pocket and candidate pipelines.
//!
//! Every field has a serde default so partial TOML, YAML or JSON files are
//! accepted. `PocketForgeConfig::load()` reads `POCKETFORGE_CONFIG`
//! (default `pocketforge.toml`).

use crate::entities::FingerprintKind;
use crate::error::{PocketForgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PocketForgeConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub pocket: PocketConfig,

    #[serde(default)]
    pub fingerprint: FingerprintConfig,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub heatmap: HeatmapConfig,
}

// ── Noise schedule ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_timesteps")]
    pub timesteps: usize,

    #[serde(default = "default_beta_start")]
    pub beta_start: f64,

    #[serde(default = "default_beta_end")]
    pub beta_end: f64,
}

fn default_timesteps() -> usize { 1000 }
fn default_beta_start() -> f64 { 1e-4 }
fn default_beta_end() -> f64 { 0.02 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timesteps: default_timesteps(),
            beta_start: default_beta_start(),
            beta_end: default_beta_end(),
        }
    }
}

// ── Sampling ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Candidates requested from the sampler per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_total_batches")]
    pub total_batches: usize,

    #[serde(default = "default_max_atoms")]
    pub max_atoms: usize,

    #[serde(default = "default_min_feature_score")]
    pub min_feature_score: f64,

    #[serde(default = "default_heatmap_weight")]
    pub heatmap_weight: f64,

    /// Shorter notations are dropped before parsing
    #[serde(default = "default_min_notation_length")]
    pub min_notation_length: usize,

    #[serde(default)]
    pub low_power_mode: bool,
}

fn default_batch_size() -> usize { 100 }
fn default_total_batches() -> usize { 1 }
fn default_max_atoms() -> usize { 50 }
fn default_min_feature_score() -> f64 { 0.3 }
fn default_heatmap_weight() -> f64 { 0.8 }
fn default_min_notation_length() -> usize { 3 }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            total_batches: default_total_batches(),
            max_atoms: default_max_atoms(),
            min_feature_score: default_min_feature_score(),
            heatmap_weight: default_heatmap_weight(),
            min_notation_length: default_min_notation_length(),
            low_power_mode: false,
        }
    }
}

// ── Pocket detection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketConfig {
    #[serde(default = "default_min_alpha_radius")]
    pub min_alpha_radius: f64,

    #[serde(default = "default_max_alpha_radius")]
    pub max_alpha_radius: f64,

    #[serde(default = "default_probe_radius")]
    pub probe_radius: f64,

    /// Tolerance of the empty-sphere test
    #[serde(default = "default_sphere_atom_eps")]
    pub sphere_atom_eps: f64,

    #[serde(default = "default_min_sphere_hydrophobicity")]
    pub min_sphere_hydrophobicity: f64,

    #[serde(default = "default_max_alpha_spheres")]
    pub max_alpha_spheres: usize,

    #[serde(default = "default_dbscan_min_points")]
    pub dbscan_min_points: usize,

    #[serde(default = "default_dbscan_eps")]
    pub dbscan_eps: f64,

    #[serde(default = "default_min_pocket_volume")]
    pub min_pocket_volume: f64,

    #[serde(default = "default_max_pockets")]
    pub max_pockets: usize,
}

fn default_min_alpha_radius() -> f64 { 0.8 }
fn default_max_alpha_radius() -> f64 { 6.0 }
fn default_probe_radius() -> f64 { 1.4 }
fn default_sphere_atom_eps() -> f64 { 0.1 }
fn default_min_sphere_hydrophobicity() -> f64 { 0.1 }
fn default_max_alpha_spheres() -> usize { 100_000 }
fn default_dbscan_min_points() -> usize { 5 }
fn default_dbscan_eps() -> f64 { 3.5 }
fn default_min_pocket_volume() -> f64 { 10.0 }
fn default_max_pockets() -> usize { 100 }

impl Default for PocketConfig {
    fn default() -> Self {
        Self {
            min_alpha_radius: default_min_alpha_radius(),
            max_alpha_radius: default_max_alpha_radius(),
            probe_radius: default_probe_radius(),
            sphere_atom_eps: default_sphere_atom_eps(),
            min_sphere_hydrophobicity: default_min_sphere_hydrophobicity(),
            max_alpha_spheres: default_max_alpha_spheres(),
            dbscan_min_points: default_dbscan_min_points(),
            dbscan_eps: default_dbscan_eps(),
            min_pocket_volume: default_min_pocket_volume(),
            max_pockets: default_max_pockets(),
        }
    }
}

// ── Fingerprints ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    #[serde(default = "default_fp_length")]
    pub fp_length: usize,

    /// Morgan radius for `MorganGenerator::from_config`. Library kinds fix
    /// their own radius (ECFP4 is radius 2), so `validate` rejects any other
    /// value alongside an ECFP4-based kind.
    #[serde(default = "default_fp_radius")]
    pub radius: usize,

    #[serde(default)]
    pub kind: FingerprintKind,
}

fn default_fp_length() -> usize { 512 }
fn default_fp_radius() -> usize { 2 }

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            fp_length: default_fp_length(),
            radius: default_fp_radius(),
            kind: FingerprintKind::default(),
        }
    }
}

// ── Similarity filter ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Replaces the library's calibrated threshold when set
    #[serde(default)]
    pub similarity_threshold_override: Option<f64>,

    #[serde(default = "default_top_k")]
    pub top_k: Option<usize>,
}

fn default_top_k() -> Option<usize> { Some(100) }

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            similarity_threshold_override: None,
            top_k: default_top_k(),
        }
    }
}

// ── Heatmap ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    #[serde(default = "default_heatmap_size")]
    pub size: usize,

    /// Å per pixel
    #[serde(default = "default_grid_spacing")]
    pub grid_spacing: f64,

    #[serde(default)]
    pub active_site_center: [f64; 3],

    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,

    #[serde(default)]
    pub low_power_mode: bool,
}

fn default_heatmap_size() -> usize { 32 }
fn default_grid_spacing() -> f64 { 1.0 }
fn default_kernel_size() -> usize { 3 }

/// Smallest grid edge in low-power mode.
pub const MIN_LOW_POWER_HEATMAP_SIZE: usize = 16;

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            size: default_heatmap_size(),
            grid_spacing: default_grid_spacing(),
            active_site_center: [0.0; 3],
            kernel_size: default_kernel_size(),
            low_power_mode: false,
        }
    }
}

impl HeatmapConfig {
    /// Grid edge length after the low-power reduction.
    pub fn effective_size(&self) -> usize {
        if self.low_power_mode {
            (self.size / 2).max(MIN_LOW_POWER_HEATMAP_SIZE)
        } else {
            self.size
        }
    }

    /// Planar radius within which atoms contribute to a pixel.
    pub fn gather_radius(&self) -> f64 {
        if self.low_power_mode { 1.5 } else { 1.0 }
    }

    /// Same grid, moved onto a new centre (usually a detected pocket).
    pub fn centered_on(&self, center: [f64; 3]) -> Self {
        Self {
            active_site_center: center,
            ..self.clone()
        }
    }
}

// ── Loading & validation ─────────────────────────────────────────────────────

impl PocketForgeConfig {
    /// Load from `$POCKETFORGE_CONFIG` or `pocketforge.toml`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("POCKETFORGE_CONFIG")
            .unwrap_or_else(|_| "pocketforge.toml".to_string());

        if !Path::new(&path).exists() {
            return Err(PocketForgeError::Config(format!("Config file not found: {path}")));
        }
        let config = Self::from_toml_file(&path)?;
        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;
        debug!("Wrote configuration to {:?}", path.as_ref());
        Ok(())
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(PocketForgeError::Config(msg.to_string()));

        let s = &self.schedule;
        if s.timesteps < 2 {
            return fail("schedule.timesteps must be at least 2");
        }
        if !(0.0..1.0).contains(&s.beta_start) || !(0.0..1.0).contains(&s.beta_end) {
            return fail("schedule betas must lie in [0, 1)");
        }

        let p = &self.pocket;
        if p.min_alpha_radius <= 0.0 || p.min_alpha_radius > p.max_alpha_radius {
            return fail("pocket.min_alpha_radius must be positive and not exceed max_alpha_radius");
        }
        if p.dbscan_eps <= 0.0 {
            return fail("pocket.dbscan_eps must be positive");
        }
        if p.max_alpha_spheres == 0 {
            return fail("pocket.max_alpha_spheres must be positive");
        }

        if self.fingerprint.fp_length == 0 {
            return fail("fingerprint.fp_length must be positive");
        }
        if matches!(self.fingerprint.kind, FingerprintKind::Ecfp4 | FingerprintKind::FusedEcfp4Phfp)
            && self.fingerprint.radius != default_fp_radius()
        {
            return fail("fingerprint.radius must be 2 for ecfp4 and fused_ecfp4_phfp libraries");
        }
        if let Some(t) = self.similarity.similarity_threshold_override {
            if !(0.0..=1.0).contains(&t) {
                return fail("similarity.similarity_threshold_override must lie in [0, 1]");
            }
        }

        if self.sampling.batch_size == 0 {
            return fail("sampling.batch_size must be positive");
        }
        if self.heatmap.size == 0 || self.heatmap.kernel_size == 0 || self.heatmap.grid_spacing <= 0.0 {
            return fail("heatmap size, kernel_size and grid_spacing must be positive");
        }
        Ok(())
    }

    /// Batch size after the low-power reduction.
    pub fn effective_batch_size(&self) -> usize {
        if self.sampling.low_power_mode {
            ((self.sampling.batch_size as f64 * 0.3).round() as usize).max(1)
        } else {
            self.sampling.batch_size
        }
    }

    /// Diffusion length after the low-power reduction.
    pub fn effective_timesteps(&self) -> usize {
        if self.sampling.low_power_mode {
            ((self.schedule.timesteps as f64 * 0.5).round() as usize).max(2)
        } else {
            self.schedule.timesteps
        }
    }

    /// Heatmap settings with the sampling low-power switch folded in.
    pub fn effective_heatmap(&self) -> HeatmapConfig {
        HeatmapConfig {
            low_power_mode: self.heatmap.low_power_mode || self.sampling.low_power_mode,
            ..self.heatmap.clone()
        }
    }
}
