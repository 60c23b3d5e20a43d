//! Four-channel protein feature heatmap around an active site.
//!
//! The grid lies in the x/z plane at the height of the active-site centre.
//! Every pixel averages the features of the atoms whose planar distance to
//! the pixel centre is within the gather radius, then the whole map is
//! smoothed with a mean kernel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pocket::PocketResult;
use crate::structure::AtomStore;
use pocketforge_common::{Atom, HeatmapConfig, PocketForgeError, Result};

pub const CHANNELS: usize = 4;

/// Element class ordinals; anything unlisted is `OTHER_ELEMENT_CLASS`.
const ELEMENT_CLASSES: [&str; 10] = ["C", "N", "O", "S", "H", "P", "F", "CL", "BR", "I"];
const OTHER_ELEMENT_CLASS: usize = 10;

pub type Pixel = [f64; CHANNELS];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub size: usize,
    pub grid_spacing: f64,
    pub center: [f64; 3],
    /// Row-major, `y * size + x`
    pub pixels: Vec<Pixel>,
}

impl Heatmap {
    pub fn get(&self, x: usize, y: usize) -> Option<&Pixel> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.pixels.get(y * self.size + x)
    }

    pub fn channel(&self, channel: usize) -> Vec<f64> {
        self.pixels.iter().map(|p| p[channel]).collect()
    }

    /// Flattened pixel data, channel-interleaved, for upload to a sampler.
    pub fn as_flat(&self) -> Vec<f32> {
        self.pixels.iter().flat_map(|p| p.iter().map(|&v| v as f32)).collect()
    }
}

pub struct HeatmapGenerator {
    config: HeatmapConfig,
}

impl HeatmapGenerator {
    pub fn new(config: HeatmapConfig) -> Self {
        Self { config }
    }

    /// Generator whose grid is centred on a detected pocket.
    pub fn for_pocket(config: &HeatmapConfig, pocket: &PocketResult) -> Self {
        Self::new(config.centered_on(pocket.center))
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn generate(&self, store: &AtomStore) -> Result<Heatmap> {
        if store.is_empty() {
            return Err(PocketForgeError::InvalidInput("heatmap needs at least one atom".into()));
        }

        let size = self.config.effective_size();
        let raw = self.gather(store, size);
        let pixels = mean_convolve(&raw, size, self.config.kernel_size);
        debug!(
            size,
            atoms = store.len(),
            low_power = self.config.low_power_mode,
            "Generated heatmap"
        );

        Ok(Heatmap {
            size,
            grid_spacing: self.config.grid_spacing,
            center: self.config.active_site_center,
            pixels,
        })
    }

    /// Unsmoothed per-pixel feature averages.
    pub fn gather(&self, store: &AtomStore, size: usize) -> Vec<Pixel> {
        let [cx, _, cz] = self.config.active_site_center;
        let spacing = self.config.grid_spacing;
        let radius_sq = self.config.gather_radius().powi(2);
        let half = (size / 2) as f64;

        (0..size * size)
            .into_par_iter()
            .map(|idx| {
                let gx = cx + ((idx % size) as f64 - half) * spacing;
                let gz = cz + ((idx / size) as f64 - half) * spacing;

                let mut sum = [0.0; CHANNELS];
                let mut count = 0usize;
                for atom in store.iter() {
                    let dx = atom.position[0] - gx;
                    let dz = atom.position[2] - gz;
                    if dx * dx + dz * dz > radius_sq {
                        continue;
                    }
                    count += 1;
                    for (acc, v) in sum.iter_mut().zip(atom_features(atom)) {
                        *acc += v;
                    }
                }
                if count > 0 {
                    sum.iter_mut().for_each(|v| *v /= count as f64);
                }
                sum
            })
            .collect()
    }
}

fn atom_features(atom: &Atom) -> Pixel {
    let symbol = atom.element.to_ascii_uppercase();
    let class = ELEMENT_CLASSES
        .iter()
        .position(|&e| e == symbol)
        .unwrap_or(OTHER_ELEMENT_CLASS);
    let hydrophobic = matches!(symbol.as_str(), "C" | "S" | "F" | "CL" | "BR" | "I");
    let hbond = matches!(symbol.as_str(), "N" | "O");

    [
        class as f64 / OTHER_ELEMENT_CLASS as f64,
        atom.charge / 2.0,
        if hydrophobic { 1.0 } else { 0.0 },
        if hbond { 1.0 } else { 0.0 },
    ]
}

/// `kernel x kernel` box filter with zero padding, per channel.
pub fn mean_convolve(pixels: &[Pixel], size: usize, kernel: usize) -> Vec<Pixel> {
    if kernel <= 1 {
        return pixels.to_vec();
    }
    let reach = (kernel / 2) as isize;
    let weight = 1.0 / (kernel * kernel) as f64;
    let n = size as isize;

    (0..size * size)
        .into_par_iter()
        .map(|idx| {
            let (x, y) = ((idx % size) as isize, (idx / size) as isize);
            let mut out = [0.0; CHANNELS];
            for ky in -reach..(kernel as isize - reach) {
                for kx in -reach..(kernel as isize - reach) {
                    let (sx, sy) = (x + kx, y + ky);
                    if sx < 0 || sy < 0 || sx >= n || sy >= n {
                        continue;
                    }
                    let src = &pixels[(sy * n + sx) as usize];
                    for c in 0..CHANNELS {
                        out[c] += src[c] * weight;
                    }
                }
            }
            out
        })
        .collect()
}
