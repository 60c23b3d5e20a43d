//! Linear noise schedule for the diffusion sampler.

use serde::{Deserialize, Serialize};

use pocketforge_common::{PocketForgeError, Result};

/// Per-timestep noise parameters, computed once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSchedule {
    betas: Vec<f64>,
    alphas: Vec<f64>,
    alpha_cumprod: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleStep {
    pub t: usize,
    pub beta: f64,
    pub alpha: f64,
    pub alpha_cumprod: f64,
}

impl NoiseSchedule {
    /// Betas interpolated linearly from `beta_start` to `beta_end` inclusive.
    pub fn linear(timesteps: usize, beta_start: f64, beta_end: f64) -> Result<Self> {
        if timesteps < 2 {
            return Err(PocketForgeError::InvalidScheduleLength(timesteps));
        }

        let step = (beta_end - beta_start) / (timesteps - 1) as f64;
        let betas: Vec<f64> = (0..timesteps).map(|t| beta_start + t as f64 * step).collect();
        let alphas: Vec<f64> = betas.iter().map(|b| 1.0 - b).collect();
        let alpha_cumprod = alphas
            .iter()
            .scan(1.0, |acc, a| {
                *acc *= a;
                Some(*acc)
            })
            .collect();

        Ok(Self {
            betas,
            alphas,
            alpha_cumprod,
        })
    }

    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn beta(&self, t: usize) -> f64 {
        self.betas[t]
    }

    pub fn alpha(&self, t: usize) -> f64 {
        self.alphas[t]
    }

    pub fn alpha_cumprod(&self, t: usize) -> f64 {
        self.alpha_cumprod[t]
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    pub fn signal_rate(&self, t: usize) -> f64 {
        self.alpha_cumprod[t].sqrt()
    }

    pub fn noise_rate(&self, t: usize) -> f64 {
        (1.0 - self.alpha_cumprod[t]).sqrt()
    }

    pub fn steps(&self) -> impl Iterator<Item = ScheduleStep> + '_ {
        (0..self.len()).map(move |t| ScheduleStep {
            t,
            beta: self.betas[t],
            alpha: self.alphas[t],
            alpha_cumprod: self.alpha_cumprod[t],
        })
    }
}
