//! Density-based clustering of alpha-sphere centres.
//!
//! Cluster bookkeeping lives in a `Vec<SphereState>` owned by the clustering
//! call; the spheres themselves are never mutated.

use std::collections::VecDeque;

use rayon::prelude::*;
use tracing::debug;

use super::alpha_sphere::AlphaSphere;
use crate::geometry::distance_sq;
use pocketforge_common::PocketConfig;

/// Per-sphere label during and after clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SphereState {
    Unvisited,
    Noise,
    /// Core point of the given cluster
    Core(usize),
    /// Reachable from a core point but not dense itself
    Border(usize),
}

impl SphereState {
    pub fn cluster(&self) -> Option<usize> {
        match self {
            SphereState::Core(c) | SphereState::Border(c) => Some(*c),
            SphereState::Unvisited | SphereState::Noise => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub states: Vec<SphereState>,
    /// Member indices per cluster, ascending
    pub clusters: Vec<Vec<usize>>,
}

impl Clustering {
    pub fn noise_count(&self) -> usize {
        self.states.iter().filter(|s| **s == SphereState::Noise).count()
    }

    /// Member spheres of every cluster.
    pub fn cluster_spheres(&self, spheres: &[AlphaSphere]) -> Vec<Vec<AlphaSphere>> {
        self.clusters
            .iter()
            .map(|members| members.iter().map(|&i| spheres[i].clone()).collect())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    pub min_points: usize,
    pub eps: f64,
}

impl Dbscan {
    pub fn from_config(config: &PocketConfig) -> Self {
        Self {
            min_points: config.dbscan_min_points,
            eps: config.dbscan_eps,
        }
    }

    /// Other spheres whose centres are strictly closer than `eps`.
    fn neighbourhoods(&self, spheres: &[AlphaSphere]) -> Vec<Vec<usize>> {
        let eps_sq = self.eps * self.eps;
        spheres
            .par_iter()
            .enumerate()
            .map(|(i, si)| {
                spheres
                    .iter()
                    .enumerate()
                    .filter(|(j, sj)| *j != i && distance_sq(&si.center, &sj.center) < eps_sq)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect()
    }

    pub fn cluster(&self, spheres: &[AlphaSphere]) -> Clustering {
        let n = spheres.len();
        let neighbours = self.neighbourhoods(spheres);
        let mut states = vec![SphereState::Unvisited; n];
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for i in 0..n {
            if states[i] != SphereState::Unvisited {
                continue;
            }
            if neighbours[i].len() < self.min_points {
                states[i] = SphereState::Noise;
                continue;
            }

            let c = clusters.len();
            states[i] = SphereState::Core(c);
            let mut members = vec![i];
            let mut queue: VecDeque<usize> = neighbours[i].iter().copied().collect();

            while let Some(j) = queue.pop_front() {
                match states[j] {
                    SphereState::Noise => {
                        states[j] = SphereState::Border(c);
                        members.push(j);
                    }
                    SphereState::Unvisited => {
                        members.push(j);
                        if neighbours[j].len() >= self.min_points {
                            states[j] = SphereState::Core(c);
                            queue.extend(neighbours[j].iter().copied().filter(|&k| {
                                matches!(states[k], SphereState::Unvisited | SphereState::Noise)
                            }));
                        } else {
                            states[j] = SphereState::Border(c);
                        }
                    }
                    SphereState::Core(_) | SphereState::Border(_) => {}
                }
            }

            members.sort_unstable();
            clusters.push(members);
        }

        let clustering = Clustering { states, clusters };
        debug!(
            spheres = n,
            clusters = clustering.clusters.len(),
            noise = clustering.noise_count(),
            "DBSCAN finished"
        );
        clustering
    }
}
