//! Alpha-sphere generation from atom triples.
//!
//! Every triple `(i < j < k)` whose circumsphere passes four tests becomes an
//! alpha sphere:
//!   1. radius within `[min_alpha_radius, max_alpha_radius]`
//!   2. no other atom centre closer than `radius - sphere_atom_eps`
//!   3. radius at least the probe radius and the centre outside every atom's
//!      van der Waals + probe shell
//!   4. at least one atom closer than `radius + vdw`
//!
//! A spatial grid limits the triples and atoms examined. Any triple with an
//! edge longer than `2 * max_alpha_radius` has a circumradius above the
//! maximum, so skipping it cannot change the result.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::circumsphere::{solve, Circumsphere};
use crate::geometry::{distance, distance_sq, Vec3};
use crate::structure::AtomStore;
use pocketforge_common::{Atom, DegenerateKind, PocketConfig, PocketForgeError, Result};

/// Outer atom indices handed to one rayon task.
const CHUNK_SIZE: usize = 32;

/// Slack on the pair cutoff so rounding never prunes an admissible triple.
const PAIR_CUTOFF_SLACK: f64 = 1e-9;

/// A candidate cavity sphere. Immutable after generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaSphere {
    pub center: Vec3,
    pub radius: f64,
    pub enclosed_atom_count: usize,
    /// Mean hydrophobicity of the enclosed atoms
    pub hydrophobicity: f64,
    /// `1 - hydrophobicity`
    pub polarity: f64,
    pub parent_atoms: [usize; 3],
}

impl AlphaSphere {
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * std::f64::consts::PI * self.radius.powi(3)
    }
}

/// Outcome of testing one atom triple.
#[derive(Debug, Clone, PartialEq)]
pub enum TripleVerdict {
    Accepted(AlphaSphere),
    Degenerate(DegenerateKind),
    RadiusOutOfRange { radius: f64 },
    NotEmpty { intruder: usize },
    BelowProbeRadius { radius: f64 },
    InsideMolecule { atom: usize },
    NoEnclosedAtoms,
}

impl TripleVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TripleVerdict::Accepted(_))
    }

    pub fn into_sphere(self) -> Option<AlphaSphere> {
        match self {
            TripleVerdict::Accepted(sphere) => Some(sphere),
            _ => None,
        }
    }
}

/// Spheres produced by one generation run, in lexicographic triple order.
#[derive(Debug, Clone, Default)]
pub struct SphereGeneration {
    pub spheres: Vec<AlphaSphere>,
    /// The cap was reached and the output is a prefix of the full result
    pub truncated: bool,
    pub triples_examined: usize,
    pub degenerate_triples: usize,
}

// ── Spatial grid ─────────────────────────────────────────────────────────────

/// Uniform hash grid over atom positions.
struct SpatialGrid {
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
    cell_size: f64,
}

impl SpatialGrid {
    fn new(atoms: &[Atom], cell_size: f64) -> Self {
        let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (idx, atom) in atoms.iter().enumerate() {
            cells.entry(Self::key(&atom.position, cell_size)).or_default().push(idx);
        }
        Self { cells, cell_size }
    }

    fn key(p: &Vec3, cell_size: f64) -> (i64, i64, i64) {
        (
            (p[0] / cell_size).floor() as i64,
            (p[1] / cell_size).floor() as i64,
            (p[2] / cell_size).floor() as i64,
        )
    }

    /// Sorted indices of every atom in cells overlapping the query ball.
    /// A superset of the atoms within `radius`; callers apply exact tests.
    fn query(&self, point: &Vec3, radius: f64) -> Vec<usize> {
        let reach = (radius / self.cell_size).ceil() as i64;
        let (cx, cy, cz) = Self::key(point, self.cell_size);

        let mut result = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    if let Some(indices) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        result.extend_from_slice(indices);
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }
}

// ── Generator ────────────────────────────────────────────────────────────────

struct ChunkOutput {
    spheres: Vec<AlphaSphere>,
    examined: usize,
    degenerate: usize,
}

pub struct AlphaSphereGenerator {
    min_radius: f64,
    max_radius: f64,
    probe_radius: f64,
    eps: f64,
    max_spheres: usize,
}

impl AlphaSphereGenerator {
    pub fn new(config: &PocketConfig) -> Self {
        Self {
            min_radius: config.min_alpha_radius,
            max_radius: config.max_alpha_radius,
            probe_radius: config.probe_radius,
            eps: config.sphere_atom_eps,
            max_spheres: config.max_alpha_spheres,
        }
    }

    pub fn with_max_spheres(mut self, max_spheres: usize) -> Self {
        self.max_spheres = max_spheres;
        self
    }

    /// Test one triple against every atom in the store.
    pub fn evaluate_triple(&self, store: &AtomStore, i: usize, j: usize, k: usize) -> Result<TripleVerdict> {
        let n = store.len();
        if i >= n || j >= n || k >= n {
            return Err(PocketForgeError::InvalidInput(format!(
                "triple ({i}, {j}, {k}) out of range for {n} atoms"
            )));
        }
        if i == j || j == k || i == k {
            return Err(PocketForgeError::InvalidInput(format!("triple ({i}, {j}, {k}) repeats an atom")));
        }

        let atoms = store.atoms();
        let sphere = match solve(&atoms[i].position, &atoms[j].position, &atoms[k].position) {
            Ok(s) => s,
            Err(kind) => return Ok(TripleVerdict::Degenerate(kind)),
        };
        let everyone: Vec<usize> = (0..n).collect();
        Ok(self.judge(atoms, [i, j, k], sphere, &everyone))
    }

    /// Apply the acceptance tests, in order, to a solved circumsphere.
    /// `candidates` must be sorted and contain every atom within
    /// `radius + max_vdw + probe` of the centre.
    fn judge(&self, atoms: &[Atom], parents: [usize; 3], sphere: Circumsphere, candidates: &[usize]) -> TripleVerdict {
        let Circumsphere { center, radius } = sphere;

        if radius < self.min_radius || radius > self.max_radius {
            return TripleVerdict::RadiusOutOfRange { radius };
        }

        let shrunk = radius - self.eps;
        let shrunk_sq = shrunk * shrunk;
        for &m in candidates {
            if parents.contains(&m) {
                continue;
            }
            if distance_sq(&atoms[m].position, &center) < shrunk_sq {
                return TripleVerdict::NotEmpty { intruder: m };
            }
        }

        if radius < self.probe_radius {
            return TripleVerdict::BelowProbeRadius { radius };
        }
        for &m in candidates {
            let atom = &atoms[m];
            if distance(&atom.position, &center) < atom.vdw_radius + self.probe_radius {
                return TripleVerdict::InsideMolecule { atom: m };
            }
        }

        let mut enclosed = 0usize;
        let mut hydrophobic_sum = 0.0;
        for &m in candidates {
            let atom = &atoms[m];
            if distance(&atom.position, &center) < radius + atom.vdw_radius {
                enclosed += 1;
                hydrophobic_sum += atom.hydrophobicity;
            }
        }
        if enclosed == 0 {
            return TripleVerdict::NoEnclosedAtoms;
        }

        let hydrophobicity = hydrophobic_sum / enclosed as f64;
        TripleVerdict::Accepted(AlphaSphere {
            center,
            radius,
            enclosed_atom_count: enclosed,
            hydrophobicity,
            polarity: 1.0 - hydrophobicity,
            parent_atoms: parents,
        })
    }

    /// All spheres whose first parent is `i`, in (j, k) order.
    /// `reach_extra` is the largest van der Waals radius plus the probe.
    fn spheres_for_atom(&self, atoms: &[Atom], grid: &SpatialGrid, i: usize, reach_extra: f64, out: &mut ChunkOutput) {
        let pair_cutoff = 2.0 * self.max_radius + PAIR_CUTOFF_SLACK;

        let origin = &atoms[i].position;
        let partners: Vec<usize> = grid
            .query(origin, pair_cutoff)
            .into_iter()
            .filter(|&j| j > i && distance(origin, &atoms[j].position) <= pair_cutoff)
            .collect();

        for (a, &j) in partners.iter().enumerate() {
            for &k in &partners[a + 1..] {
                if distance(&atoms[j].position, &atoms[k].position) > pair_cutoff {
                    continue;
                }
                out.examined += 1;

                let sphere = match solve(origin, &atoms[j].position, &atoms[k].position) {
                    Ok(s) => s,
                    Err(_) => {
                        out.degenerate += 1;
                        continue;
                    }
                };
                if sphere.radius < self.min_radius || sphere.radius > self.max_radius {
                    continue;
                }

                let candidates = grid.query(&sphere.center, sphere.radius + reach_extra);
                if let TripleVerdict::Accepted(s) = self.judge(atoms, [i, j, k], sphere, &candidates) {
                    out.spheres.push(s);
                }
            }
        }
    }

    /// Generate alpha spheres for the whole store.
    pub fn generate(&self, store: &AtomStore) -> Result<SphereGeneration> {
        let n = store.len();
        if n < 3 {
            return Err(PocketForgeError::InvalidInput(format!(
                "alpha-sphere generation needs at least 3 atoms, got {n}"
            )));
        }

        let atoms = store.atoms();
        let grid = SpatialGrid::new(atoms, (2.0 * self.max_radius).max(1.0));
        debug!("Built spatial grid with {} occupied cells", grid.cells.len());
        let reach_extra = store.max_vdw_radius() + self.probe_radius;

        let chunk_starts: Vec<usize> = (0..n).step_by(CHUNK_SIZE).collect();
        let wave = rayon::current_num_threads().max(1) * 2;

        let mut result = SphereGeneration::default();
        'waves: for starts in chunk_starts.chunks(wave) {
            let outputs: Vec<ChunkOutput> = starts
                .par_iter()
                .map(|&start| {
                    let mut out = ChunkOutput { spheres: Vec::new(), examined: 0, degenerate: 0 };
                    for i in start..(start + CHUNK_SIZE).min(n) {
                        self.spheres_for_atom(atoms, &grid, i, reach_extra, &mut out);
                    }
                    out
                })
                .collect();

            for out in outputs {
                result.triples_examined += out.examined;
                result.degenerate_triples += out.degenerate;
                result.spheres.extend(out.spheres);
                if result.spheres.len() >= self.max_spheres {
                    result.spheres.truncate(self.max_spheres);
                    result.truncated = true;
                    break 'waves;
                }
            }
        }

        if result.truncated {
            let err = PocketForgeError::ResourceExhausted { limit: self.max_spheres };
            warn!(error = %err, "Alpha-sphere cap reached, results are partial");
        }
        info!(
            atoms = n,
            spheres = result.spheres.len(),
            examined = result.triples_examined,
            degenerate = result.degenerate_triples,
            "Alpha-sphere generation finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketforge_test_utils::{octahedral_cage, random_cloud, tetrahedron};

    fn brute_force(generator: &AlphaSphereGenerator, store: &AtomStore) -> Vec<AlphaSphere> {
        let n = store.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    if let Some(s) = generator.evaluate_triple(store, i, j, k).unwrap().into_sphere() {
                        out.push(s);
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_tetrahedron_faces_sit_inside_the_molecule() {
        let store = AtomStore::new(tetrahedron(3.0, 1.5, 1.0));
        let generator = AlphaSphereGenerator::new(&PocketConfig::default());

        let faces = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
        for (i, j, k) in faces {
            let verdict = generator.evaluate_triple(&store, i, j, k).unwrap();
            // face circumradius is edge / sqrt(3) = 1.732, inside the 1.5 + 1.4 shell
            assert!(matches!(verdict, TripleVerdict::InsideMolecule { .. }), "{verdict:?}");
            assert!(!verdict.is_accepted());
        }

        let first = generator.generate(&store).unwrap();
        let second = generator.generate(&store).unwrap();
        assert!(first.spheres.is_empty());
        assert_eq!(first.spheres, second.spheres);
        assert_eq!(first.triples_examined, 4);
    }

    #[test]
    fn test_tetrahedron_small_atoms_pass() {
        // with tiny atoms and no probe the faces become alpha spheres
        let store = AtomStore::new(tetrahedron(3.0, 0.1, 1.0));
        let config = PocketConfig { probe_radius: 0.0, ..PocketConfig::default() };
        let generator = AlphaSphereGenerator::new(&config);

        let generation = generator.generate(&store).unwrap();
        assert_eq!(generation.spheres.len(), 4);
        for s in &generation.spheres {
            assert!((s.radius - 3.0 / 3f64.sqrt()).abs() < 1e-9);
            // the opposite vertex is 2.449 away, outside radius + vdw
            assert_eq!(s.enclosed_atom_count, 3);
            assert!((s.hydrophobicity + s.polarity - 1.0).abs() < 1e-12);
        }
        let parents: Vec<[usize; 3]> = generation.spheres.iter().map(|s| s.parent_atoms).collect();
        assert_eq!(parents, vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]]);
    }

    #[test]
    fn test_octahedral_cage() {
        let store = AtomStore::new(octahedral_cage(5.0));
        let generator = AlphaSphereGenerator::new(&PocketConfig::default());
        let generation = generator.generate(&store).unwrap();

        // 8 faces plus 12 triples containing an antipodal pair
        assert_eq!(generation.spheres.len(), 20);
        let central = generation.spheres.iter().filter(|s| (s.radius - 5.0).abs() < 1e-9).count();
        assert_eq!(central, 12);
        for s in &generation.spheres {
            assert!(s.radius >= 0.8 && s.radius <= 6.0);
        }
    }

    #[test]
    fn test_pruned_matches_brute_force() {
        let store = AtomStore::new(random_cloud(7, 40, 12.0));
        let config = PocketConfig { probe_radius: 0.5, ..PocketConfig::default() };
        let generator = AlphaSphereGenerator::new(&config);

        let pruned = generator.generate(&store).unwrap();
        assert_eq!(pruned.spheres, brute_force(&generator, &store));
    }

    #[test]
    fn test_cap_keeps_lexicographic_prefix() {
        let store = AtomStore::new(random_cloud(11, 60, 14.0));
        let config = PocketConfig { probe_radius: 0.0, ..PocketConfig::default() };
        let full = AlphaSphereGenerator::new(&config).generate(&store).unwrap();
        assert!(full.spheres.len() > 5, "fixture too sparse: {}", full.spheres.len());
        assert!(!full.truncated);

        let capped = AlphaSphereGenerator::new(&config)
            .with_max_spheres(5)
            .generate(&store)
            .unwrap();
        assert!(capped.truncated);
        assert_eq!(capped.spheres, full.spheres[..5].to_vec());
    }

    #[test]
    fn test_too_few_atoms() {
        let store = AtomStore::new(tetrahedron(3.0, 1.5, 1.0)[..2].to_vec());
        let result = AlphaSphereGenerator::new(&PocketConfig::default()).generate(&store);
        assert!(matches!(result, Err(PocketForgeError::InvalidInput(_))));
    }

    #[test]
    fn test_evaluate_triple_rejects_bad_indices() {
        let store = AtomStore::new(tetrahedron(3.0, 1.5, 1.0));
        let generator = AlphaSphereGenerator::new(&PocketConfig::default());
        assert!(generator.evaluate_triple(&store, 0, 0, 1).is_err());
        assert!(generator.evaluate_triple(&store, 0, 1, 9).is_err());
    }
}
