//! pocketforge-test-utils: shared fixtures for PocketForge tests.

use pocketforge_common::{Atom, PeriodicTable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process (`RUST_LOG` or `pocketforge=debug,info`).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("pocketforge=debug,info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Atom with explicit radius and hydrophobicity, bypassing the element table.
pub fn atom(id: usize, element: &str, position: [f64; 3], vdw_radius: f64, hydrophobicity: f64) -> Atom {
    Atom {
        id,
        element: element.to_string(),
        position,
        vdw_radius,
        hydrophobicity,
        charge: 0.0,
    }
}

/// Regular tetrahedron with the given edge length, centred on the origin.
pub fn tetrahedron(edge: f64, vdw_radius: f64, hydrophobicity: f64) -> Vec<Atom> {
    let s = edge / (2.0 * 2f64.sqrt());
    [[1.0, 1.0, 1.0], [1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, 1.0]]
        .iter()
        .enumerate()
        .map(|(i, v)| atom(i, "C", [v[0] * s, v[1] * s, v[2] * s], vdw_radius, hydrophobicity))
        .collect()
}

/// Six carbons on the coordinate axes at distance `radius`: a closed cage
/// whose interior holds one cluster of alpha spheres.
pub fn octahedral_cage(radius: f64) -> Vec<Atom> {
    let table = PeriodicTable::standard();
    let r = radius;
    [
        [r, 0.0, 0.0],
        [-r, 0.0, 0.0],
        [0.0, r, 0.0],
        [0.0, -r, 0.0],
        [0.0, 0.0, r],
        [0.0, 0.0, -r],
    ]
    .into_iter()
    .enumerate()
    .map(|(i, p)| Atom::from_element(i, "C", p, &table))
    .collect()
}

/// Seeded random point cloud of mixed C/N/O atoms inside a cube of edge `extent`.
pub fn random_cloud(seed: u64, n: usize, extent: f64) -> Vec<Atom> {
    let table = PeriodicTable::standard();
    let mut rng = StdRng::seed_from_u64(seed);
    let elements = ["C", "C", "C", "N", "O", "S"];
    (0..n)
        .map(|i| {
            let element = elements[rng.gen_range(0..elements.len())];
            let p = [
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
                rng.gen_range(0.0..extent),
            ];
            Atom::from_element(i, element, p, &table)
        })
        .collect()
}

/// PDB text with one HETATM per atom, element in columns 77-78.
pub fn to_pdb(atoms: &[Atom]) -> String {
    let mut out = String::new();
    for a in atoms {
        out.push_str(&format!(
            "HETATM{:>5} {:<4} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    {:>6.3}{:>2}\n",
            a.id + 1,
            a.element,
            a.position[0],
            a.position[1],
            a.position[2],
            a.charge,
            a.element,
        ));
    }
    out.push_str("END\n");
    out
}

/// The three reference actives used across library tests.
pub const REFERENCE_ACTIVES: [&str; 3] = [
    "C1=CC=C(C(=C1)C(=O)N)O",
    "CC(=O)Nc1ccc(O)cc1",
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
];

/// Seeded well-formed linear notations (first token is always an atom).
pub fn random_notations(seed: u64, count: usize, max_tokens: usize) -> Vec<String> {
    let tokens = ["C", "C", "c", "N", "O", "S", "Cl", "Br", "F", "(C)", "(O)", "=O", "1"];
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let len = rng.gen_range(2..=max_tokens.max(2));
            let mut s = String::from("C");
            for _ in 1..len {
                s.push_str(tokens[rng.gen_range(0..tokens.len())]);
            }
            s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tetrahedron_edges() {
        let atoms = tetrahedron(3.0, 1.5, 1.0);
        for i in 0..4 {
            for j in (i + 1)..4 {
                let d = atoms[i].distance_to(&atoms[j].position);
                assert!((d - 3.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_random_notations_are_seeded() {
        assert_eq!(random_notations(7, 5, 8), random_notations(7, 5, 8));
    }
}
