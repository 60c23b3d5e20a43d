//! Per-target reference fingerprint libraries.
//!
//! A library holds one fingerprint per known active, their majority-vote
//! consensus, and a similarity threshold calibrated on the actives
//! themselves.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fingerprint::{Fingerprint, FingerprintScheme, DEFAULT_FP_LENGTH};
use crate::pocket::PocketFeatures;
use crate::smiles::MolecularGraph;
use pocketforge_common::{FingerprintConfig, FingerprintKind, PeriodicTable, PocketForgeError, Result};

/// Calibrated thresholds are clamped into this range.
pub const MIN_CALIBRATED_THRESHOLD: f64 = 0.6;
pub const MAX_CALIBRATED_THRESHOLD: f64 = 0.8;
/// Threshold of a library built from pocket features alone.
pub const VIRTUAL_THRESHOLD: f64 = 0.7;
/// Actives must parse to at most this many atoms.
pub const MAX_REFERENCE_ATOMS: usize = 99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLibrary {
    pub target_name: String,
    pub fp_kind: FingerprintKind,
    pub fp_length: usize,
    pub consensus: Fingerprint,
    pub individual: Vec<Fingerprint>,
    pub source_notations: Vec<String>,
    pub calibrated_threshold: f64,
}

impl ReferenceLibrary {
    /// Build a library from known actives. Fails with `EmptyReferenceSet`
    /// when no notation parses to 1..=99 atoms.
    pub fn generate<S: AsRef<str>>(
        target_name: &str,
        notations: &[S],
        fp_kind: FingerprintKind,
        fp_length: usize,
        table: &PeriodicTable,
    ) -> Result<Self> {
        let mut individual = Vec::new();
        let mut source_notations = Vec::new();
        for notation in notations.iter().map(AsRef::as_ref) {
            match reference_graph(notation, table) {
                Some(graph) => {
                    individual.push(fp_kind.fingerprint(&graph, fp_length, table));
                    source_notations.push(notation.to_string());
                }
                None => warn!(target = %target_name, "Skipping invalid reference notation {:?}", notation),
            }
        }

        if individual.is_empty() {
            return Err(PocketForgeError::EmptyReferenceSet(target_name.to_string()));
        }

        let consensus = consensus(&individual, fp_length);
        let calibrated_threshold = calibrate_threshold(&individual, &consensus);
        info!(
            target = %target_name,
            kind = %fp_kind,
            actives = individual.len(),
            threshold = calibrated_threshold,
            "Reference library generated"
        );

        Ok(Self {
            target_name: target_name.to_string(),
            fp_kind,
            fp_length,
            consensus,
            individual,
            source_notations,
            calibrated_threshold,
        })
    }

    /// `generate` with the kind and length from configuration.
    pub fn from_config<S: AsRef<str>>(
        target_name: &str,
        notations: &[S],
        config: &FingerprintConfig,
        table: &PeriodicTable,
    ) -> Result<Self> {
        Self::generate(target_name, notations, config.kind, config.fp_length, table)
    }

    /// Fallback library from pocket pharmacophore flags when a target has
    /// no known actives.
    pub fn virtual_from_pocket(target_name: &str, features: PocketFeatures, fp_kind: FingerprintKind) -> Self {
        let mut hash = 0usize;
        if features.hydrophobic {
            hash += 1;
        }
        if features.hbond_donor {
            hash += 2;
        }
        if features.hbond_acceptor {
            hash += 4;
        }

        let mut fp = Fingerprint::new(DEFAULT_FP_LENGTH);
        fp.set(hash % DEFAULT_FP_LENGTH);
        for (flag, bit) in [(features.hydrophobic, 10), (features.hbond_donor, 20), (features.hbond_acceptor, 30)] {
            if flag {
                fp.set(bit);
            }
        }

        info!(target = %target_name, "Built virtual reference library from pocket features");
        Self {
            target_name: target_name.to_string(),
            fp_kind,
            fp_length: DEFAULT_FP_LENGTH,
            consensus: fp.clone(),
            individual: vec![fp],
            source_notations: vec![format!("Virtual_{target_name}")],
            calibrated_threshold: VIRTUAL_THRESHOLD,
        }
    }

    /// Append valid actives not already present, then recompute consensus
    /// and threshold. Returns how many were added.
    pub fn update<S: AsRef<str>>(&mut self, notations: &[S], table: &PeriodicTable) -> usize {
        let mut added = 0;
        for notation in notations.iter().map(AsRef::as_ref) {
            if self.source_notations.iter().any(|s| s == notation) {
                continue;
            }
            let Some(graph) = reference_graph(notation, table) else {
                warn!(target = %self.target_name, "Skipping invalid reference notation {:?}", notation);
                continue;
            };
            self.individual.push(self.fp_kind.fingerprint(&graph, self.fp_length, table));
            self.source_notations.push(notation.to_string());
            added += 1;
        }

        self.consensus = consensus(&self.individual, self.fp_length);
        self.calibrated_threshold = calibrate_threshold(&self.individual, &self.consensus);
        info!(target = %self.target_name, added, total = self.individual.len(), "Reference library updated");
        added
    }

    /// Fingerprint a notation the way this library's members were built.
    /// Unparseable notations give an all-zero fingerprint.
    pub fn fingerprint_notation(&self, notation: &str, table: &PeriodicTable) -> Fingerprint {
        let graph = MolecularGraph::parse_lenient(notation, table);
        self.fp_kind.fingerprint(&graph, self.fp_length, table)
    }

    /// Tanimoto similarity to the consensus.
    pub fn similarity_to(&self, fp: &Fingerprint) -> f64 {
        self.fp_kind.score(fp, self)
    }

    pub fn similarity_to_notation(&self, notation: &str, table: &PeriodicTable) -> f64 {
        self.similarity_to(&self.fingerprint_notation(notation, table))
    }

    pub fn is_virtual(&self) -> bool {
        self.source_notations.len() == 1 && self.source_notations[0].starts_with("Virtual_")
    }

    /// Check that every fingerprint has `fp_length` bits and that members
    /// line up with their notations. Needed for libraries read from disk.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PocketForgeError::InvalidInput(format!("library {}: {reason}", self.target_name)));

        if self.fp_length == 0 {
            return invalid("fp_length is 0".into());
        }
        if self.consensus.len() != self.fp_length {
            return invalid(format!("consensus has {} bits, expected {}", self.consensus.len(), self.fp_length));
        }
        if let Some((i, fp)) = self.individual.iter().enumerate().find(|(_, fp)| fp.len() != self.fp_length) {
            return invalid(format!("member {i} has {} bits, expected {}", fp.len(), self.fp_length));
        }
        if self.individual.is_empty() || self.individual.len() != self.source_notations.len() {
            return invalid(format!(
                "{} fingerprints for {} notations",
                self.individual.len(),
                self.source_notations.len()
            ));
        }
        if !(0.0..=1.0).contains(&self.calibrated_threshold) {
            return invalid(format!("threshold {} outside [0, 1]", self.calibrated_threshold));
        }
        Ok(())
    }
}

fn reference_graph(notation: &str, table: &PeriodicTable) -> Option<MolecularGraph> {
    MolecularGraph::parse(notation, table)
        .ok()
        .filter(|g| (1..=MAX_REFERENCE_ATOMS).contains(&g.len()))
}

/// Majority vote: a bit is set iff strictly more than half the inputs set it.
pub fn consensus(fingerprints: &[Fingerprint], length: usize) -> Fingerprint {
    let n = fingerprints.len();
    let mut out = Fingerprint::new(length);
    for bit in 0..length {
        let count = fingerprints.iter().filter(|fp| fp.get(bit)).count();
        if 2 * count > n {
            out.set(bit);
        }
    }
    out
}

/// Median similarity of the members to the consensus, clamped to [0.6, 0.8].
pub fn calibrate_threshold(fingerprints: &[Fingerprint], consensus: &Fingerprint) -> f64 {
    let mut sims: Vec<f64> = fingerprints.iter().map(|fp| fp.tanimoto(consensus)).collect();
    if sims.is_empty() {
        return MIN_CALIBRATED_THRESHOLD;
    }
    sims.sort_by(f64::total_cmp);
    let mid = sims.len() / 2;
    let median = if sims.len() % 2 == 0 {
        (sims[mid - 1] + sims[mid]) / 2.0
    } else {
        sims[mid]
    };
    median.clamp(MIN_CALIBRATED_THRESHOLD, MAX_CALIBRATED_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketforge_test_utils::REFERENCE_ACTIVES;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn table() -> PeriodicTable {
        PeriodicTable::standard()
    }

    #[test]
    fn test_generate_reference_actives() {
        let lib = ReferenceLibrary::generate("1AQ1", &REFERENCE_ACTIVES, FingerprintKind::Ecfp4, 512, &table()).unwrap();
        assert_eq!(lib.individual.len(), 3);
        assert_eq!(lib.source_notations, REFERENCE_ACTIVES.to_vec());
        assert!((0.6..=0.8).contains(&lib.calibrated_threshold));

        let again = ReferenceLibrary::generate("1AQ1", &REFERENCE_ACTIVES, FingerprintKind::Ecfp4, 512, &table()).unwrap();
        assert_eq!(again, lib);
        let sims: Vec<f64> = lib.individual.iter().map(|fp| fp.tanimoto(&lib.consensus)).collect();
        let sims_again: Vec<f64> = again.individual.iter().map(|fp| fp.tanimoto(&again.consensus)).collect();
        assert_eq!(sims, sims_again);
    }

    #[test]
    fn test_validate_catches_mismatched_lengths() {
        let lib = ReferenceLibrary::generate("T", &["CCO", "CCN"], FingerprintKind::Ecfp4, 512, &table()).unwrap();
        assert!(lib.validate().is_ok());
        assert!(ReferenceLibrary::virtual_from_pocket("T", PocketFeatures::default(), FingerprintKind::Ecfp4)
            .validate()
            .is_ok());

        let mut short_consensus = lib.clone();
        short_consensus.consensus = Fingerprint::new(256);
        assert!(matches!(short_consensus.validate(), Err(PocketForgeError::InvalidInput(_))));

        let mut long_member = lib.clone();
        long_member.individual[1] = Fingerprint::new(1024);
        assert!(long_member.validate().is_err());

        let mut orphan = lib.clone();
        orphan.source_notations.pop();
        assert!(orphan.validate().is_err());

        let mut bad_threshold = lib;
        bad_threshold.calibrated_threshold = 1.5;
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn test_invalid_notations_are_skipped() {
        let notations = ["CCO", "C(C", "", "CCN"];
        let lib = ReferenceLibrary::generate("T", &notations, FingerprintKind::Phfp, 512, &table()).unwrap();
        assert_eq!(lib.source_notations, vec!["CCO", "CCN"]);
    }

    #[test]
    fn test_oversized_molecules_rejected() {
        let huge = "C".repeat(100);
        let ok = "C".repeat(99);
        let lib = ReferenceLibrary::generate("T", &[huge.as_str(), ok.as_str()], FingerprintKind::Ecfp4, 512, &table()).unwrap();
        assert_eq!(lib.individual.len(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = FingerprintConfig {
            fp_length: 256,
            radius: 2,
            kind: FingerprintKind::Stfp,
        };
        let lib = ReferenceLibrary::from_config("T", &["CCO"], &config, &table()).unwrap();
        assert_eq!(lib.fp_kind, FingerprintKind::Stfp);
        assert_eq!(lib.fp_length, 256);
        assert_eq!(lib.consensus.len(), 256);
    }

    #[test]
    fn test_empty_reference_set() {
        let result = ReferenceLibrary::generate("T", &["((", "X"], FingerprintKind::Ecfp4, 512, &table());
        assert!(matches!(result, Err(PocketForgeError::EmptyReferenceSet(t)) if t == "T"));
    }

    #[test]
    fn test_consensus_majority() {
        let mut rng = StdRng::seed_from_u64(99);
        for n in 1..=6 {
            let fps: Vec<Fingerprint> = (0..n)
                .map(|_| Fingerprint::from_bits(64, (0..64).filter(|_| rng.gen_bool(0.5))))
                .collect();
            let c = consensus(&fps, 64);
            for bit in 0..64 {
                let count = fps.iter().filter(|fp| fp.get(bit)).count();
                assert_eq!(c.get(bit), 2 * count > n, "n={n} bit={bit}");
            }
        }
    }

    #[test]
    fn test_threshold_median_and_clamp() {
        let c = Fingerprint::from_bits(8, [0, 1, 2, 3]);
        let fps = vec![
            Fingerprint::from_bits(8, [0, 1, 2, 3]),    // 1.0
            Fingerprint::from_bits(8, [0, 1, 2]),       // 0.75
            Fingerprint::from_bits(8, [0, 1, 2, 3, 4]), // 0.8
            Fingerprint::from_bits(8, [0, 1, 2, 4]),    // 0.6
        ];
        // even count: (0.75 + 0.8) / 2
        assert!((calibrate_threshold(&fps, &c) - 0.775).abs() < 1e-12);
        assert_eq!(calibrate_threshold(&fps[..1], &c), 0.8);
        assert_eq!(calibrate_threshold(&[Fingerprint::new(8)], &c), 0.6);
    }

    #[test]
    fn test_update_dedups() {
        let t = table();
        let mut lib = ReferenceLibrary::generate("T", &["CCO"], FingerprintKind::Ecfp4, 512, &t).unwrap();
        let added = lib.update(&["CCO", "CCN", "CCN", "C(C", "c1ccccc1"], &t);
        assert_eq!(added, 2);
        assert_eq!(lib.source_notations, vec!["CCO", "CCN", "c1ccccc1"]);
        assert_eq!(lib.individual.len(), 3);
        assert_eq!(lib.consensus, consensus(&lib.individual, 512));
        assert_eq!(lib.update(&["CCO"], &t), 0);
    }

    #[test]
    fn test_virtual_library() {
        let features = PocketFeatures { hydrophobic: true, hbond_donor: false, hbond_acceptor: true };
        let lib = ReferenceLibrary::virtual_from_pocket("3CLpro", features, FingerprintKind::Phfp);
        assert_eq!(lib.consensus.on_bits(), vec![5, 10, 30]);
        assert_eq!(lib.calibrated_threshold, 0.7);
        assert_eq!(lib.source_notations, vec!["Virtual_3CLpro"]);
        assert!(lib.is_virtual());
        assert_eq!(lib.fp_length, 512);
    }

    #[test]
    fn test_similarity_to_notation() {
        let t = table();
        let lib = ReferenceLibrary::generate("T", &["CCO"], FingerprintKind::Ecfp4, 512, &t).unwrap();
        assert_eq!(lib.similarity_to_notation("CCO", &t), 1.0);
        assert_eq!(lib.similarity_to_notation("C(C", &t), 0.0);
    }
}
