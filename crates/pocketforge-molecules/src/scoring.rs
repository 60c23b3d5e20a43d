//! Similarity screening and ranking of generated molecules.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::fingerprint::Fingerprint;
use crate::ligand::Molecule;
use crate::reference::ReferenceLibrary;
use pocketforge_common::SimilarityConfig;

/// One candidate that passed the similarity filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    /// Position in the screened batch
    pub index: usize,
    pub similarity: f64,
}

/// A screened molecule handed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub molecule: Molecule,
    /// Tanimoto similarity to the library consensus
    pub similarity: f64,
    pub batch: usize,
    /// Score reported by the sampler, if any
    pub match_score: Option<f64>,
}

/// Keeps candidates strictly above the similarity threshold.
#[derive(Debug, Clone, Default)]
pub struct SimilarityFilter {
    /// Replaces the library's calibrated threshold when set
    pub threshold_override: Option<f64>,
    pub top_k: Option<usize>,
}

impl SimilarityFilter {
    pub fn from_config(config: &SimilarityConfig) -> Self {
        Self {
            threshold_override: config.similarity_threshold_override,
            top_k: config.top_k,
        }
    }

    pub fn threshold(&self, library: &ReferenceLibrary) -> f64 {
        self.threshold_override.unwrap_or(library.calibrated_threshold)
    }

    /// Hits sorted by descending similarity (ties by index), capped at `top_k`.
    pub fn filter(&self, fingerprints: &[Fingerprint], library: &ReferenceLibrary) -> Vec<SimilarityHit> {
        let threshold = self.threshold(library);
        let mut hits: Vec<SimilarityHit> = fingerprints
            .iter()
            .enumerate()
            .map(|(index, fp)| SimilarityHit {
                index,
                similarity: library.similarity_to(fp),
            })
            .filter(|hit| hit.similarity > threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        if let Some(k) = self.top_k {
            hits.truncate(k);
        }
        hits
    }
}

/// Best similarity against any individual reference fingerprint.
pub fn max_similarity(fp: &Fingerprint, library: &ReferenceLibrary) -> f64 {
    library
        .individual
        .iter()
        .map(|reference| fp.tanimoto(reference))
        .fold(0.0, f64::max)
}

/// Rank candidates by similarity, best first.
pub fn rank(mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketforge_common::FingerprintKind;

    fn library(consensus: Fingerprint, threshold: f64) -> ReferenceLibrary {
        ReferenceLibrary {
            target_name: "T".into(),
            fp_kind: FingerprintKind::Ecfp4,
            fp_length: consensus.len(),
            individual: vec![consensus.clone(), Fingerprint::from_bits(consensus.len(), [7])],
            consensus,
            source_notations: vec!["a".into(), "b".into()],
            calibrated_threshold: threshold,
        }
    }

    fn batch() -> Vec<Fingerprint> {
        vec![
            Fingerprint::from_bits(16, [0, 1, 2, 3]), // 1.0
            Fingerprint::from_bits(16, [0, 1]),       // 0.5
            Fingerprint::from_bits(16, [0, 1, 2]),    // 0.75
            Fingerprint::from_bits(16, [0, 1, 2, 3]), // 1.0
            Fingerprint::from_bits(16, [0, 1, 2, 9]), // 0.6
        ]
    }

    #[test]
    fn test_filter_strictly_above_threshold() {
        let lib = library(Fingerprint::from_bits(16, [0, 1, 2, 3]), 0.6);
        let hits = SimilarityFilter::default().filter(&batch(), &lib);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        // 0.6 is not above 0.6
        assert_eq!(order, vec![0, 3, 2]);
    }

    #[test]
    fn test_override_and_top_k() {
        let lib = library(Fingerprint::from_bits(16, [0, 1, 2, 3]), 0.8);
        let filter = SimilarityFilter {
            threshold_override: Some(0.4),
            top_k: Some(2),
        };
        let hits = filter.filter(&batch(), &lib);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 3);
    }

    #[test]
    fn test_max_similarity() {
        let lib = library(Fingerprint::from_bits(16, [0, 1, 2, 3]), 0.6);
        assert_eq!(max_similarity(&Fingerprint::from_bits(16, [7]), &lib), 1.0);
        assert_eq!(max_similarity(&Fingerprint::from_bits(16, [12]), &lib), 0.0);
    }

    #[test]
    fn test_rank() {
        let c = |s: f64| ScoredCandidate {
            molecule: Molecule::new("CC", "test"),
            similarity: s,
            batch: 0,
            match_score: None,
        };
        let ranked = rank(vec![c(0.7), c(0.9), c(0.8)]);
        let sims: Vec<f64> = ranked.iter().map(|r| r.similarity).collect();
        assert_eq!(sims, vec![0.9, 0.8, 0.7]);
    }
}
