/// Core entity types shared by the pocket and fingerprint pipelines.
/// Element lookup tables live in an immutable `PeriodicTable` value that is
/// passed to whoever needs it, never in process-wide mutable state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// Per-element physical and chemical attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementProps {
    pub symbol: String,
    pub atomic_number: u8,
    /// Van der Waals radius in Å (fpocket table)
    pub vdw_radius: f64,
    /// Hydrophobic weight in [0, 1]
    pub hydrophobicity: f64,
}

/// Radius and weight used for any element missing from the table.
pub const FALLBACK_VDW_RADIUS: f64 = 1.60;
pub const FALLBACK_HYDROPHOBICITY: f64 = 0.0;
/// Fingerprint feature weight for atomic numbers without an explicit entry.
pub const DEFAULT_FEATURE_WEIGHT: i32 = 10;

/// Immutable element lookup table.
#[derive(Debug, Clone)]
pub struct PeriodicTable {
    by_symbol: HashMap<String, ElementProps>,
    by_number: HashMap<u8, String>,
    feature_weights: HashMap<u8, i32>,
}

impl Default for PeriodicTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl PeriodicTable {
    /// An empty table: every lookup falls back.
    pub fn empty() -> Self {
        Self {
            by_symbol: HashMap::new(),
            by_number: HashMap::new(),
            feature_weights: HashMap::new(),
        }
    }

    /// The standard table: fpocket radii and hydrophobic weights, plus the
    /// circular fingerprint feature weights.
    pub fn standard() -> Self {
        let rows: [(&str, u8, f64, f64); 19] = [
            ("H", 1, 1.20, 1.0),
            ("B", 5, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("C", 6, 1.70, 1.0),
            ("N", 7, 1.55, 0.0),
            ("O", 8, 1.52, 0.0),
            ("F", 9, 1.47, 0.8),
            ("Na", 11, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Mg", 12, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Si", 14, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("P", 15, 1.80, 0.1),
            ("S", 16, 1.80, 0.2),
            ("Cl", 17, 1.75, 0.7),
            ("K", 19, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Ca", 20, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Fe", 26, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Zn", 30, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Se", 34, FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
            ("Br", 35, 1.85, 0.6),
            ("I", 53, 1.98, 0.5),
        ];

        let mut table = Self::empty();
        for (symbol, atomic_number, vdw_radius, hydrophobicity) in rows {
            table = table.with_element(ElementProps {
                symbol: symbol.to_string(),
                atomic_number,
                vdw_radius,
                hydrophobicity,
            });
        }

        for (atomic_number, weight) in [(1u8, 1), (6, 10), (7, 20), (8, 30), (9, 40), (16, 50), (17, 60)] {
            table = table.with_feature_weight(atomic_number, weight);
        }
        table
    }

    /// Add or replace an element.
    pub fn with_element(mut self, props: ElementProps) -> Self {
        self.by_number.insert(props.atomic_number, props.symbol.clone());
        self.by_symbol.insert(props.symbol.to_uppercase(), props);
        self
    }

    /// Override the fingerprint feature weight of one atomic number.
    pub fn with_feature_weight(mut self, atomic_number: u8, weight: i32) -> Self {
        self.feature_weights.insert(atomic_number, weight);
        self
    }

    /// Case-insensitive lookup by symbol.
    pub fn lookup(&self, symbol: &str) -> Option<&ElementProps> {
        self.by_symbol.get(&symbol.trim().to_uppercase())
    }

    pub fn atomic_number(&self, symbol: &str) -> Option<u8> {
        self.lookup(symbol).map(|e| e.atomic_number)
    }

    pub fn symbol(&self, atomic_number: u8) -> Option<&str> {
        self.by_number.get(&atomic_number).map(String::as_str)
    }

    pub fn vdw_radius(&self, symbol: &str) -> f64 {
        self.lookup(symbol).map_or(FALLBACK_VDW_RADIUS, |e| e.vdw_radius)
    }

    pub fn hydrophobicity(&self, symbol: &str) -> f64 {
        self.lookup(symbol).map_or(FALLBACK_HYDROPHOBICITY, |e| e.hydrophobicity)
    }

    /// Radius-0 feature weight of the circular fingerprint.
    pub fn feature_weight(&self, atomic_number: u8) -> i32 {
        self.feature_weights
            .get(&atomic_number)
            .copied()
            .unwrap_or(DEFAULT_FEATURE_WEIGHT)
    }
}

// ---------------------------------------------------------------------------
// Fingerprint kinds
// ---------------------------------------------------------------------------

/// Fingerprint family used for a reference library and its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintKind {
    /// Circular (Morgan) fingerprint, radius 2
    #[default]
    Ecfp4,
    /// Pharmacophore feature fingerprint
    Phfp,
    /// Simple topology counts
    Stfp,
    /// First half ECFP4, second half PHFP
    FusedEcfp4Phfp,
}

impl FingerprintKind {
    /// Upper-case tag used in library file names.
    pub fn tag(&self) -> &'static str {
        match self {
            FingerprintKind::Ecfp4 => "ECFP4",
            FingerprintKind::Phfp => "PHFP",
            FingerprintKind::Stfp => "STFP",
            FingerprintKind::FusedEcfp4Phfp => "FUSED_ECFP4_PHFP",
        }
    }
}

impl std::fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// One atom of a macromolecule. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub id: usize,
    pub element: String,
    /// Cartesian position in Å
    pub position: [f64; 3],
    pub vdw_radius: f64,
    pub hydrophobicity: f64,
    /// Partial charge (PDBQT), 0 when unknown
    #[serde(default)]
    pub charge: f64,
}

impl Atom {
    /// Build an atom whose radius and hydrophobicity come from the table.
    pub fn from_element(id: usize, symbol: &str, position: [f64; 3], table: &PeriodicTable) -> Self {
        let (element, vdw_radius, hydrophobicity) = match table.lookup(symbol) {
            Some(props) => (props.symbol.clone(), props.vdw_radius, props.hydrophobicity),
            None => (symbol.trim().to_string(), FALLBACK_VDW_RADIUS, FALLBACK_HYDROPHOBICITY),
        };
        Self {
            id,
            element,
            position,
            vdw_radius,
            hydrophobicity,
            charge: 0.0,
        }
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }

    /// Euclidean distance from this atom's centre to `point`.
    pub fn distance_to(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}
