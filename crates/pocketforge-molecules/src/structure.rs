//! PDB / PDBQT structure loading.

use pocketforge_common::{Atom, PeriodicTable, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Immutable atom collection for one detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtomStore {
    atoms: Vec<Atom>,
}

impl AtomStore {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Atom> {
        self.atoms.iter()
    }

    /// Largest van der Waals radius in the store (0 when empty).
    pub fn max_vdw_radius(&self) -> f64 {
        self.atoms.iter().map(|a| a.vdw_radius).fold(0.0, f64::max)
    }
}

impl From<Vec<Atom>> for AtomStore {
    fn from(atoms: Vec<Atom>) -> Self {
        Self::new(atoms)
    }
}

/// Result of a structure load: the atoms plus the number of skipped records.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub store: AtomStore,
    pub skipped: usize,
}

/// Column layout of the element field.
///
/// PDB keeps a right-justified element symbol in columns 77-78. PDBQT puts an
/// AutoDock atom type in columns 78-79 (`A`, `OA`, `NA`, `HD`, `Cl`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    Pdb,
    Pdbqt,
}

impl StructureFormat {
    /// `.pdbqt` (any case) is PDBQT; everything else is read as PDB.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdbqt") => StructureFormat::Pdbqt,
            _ => StructureFormat::Pdb,
        }
    }

    fn element(self, line: &str) -> Option<String> {
        let field = match self {
            StructureFormat::Pdb => line.get(76..78),
            StructureFormat::Pdbqt => line.get(76..79).or_else(|| line.get(76..78)),
        }?
        .trim();
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(match self {
            StructureFormat::Pdb => title_case(field),
            StructureFormat::Pdbqt => autodock_element(field),
        })
    }
}

/// Reader for ATOM / HETATM records of PDB and PDBQT files.
pub struct StructureLoader {
    table: PeriodicTable,
}

impl Default for StructureLoader {
    fn default() -> Self {
        Self::new(PeriodicTable::standard())
    }
}

impl StructureLoader {
    pub fn new(table: PeriodicTable) -> Self {
        Self { table }
    }

    /// Load a structure file, choosing the layout from its extension.
    /// Only a missing or unreadable file is an error.
    pub async fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadReport> {
        let path = path.as_ref();
        let format = StructureFormat::from_path(path);
        info!(?format, "Loading structure from {:?}", path);
        let text = fs::read_to_string(path).await?;
        Ok(self.parse_as(&text, format))
    }

    /// Parse PDB text.
    pub fn parse_str(&self, text: &str) -> LoadReport {
        self.parse_as(text, StructureFormat::Pdb)
    }

    /// Parse structure text; malformed records are skipped with a warning.
    pub fn parse_as(&self, text: &str, format: StructureFormat) -> LoadReport {
        let mut atoms = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in text.lines().enumerate() {
            if !(line.starts_with("ATOM") || line.starts_with("HETATM")) {
                continue;
            }
            match self.parse_record(atoms.len(), line, format) {
                Some(atom) => atoms.push(atom),
                None => {
                    skipped += 1;
                    warn!(line = line_no + 1, "Skipping malformed atom record: {:?}", line);
                }
            }
        }

        debug!("Parsed {} atoms ({} records skipped)", atoms.len(), skipped);
        LoadReport {
            store: AtomStore::new(atoms),
            skipped,
        }
    }

    fn parse_record(&self, id: usize, line: &str, format: StructureFormat) -> Option<Atom> {
        let coord = |range: std::ops::Range<usize>| -> Option<f64> {
            line.get(range)?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
        };
        let position = [coord(30..38)?, coord(38..46)?, coord(46..54)?];

        let element = format
            .element(line)
            .or_else(|| element_from_atom_name(line.get(12..16)?))?;

        let charge = line
            .get(70..76)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0);

        Some(Atom::from_element(id, &element, position, &self.table).with_charge(charge))
    }
}

/// Element symbol for an AutoDock 4 atom type.
fn autodock_element(ad_type: &str) -> String {
    match ad_type {
        "A" => "C".to_string(),
        "OA" | "OS" => "O".to_string(),
        "NA" | "NS" => "N".to_string(),
        "SA" => "S".to_string(),
        "HD" | "HS" => "H".to_string(),
        other => title_case(other),
    }
}

fn title_case(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Element symbol from a PDB atom name (`" CA "`, `"1HB2"`, `"CL1 "`).
fn element_from_atom_name(name: &str) -> Option<String> {
    let name = name.trim().trim_start_matches(|c: char| c.is_ascii_digit()).to_uppercase();
    if name.starts_with("CL") {
        return Some("Cl".to_string());
    }
    if name.starts_with("BR") {
        return Some("Br".to_string());
    }
    name.chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_string())
}
