//! PocketForge Molecules - pocket detection and candidate screening pipeline.
//!
//! This crate covers both halves of a structure-based design run:
//! 1. Loading macromolecular structures (PDB / PDBQT)
//! 2. Detecting binding pockets (alpha spheres, DBSCAN, pocket scoring)
//! 3. Fingerprinting molecules and building per-target reference libraries
//! 4. Preparing diffusion schedules and conditioning heatmaps
//! 5. Driving batched candidate sampling and similarity screening

pub mod geometry;
pub mod structure;
pub mod pocket;
pub mod smiles;
pub mod ligand;
pub mod fingerprint;
pub mod reference;
pub mod store;
pub mod scoring;
pub mod diffusion;
pub mod heatmap;
pub mod sampler;
pub mod pipeline;

pub use pocketforge_common::{PocketForgeError, Result};
