//! pocketforge-common: shared types, errors and configuration used across all PocketForge crates.

pub mod error;
pub mod entities;
pub mod config;

// Re-export commonly used types
pub use config::{
    FingerprintConfig, HeatmapConfig, PocketConfig, PocketForgeConfig, SamplingConfig,
    ScheduleConfig, SimilarityConfig,
};
pub use entities::{Atom, ElementProps, FingerprintKind, PeriodicTable};
pub use error::{DegenerateKind, PocketForgeError, Result};
