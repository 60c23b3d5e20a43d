//! Binding pocket detection on alpha spheres.

pub mod circumsphere;
pub mod alpha_sphere;
pub mod filter;
pub mod dbscan;
pub mod scorer;
pub mod detector;

pub use alpha_sphere::{AlphaSphere, AlphaSphereGenerator, SphereGeneration, TripleVerdict};
pub use circumsphere::{circumsphere, Circumsphere};
pub use dbscan::{Clustering, Dbscan, SphereState};
pub use detector::{DetectionReport, PocketDetector, PocketFeatures};
pub use filter::SphereFilter;
pub use scorer::{PocketResult, PocketScorer};
