//! Structure file -> pocket detection -> heatmap and virtual library.

use std::sync::Arc;

use pocketforge_common::{FingerprintKind, HeatmapConfig, PocketConfig};
use pocketforge_molecules::heatmap::HeatmapGenerator;
use pocketforge_molecules::pocket::{PocketDetector, PocketFeatures};
use pocketforge_molecules::reference::{ReferenceLibrary, VIRTUAL_THRESHOLD};
use pocketforge_molecules::structure::{AtomStore, StructureLoader};
use pocketforge_test_utils::{init_tracing, octahedral_cage, random_cloud, tetrahedron, to_pdb};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_cage_from_pdb_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cage.pdb");

    let mut text = to_pdb(&octahedral_cage(5.0));
    text.insert_str(0, "HETATM    0 C    LIG A   1      not-a-number\nREMARK ignored\n");
    tokio::fs::write(&path, text).await.unwrap();

    let loaded = StructureLoader::default().load(&path).await.unwrap();
    assert_eq!(loaded.skipped, 1);
    assert_eq!(loaded.store.len(), 6);

    let detector = Arc::new(PocketDetector::new(PocketConfig::default()));
    let report = detector.detect_async(Arc::new(loaded.store)).await.unwrap();
    assert_eq!(report.spheres_generated, 20);
    assert_eq!(report.pockets.len(), 1);
    let pocket = report.best().unwrap();
    for axis in 0..3 {
        assert!(pocket.center[axis].abs() < 1e-6);
    }

    let features = PocketFeatures::from_pocket(pocket);
    assert_eq!(
        features,
        PocketFeatures {
            hydrophobic: true,
            hbond_donor: false,
            hbond_acceptor: false
        }
    );
    let library = ReferenceLibrary::virtual_from_pocket("CAGE", features, FingerprintKind::Ecfp4);
    assert!(library.is_virtual());
    assert_eq!(library.consensus.on_bits(), vec![1, 10]);
    assert_eq!(library.calibrated_threshold, VIRTUAL_THRESHOLD);
}

#[tokio::test]
async fn test_missing_structure_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(StructureLoader::default().load(dir.path().join("absent.pdb")).await.is_err());
}

#[test]
fn test_tetrahedron_has_no_pockets() {
    let store = AtomStore::new(tetrahedron(3.0, 1.5, 1.0));
    let report = PocketDetector::new(PocketConfig::default()).detect(&store).unwrap();
    assert!(report.pockets.is_empty());
    assert_eq!(report.clusters, 0);
}

#[test]
fn test_heatmap_follows_detected_pocket() {
    let store = AtomStore::new(octahedral_cage(5.0));
    let pocket = PocketDetector::new(PocketConfig::default())
        .detect(&store)
        .unwrap()
        .pockets
        .remove(0);

    let base = HeatmapConfig {
        active_site_center: [40.0, 40.0, 40.0],
        size: 16,
        ..HeatmapConfig::default()
    };
    let generator = HeatmapGenerator::for_pocket(&base, &pocket);
    assert_eq!(generator.config().active_site_center, pocket.center);

    // the centre pixel sees the carbons stacked on the y axis
    let map = generator.generate(&store).unwrap();
    assert!(map.get(8, 8).unwrap()[2] > 0.0);
    // far from the pocket nothing is gathered
    let far = HeatmapGenerator::new(base).generate(&store).unwrap();
    assert!(far.pixels.iter().all(|p| p.iter().all(|&v| v == 0.0)));
}

#[test]
fn test_pockets_are_ranked_and_disjoint() {
    let store = AtomStore::new(random_cloud(3, 120, 22.0));
    let config = PocketConfig {
        dbscan_min_points: 3,
        ..PocketConfig::default()
    };
    let report = PocketDetector::new(config.clone()).detect(&store).unwrap();

    assert!(report.pockets.len() <= config.max_pockets);
    for w in report.pockets.windows(2) {
        assert!(w[0].composite_score >= w[1].composite_score);
    }
    let spheres_in_pockets: usize = report.pockets.iter().map(|p| p.alpha_sphere_count).sum();
    assert!(spheres_in_pockets <= report.spheres_kept);
    for p in &report.pockets {
        assert!(p.volume >= config.min_pocket_volume);
        assert!((p.hydrophobic_score + p.polar_score - 1.0).abs() < 1e-9);
    }
}
