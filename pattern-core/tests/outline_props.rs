//! Ring invariants of the outline extractor over arbitrary point clouds.

use geo::Validation;
use geo_types::Coord;
use proptest::prelude::*;

use pattern_core::config::HullMode;
use pattern_core::outline::{OutlineConfig, extract_outline};

/// Clouds inside a 100 x 60 box, the shape of a typical flattened mesh.
fn arb_cloud() -> impl Strategy<Value = Vec<Coord<f64>>> {
    prop::collection::vec((0.0f64..100.0, 0.0f64..60.0), 20..300)
        .prop_map(|pts| pts.into_iter().map(|(x, y)| Coord { x, y }).collect())
}

fn arb_mode() -> impl Strategy<Value = HullMode> {
    prop_oneof![Just(HullMode::Convex), Just(HullMode::Concave)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_ring_is_simple_and_closed(
        pts in arb_cloud(),
        mode in arb_mode(),
        tightness in 0.05f64..1.0,
        concavity in 0.5f64..3.0,
    ) {
        let cfg = OutlineConfig { mode, tightness, concavity };
        // Sparse clouds may legitimately fail; only successful outlines are checked.
        if let Ok(outline) = extract_outline(&pts, &cfg) {
            prop_assert!(!outline.is_empty());
            for poly in &outline.to_multi_polygon() {
                prop_assert!(poly.exterior().is_closed());
                prop_assert!(poly.exterior().0.len() >= 4);
                prop_assert!(poly.is_valid(), "{:?}: {:?}", mode, poly.exterior());
            }
        }
    }
}
