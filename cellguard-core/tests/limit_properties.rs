//! Property tests for limit table construction
//!
//! The interpolated table is the foundation every classification rests
//! on, so its invariants get randomized coverage: bounds stay ordered
//! and inside the calibration envelope for every charge state, and
//! building twice from the same catalog is deterministic.

#![cfg(feature = "std")]

use cellguard_core::catalog::{Catalog, SocLimit};
use cellguard_core::LimitTable;
use proptest::prelude::*;

/// Strategy for a plausible two-point voltage calibration
fn voltage_points() -> impl Strategy<Value = (SocLimit, SocLimit)> {
    (2.5f32..3.4, 0.1f32..0.4, 3.6f32..4.1, 0.1f32..0.4).prop_map(|(lo_min, lo_w, hi_min, hi_w)| {
        (
            SocLimit { soc: 0, min: lo_min, max: lo_min + lo_w },
            SocLimit { soc: 100, min: hi_min, max: hi_min + hi_w },
        )
    })
}

fn catalog_with(points: &[SocLimit]) -> Catalog {
    let mut catalog = Catalog::builtin();
    let mut vec = heapless::Vec::new();
    for p in points {
        vec.push(*p).unwrap();
    }
    catalog.voltage = Some(vec);
    catalog
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn interpolated_bounds_stay_inside_the_calibration_envelope(
        (lo, hi) in voltage_points(),
        soc in 0u8..=100,
    ) {
        let table = LimitTable::build(&catalog_with(&[lo, hi])).unwrap();
        let limits = table.row(soc).voltage.unwrap();

        // Rounding to millivolts may nudge a bound by at most half a step.
        let slack = 0.0005f32;
        prop_assert!(limits.lower >= lo.min.min(hi.min) - slack);
        prop_assert!(limits.lower <= lo.min.max(hi.min) + slack);
        prop_assert!(limits.upper >= lo.max.min(hi.max) - slack);
        prop_assert!(limits.upper <= lo.max.max(hi.max) + slack);
    }

    #[test]
    fn builds_are_deterministic((lo, hi) in voltage_points(), soc in 0u8..=100) {
        let catalog = catalog_with(&[lo, hi]);
        let a = LimitTable::build(&catalog).unwrap();
        let b = LimitTable::build(&catalog).unwrap();
        prop_assert_eq!(a.row(soc).voltage, b.row(soc).voltage);
    }

    #[test]
    fn builtin_table_bounds_are_ordered_everywhere(soc in 0u8..=100) {
        let table = LimitTable::build(&Catalog::builtin()).unwrap();
        let row = table.row(soc);
        let v = row.voltage.unwrap();
        let z = row.impedance.unwrap();
        prop_assert!(v.lower <= v.upper);
        prop_assert!(z.lower <= z.upper);
    }
}
