use draw_rs::core::{AffineMatrix, ComposeMode, MatrixComponents};
use proptest::prelude::*;

fn well_conditioned() -> impl Strategy<Value = AffineMatrix> {
    (
        0.5f64..4.0,
        -0.4f64..0.4,
        -0.4f64..0.4,
        0.5f64..4.0,
        -100.0f64..100.0,
        -100.0f64..100.0,
    )
        .prop_map(|(xx, xy, yx, yy, dx, dy)| AffineMatrix::new(xx, xy, yx, yy, dx, dy))
}

fn any_matrix() -> impl Strategy<Value = AffineMatrix> {
    prop::array::uniform6(-10.0f64..10.0).prop_map(AffineMatrix::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn inverse_round_trips_points(
        matrix in well_conditioned(),
        x in -100.0f64..100.0,
        y in -100.0f64..100.0,
    ) {
        let (mx, my) = matrix.transform_point((x, y));
        let (bx, by) = matrix.inverse().transform_point((mx, my));
        prop_assert!((bx - x).abs() <= 1e-9);
        prop_assert!((by - y).abs() <= 1e-9);
    }

    #[test]
    fn decompose_then_recompose_is_stable(
        translate_x in -100.0f64..100.0,
        translate_y in -100.0f64..100.0,
        scale_x in 0.1f64..10.0,
        scale_y in 0.1f64..10.0,
        rotation in -3.0f64..3.0,
    ) {
        let components = MatrixComponents { translate_x, translate_y, scale_x, scale_y, rotation };
        let decomposed = components.to_matrix().decompose();
        prop_assert!((decomposed.translate_x - translate_x).abs() <= 1e-9);
        prop_assert!((decomposed.translate_y - translate_y).abs() <= 1e-9);
        prop_assert!((decomposed.scale_x - scale_x).abs() <= 1e-9);
        prop_assert!((decomposed.scale_y - scale_y).abs() <= 1e-9);
        prop_assert!((decomposed.rotation - rotation).abs() <= 1e-9);
    }

    #[test]
    fn compose_modes_order_the_mappings(
        a in any_matrix(),
        b in any_matrix(),
        x in -10.0f64..10.0,
        y in -10.0f64..10.0,
    ) {
        let mut local = a;
        local.compose(&b, ComposeMode::Prepend);
        let expected_local = a.transform_point(b.transform_point((x, y)));
        let actual_local = local.transform_point((x, y));
        prop_assert!((actual_local.0 - expected_local.0).abs() <= 1e-9);
        prop_assert!((actual_local.1 - expected_local.1).abs() <= 1e-9);

        let mut world = a;
        world.compose(&b, ComposeMode::Append);
        let expected_world = b.transform_point(a.transform_point((x, y)));
        let actual_world = world.transform_point((x, y));
        prop_assert!((actual_world.0 - expected_world.0).abs() <= 1e-9);
        prop_assert!((actual_world.1 - expected_world.1).abs() <= 1e-9);
    }
}
