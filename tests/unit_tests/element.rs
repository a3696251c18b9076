use femcore::element::{evaluate_element_map, populate_linear_basis, populate_tri6_basis, ElementKind};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix2, Point2, Vector2};
use proptest::prelude::*;

fn reference_point() -> impl Strategy<Value = Point2<f64>> {
    [-1.0..1.0, -1.0..1.0].prop_map(|[x, y]| Point2::new(x, y))
}

#[test]
fn node_and_vertex_counts() {
    assert_eq!(ElementKind::Segment2.node_count(), 2);
    assert_eq!(ElementKind::Tri6.node_count(), 6);
    assert_eq!(ElementKind::Tri6.vertex_count(), 3);
    assert_eq!(ElementKind::Quad4.vertex_count(), 4);
    assert!(ElementKind::Segment2.is_facet());
    assert!(!ElementKind::Quad4.is_facet());
}

#[test]
fn tri6_basis_is_nodal() {
    let nodes = [
        Point2::new(-1.0, -1.0),
        Point2::new(1.0, -1.0),
        Point2::new(-1.0, 1.0),
        Point2::new(0.0, -1.0),
        Point2::new(0.0, 0.0),
        Point2::new(-1.0, 0.0),
    ];
    let mut values = [0.0; 6];
    let mut gradients = [Vector2::zeros(); 6];
    for (j, node) in nodes.iter().enumerate() {
        populate_tri6_basis(node, &mut values, &mut gradients);
        for (i, value) in values.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_scalar_eq!(*value, expected, comp = abs, tol = 1e-14);
        }
    }
}

#[test]
fn triangle_map_of_unit_triangle() {
    let vertices = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
    let map = evaluate_element_map(ElementKind::Tri3, &vertices, &Point2::new(-1.0, -1.0)).unwrap();
    assert_scalar_eq!(map.det, 0.25, comp = abs, tol = 1e-14);
    assert_matrix_eq!(map.x.coords, Vector2::new(0.0, 0.0), comp = abs, tol = 1e-14);
    assert_matrix_eq!(map.inverse_transpose, Matrix2::new(2.0, 0.0, 0.0, 2.0), comp = abs, tol = 1e-14);
}

#[test]
fn inverted_and_degenerate_elements_have_no_map() {
    let clockwise = [Point2::new(0.0, 0.0), Point2::new(0.0, 1.0), Point2::new(1.0, 0.0)];
    assert!(evaluate_element_map(ElementKind::Tri3, &clockwise, &Point2::origin()).is_none());

    let collinear = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];
    assert!(evaluate_element_map(ElementKind::Tri3, &collinear, &Point2::origin()).is_none());

    let point = [Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)];
    assert!(evaluate_element_map(ElementKind::Segment2, &point, &Point2::origin()).is_none());
}

#[test]
fn segment_map_measures_half_length_and_tangential_gradients() {
    let vertices = [Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)];
    let map = evaluate_element_map(ElementKind::Segment2, &vertices, &Point2::new(0.5, 0.0)).unwrap();
    assert_scalar_eq!(map.det, 2.5, comp = abs, tol = 1e-14);
    assert_matrix_eq!(map.x.coords, Vector2::new(2.25, 3.0), comp = abs, tol = 1e-14);

    // The physical gradient of the second basis function is the unit tangent divided by the length
    let gradient = map.inverse_transpose * Vector2::new(0.5, 0.0);
    assert_matrix_eq!(gradient, Vector2::new(0.6 / 5.0, 0.8 / 5.0), comp = abs, tol = 1e-14);
}

proptest! {
    #[test]
    fn linear_bases_form_partition_of_unity(xi in reference_point()) {
        for kind in [ElementKind::Segment2, ElementKind::Tri3, ElementKind::Quad4] {
            let n = kind.vertex_count();
            let mut values = vec![0.0; n];
            let mut gradients = vec![Vector2::zeros(); n];
            populate_linear_basis(kind, &xi, &mut values, &mut gradients);
            let value_sum: f64 = values.iter().sum();
            let gradient_sum: Vector2<f64> = gradients.iter().sum();
            prop_assert!((value_sum - 1.0).abs() < 1e-12);
            prop_assert!(gradient_sum.norm() < 1e-12);
        }
    }

    #[test]
    fn tri6_basis_forms_partition_of_unity(xi in reference_point()) {
        let mut values = [0.0; 6];
        let mut gradients = [Vector2::zeros(); 6];
        populate_tri6_basis(&xi, &mut values, &mut gradients);
        let value_sum: f64 = values.iter().sum();
        let gradient_sum: Vector2<f64> = gradients.iter().sum();
        prop_assert!((value_sum - 1.0).abs() < 1e-12);
        prop_assert!(gradient_sum.norm() < 1e-12);
    }
}
