//! Quadrature rules on the reference domains of [`ElementKind`].
//!
//! Weights sum to the measure of the reference domain (2 for segments and triangles,
//! 4 for quadrilaterals). Points of segment rules have a zero `y` coordinate.
use crate::element::ElementKind;
use crate::Real;
use itertools::iproduct;
use nalgebra::Point2;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

pub type QuadraturePair<T> = (Vec<T>, Vec<Point2<T>>);

/// Polynomial degree that element quadrature rules must integrate exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuadratureOrder(pub usize);

impl Default for QuadratureOrder {
    fn default() -> Self {
        Self(2)
    }
}

/// Returns a rule for `kind` that is exact for polynomials of degree `order` (capped at the
/// strongest rule available: degree 4 on triangles, degree 5 on segments and quads).
pub fn element_quadrature<T: Real>(kind: ElementKind, order: QuadratureOrder) -> QuadraturePair<T> {
    let degree = order.0;
    match kind {
        ElementKind::Segment2 => {
            let (weights, points) = gauss(gauss_points_for_degree(degree));
            let points = points.into_iter().map(|x| Point2::new(x, T::zero())).collect();
            (weights, points)
        }
        ElementKind::Quad4 => {
            let (weights_1d, points_1d) = gauss::<T>(gauss_points_for_degree(degree));
            let n = weights_1d.len();
            let weights = iproduct!(0..n, 0..n)
                .map(|(j, i)| weights_1d[i] * weights_1d[j])
                .collect();
            let points = iproduct!(0..n, 0..n)
                .map(|(j, i)| Point2::new(points_1d[i], points_1d[j]))
                .collect();
            (weights, points)
        }
        ElementKind::Tri3 | ElementKind::Tri6 => triangle(degree),
    }
}

fn gauss_points_for_degree(degree: usize) -> usize {
    // An n-point Gauss rule is exact for degree 2n - 1
    ((degree + 2) / 2).clamp(1, 3)
}

/// Gauss-Legendre rule on `[-1, 1]` with 1, 2 or 3 points.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn gauss<T: Real>(num_points: usize) -> (Vec<T>, Vec<T>) {
    match num_points {
        1 => (vec![2.0], vec![0.0]),
        2 => {
            let three: T = 3.0;
            let a = 1.0 / three.sqrt();
            (vec![1.0, 1.0], vec![-a, a])
        }
        3 => {
            let a_squared: T = 0.6;
            let a = a_squared.sqrt();
            (vec![5.0 / 9.0, 8.0 / 9.0, 5.0 / 9.0], vec![-a, 0.0, a])
        }
        _ => panic!("No Gauss rule with {} points available", num_points),
    }
}

/// Maps barycentric coordinates to the reference triangle.
fn from_barycentric<T: Real>(l1: T, l2: T, l3: T) -> Point2<T> {
    // Corners (-1, -1), (1, -1), (-1, 1)
    Point2::new(-l1 + l2 - l3, -l1 - l2 + l3)
}

/// Symmetric triangle rules of degree 1, 2 and 4.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn triangle<T: Real>(degree: usize) -> QuadraturePair<T> {
    // Weights below are normalized to unit area and scaled by the reference area (2)
    let mut weights = Vec::new();
    let mut points = Vec::new();
    let mut push_orbit = |w: T, a: T, b: T| {
        for (l1, l2, l3) in [(a, b, b), (b, a, b), (b, b, a)] {
            weights.push(2.0 * w);
            points.push(from_barycentric(l1, l2, l3));
        }
    };

    match degree {
        0 | 1 => {
            let third = 1.0 / 3.0;
            return (vec![2.0], vec![from_barycentric(third, third, third)]);
        }
        2 => push_orbit(1.0 / 3.0, 2.0 / 3.0, 1.0 / 6.0),
        _ => {
            push_orbit(0.223381589678011, 0.108103018168070, 0.445948490915965);
            push_orbit(0.109951743655322, 0.816847572980459, 0.091576213509771);
        }
    }
    (weights, points)
}
