//! Geometric element kinds and their reference shape functions.
//!
//! Reference domains:
//!
//! - `Segment2`: the interval `[-1, 1]`.
//! - `Tri3`, `Tri6`: the triangle with corners (-1, -1), (1, -1), (-1, 1).
//!   `Tri6` carries midside nodes in the order (0, 1), (1, 2), (2, 0) and is assumed straight-sided.
//! - `Quad4`: the square `[-1, 1]^2`, nodes counter-clockwise from (-1, -1).
use crate::Real;
use nalgebra::{Matrix2, Point2, Vector2};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Segment2,
    Tri3,
    Tri6,
    Quad4,
}

impl ElementKind {
    /// Number of mesh nodes referenced by the element.
    pub fn node_count(&self) -> usize {
        match self {
            Self::Segment2 => 2,
            Self::Tri3 => 3,
            Self::Tri6 => 6,
            Self::Quad4 => 4,
        }
    }

    /// Number of vertex (corner) nodes. These are always the first nodes of an element.
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Segment2 => 2,
            Self::Tri3 | Self::Tri6 => 3,
            Self::Quad4 => 4,
        }
    }

    /// Dimension of the reference domain.
    pub fn reference_dim(&self) -> usize {
        match self {
            Self::Segment2 => 1,
            Self::Tri3 | Self::Tri6 | Self::Quad4 => 2,
        }
    }

    pub fn is_facet(&self) -> bool {
        self.reference_dim() == 1
    }
}

/// Evaluates the first order (vertex) Lagrange basis of `kind` at `xi`.
///
/// For segments only `xi.x` is used. Output slices must hold exactly `kind.vertex_count()` entries;
/// gradients are taken with respect to the reference coordinates.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn populate_linear_basis<T: Real>(
    kind: ElementKind,
    xi: &Point2<T>,
    values: &mut [T],
    gradients: &mut [Vector2<T>],
) {
    assert_eq!(values.len(), kind.vertex_count());
    assert_eq!(gradients.len(), kind.vertex_count());
    let (x, y) = (xi.x, xi.y);
    match kind {
        ElementKind::Segment2 => {
            values[0] = 0.5 * (1.0 - x);
            values[1] = 0.5 * (1.0 + x);
            gradients[0] = Vector2::new(-0.5, 0.0);
            gradients[1] = Vector2::new(0.5, 0.0);
        }
        ElementKind::Tri3 | ElementKind::Tri6 => {
            values[0] = -0.5 * x - 0.5 * y;
            values[1] = 0.5 * x + 0.5;
            values[2] = 0.5 * y + 0.5;
            gradients[0] = Vector2::new(-0.5, -0.5);
            gradients[1] = Vector2::new(0.5, 0.0);
            gradients[2] = Vector2::new(0.0, 0.5);
        }
        ElementKind::Quad4 => {
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            for (i, &(cx, cy)) in corners.iter().enumerate() {
                values[i] = 0.25 * (1.0 + cx * x) * (1.0 + cy * y);
                gradients[i] = Vector2::new(0.25 * cx * (1.0 + cy * y), 0.25 * cy * (1.0 + cx * x));
            }
        }
    }
}

/// Evaluates the quadratic Lagrange basis of a six-node triangle at `xi`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn populate_tri6_basis<T: Real>(xi: &Point2<T>, values: &mut [T], gradients: &mut [Vector2<T>]) {
    assert_eq!(values.len(), 6);
    assert_eq!(gradients.len(), 6);
    // Barycentric coordinates of the reference triangle and their (constant) gradients
    let l = [-0.5 * (xi.x + xi.y), 0.5 * (xi.x + 1.0), 0.5 * (xi.y + 1.0)];
    let dl = [Vector2::new(-0.5, -0.5), Vector2::new(0.5, 0.0), Vector2::new(0.0, 0.5)];

    for k in 0..3 {
        values[k] = l[k] * (2.0 * l[k] - 1.0);
        gradients[k] = dl[k] * (4.0 * l[k] - 1.0);
    }

    for (m, (a, b)) in [(0, 1), (1, 2), (2, 0)].into_iter().enumerate() {
        values[3 + m] = 4.0 * l[a] * l[b];
        gradients[3 + m] = (dl[a] * l[b] + dl[b] * l[a]) * 4.0;
    }
}

/// The geometric map of a single element evaluated at a reference point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ElementMap<T: Real> {
    /// Physical coordinates of the reference point.
    pub x: Point2<T>,
    /// Determinant of the map Jacobian. For facets this is the length scale `|dx/dxi|`.
    pub det: T,
    /// Inverse transpose of the map Jacobian, used to push reference gradients forward.
    /// For facets it maps the reference derivative onto the (unit) tangent.
    pub inverse_transpose: Matrix2<T>,
}

/// Evaluates the geometric map of an element with the given vertex coordinates.
///
/// Only the vertex nodes enter the map (straight-sided geometry). Returns `None` if the
/// map is degenerate or inverted at `xi`.
pub fn evaluate_element_map<T: Real>(
    kind: ElementKind,
    vertices: &[Point2<T>],
    xi: &Point2<T>,
) -> Option<ElementMap<T>> {
    let n = kind.vertex_count();
    assert_eq!(vertices.len(), n, "Vertex count must match element kind");
    let mut values = [T::zero(); 4];
    let mut gradients = [Vector2::zeros(); 4];
    populate_linear_basis(kind, xi, &mut values[..n], &mut gradients[..n]);

    let mut x = Vector2::zeros();
    let mut jacobian = Matrix2::zeros();
    for (vertex, phi, grad) in itertools::izip!(vertices, &values[..n], &gradients[..n]) {
        x += vertex.coords * *phi;
        jacobian.ger(T::one(), &vertex.coords, grad, T::one());
    }

    if kind.is_facet() {
        let tangent: Vector2<T> = jacobian.column(0).into_owned();
        let length = tangent.norm();
        if length <= T::zero() {
            return None;
        }
        let unit_tangent = tangent / length;
        // d/ds = (1 / |dx/dxi|) d/dxi, directed along the tangent
        let mut inverse_transpose = Matrix2::zeros();
        inverse_transpose.set_column(0, &(unit_tangent / length));
        Some(ElementMap {
            x: Point2::from(x),
            det: length,
            inverse_transpose,
        })
    } else {
        let det = jacobian.determinant();
        if det <= T::zero() {
            return None;
        }
        let inverse = jacobian.try_inverse()?;
        Some(ElementMap {
            x: Point2::from(x),
            det,
            inverse_transpose: inverse.transpose(),
        })
    }
}
