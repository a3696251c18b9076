//! Basic procedural mesh generation routines.
use crate::element::ElementKind;
use crate::mesh::{BoundaryId, Element, ElementRole, Mesh, SubdomainId};
use crate::Real;
use nalgebra::Point2;
use std::collections::BTreeMap;

pub const BOUNDARY_BOTTOM: BoundaryId = 0;
pub const BOUNDARY_RIGHT: BoundaryId = 1;
pub const BOUNDARY_TOP: BoundaryId = 2;
pub const BOUNDARY_LEFT: BoundaryId = 3;

/// Vertices of a uniform grid over `[0, 1]^2`, numbered row by row from the bottom left corner.
fn unit_square_grid_vertices<T: Real>(cells_per_dim: usize) -> Vec<Point2<T>> {
    let n = T::from_usize(cells_per_dim).expect("Must be able to fit usize in T");
    let mut vertices = Vec::with_capacity((cells_per_dim + 1) * (cells_per_dim + 1));
    for j in 0..=cells_per_dim {
        for i in 0..=cells_per_dim {
            let x = T::from_usize(i).expect("Must be able to fit usize in T") / n;
            let y = T::from_usize(j).expect("Must be able to fit usize in T") / n;
            vertices.push(Point2::new(x, y));
        }
    }
    vertices
}

/// Boundary segments of the unit square grid, oriented counter-clockwise around the domain.
fn unit_square_boundary_elements(cells_per_dim: usize) -> Vec<Element> {
    let n = cells_per_dim;
    let vertex = |i: usize, j: usize| (n + 1) * j + i;
    let mut elements = Vec::with_capacity(4 * n);
    for i in 0..n {
        elements.push(Element::boundary([vertex(i, 0), vertex(i + 1, 0)], 0, BOUNDARY_BOTTOM));
    }
    for j in 0..n {
        elements.push(Element::boundary([vertex(n, j), vertex(n, j + 1)], 0, BOUNDARY_RIGHT));
    }
    for i in (0..n).rev() {
        elements.push(Element::boundary([vertex(i + 1, n), vertex(i, n)], 0, BOUNDARY_TOP));
    }
    for j in (0..n).rev() {
        elements.push(Element::boundary([vertex(0, j + 1), vertex(0, j)], 0, BOUNDARY_LEFT));
    }
    elements
}

/// A uniform quadrilateral mesh of the unit square in subdomain 0.
///
/// Volume elements come first, followed by the boundary segments of the four sides
/// ([`BOUNDARY_BOTTOM`], [`BOUNDARY_RIGHT`], [`BOUNDARY_TOP`], [`BOUNDARY_LEFT`]).
pub fn create_unit_square_uniform_quad_mesh_2d<T: Real>(cells_per_dim: usize) -> Mesh<T> {
    assert!(cells_per_dim > 0, "Need at least one cell per dimension");
    let n = cells_per_dim;
    let vertex = |i: usize, j: usize| (n + 1) * j + i;
    let mut elements = Vec::with_capacity(n * n + 4 * n);
    for j in 0..n {
        for i in 0..n {
            let nodes = vec![vertex(i, j), vertex(i + 1, j), vertex(i + 1, j + 1), vertex(i, j + 1)];
            elements.push(Element::volume(ElementKind::Quad4, nodes, 0));
        }
    }
    elements.extend(unit_square_boundary_elements(n));
    Mesh::from_vertices_and_elements(unit_square_grid_vertices(n), elements)
}

/// A uniform triangle mesh of the unit square, obtained by splitting every grid cell along
/// its diagonal. Boundary segments follow the volume elements as for the quad mesh.
pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> Mesh<T> {
    assert!(cells_per_dim > 0, "Need at least one cell per dimension");
    let n = cells_per_dim;
    let vertex = |i: usize, j: usize| (n + 1) * j + i;
    let mut elements = Vec::with_capacity(2 * n * n + 4 * n);
    for j in 0..n {
        for i in 0..n {
            let (a, b, c, d) = (vertex(i, j), vertex(i + 1, j), vertex(i + 1, j + 1), vertex(i, j + 1));
            elements.push(Element::volume(ElementKind::Tri3, vec![a, b, c], 0));
            elements.push(Element::volume(ElementKind::Tri3, vec![a, c, d], 0));
        }
    }
    elements.extend(unit_square_boundary_elements(n));
    Mesh::from_vertices_and_elements(unit_square_grid_vertices(n), elements)
}

/// Assigns `subdomain` to every volume element whose centroid satisfies `predicate`.
///
/// Boundary facets inherit the subdomain of the volume element they bound.
pub fn assign_subdomain<T, F>(mesh: &mut Mesh<T>, subdomain: SubdomainId, predicate: F)
where
    T: Real,
    F: Fn(&Point2<T>) -> bool,
{
    let mut vertices = Vec::new();
    let mut selected = Vec::new();
    for (index, element) in mesh.elements().iter().enumerate() {
        if element.role() == ElementRole::Volume {
            mesh.populate_element_vertices(index, &mut vertices);
            let sum = vertices
                .iter()
                .fold(Point2::origin(), |acc: Point2<T>, v| acc + v.coords);
            let count = T::from_usize(vertices.len()).expect("Must be able to fit usize in T");
            if predicate(&(sum / count)) {
                selected.push(index);
            }
        }
    }

    let facet_parents = facet_to_volume_elements(mesh);
    let elements = mesh.elements_mut();
    for &index in &selected {
        elements[index].subdomain = subdomain;
    }
    for index in 0..elements.len() {
        if let ElementRole::Boundary(_) = elements[index].role() {
            let key = edge_key(elements[index].vertex_nodes());
            if let Some(&[parent, ..]) = facet_parents.get(&key).map(Vec::as_slice) {
                elements[index].subdomain = elements[parent].subdomain;
            }
        }
    }
}

/// Adds an interface facet with the given boundary id for every edge shared by two volume
/// elements. Returns the index of the first added element.
///
/// The facet is oriented as the edge appears in the lower-numbered neighbor, which also
/// determines the subdomain of the facet.
pub fn add_interior_interfaces<T: Real>(mesh: &mut Mesh<T>, boundary: BoundaryId) -> usize {
    let facet_parents = facet_to_volume_elements(mesh);
    let mut interfaces = Vec::new();
    for (_, parents) in facet_parents {
        if let [first, second] = parents[..] {
            let nodes = oriented_edge(mesh.element(first), mesh.element(second));
            let subdomain = mesh.element(first).subdomain();
            interfaces.push(Element::interface(nodes, subdomain, boundary, [first, second]));
        }
    }
    mesh.extend_elements(interfaces)
}

fn edge_key(nodes: &[usize]) -> (usize, usize) {
    (nodes[0].min(nodes[1]), nodes[0].max(nodes[1]))
}

fn element_edges(element: &Element) -> impl Iterator<Item = [usize; 2]> + '_ {
    let vertices = element.vertex_nodes();
    let n = vertices.len();
    (0..n).map(move |i| [vertices[i], vertices[(i + 1) % n]])
}

fn oriented_edge(first: &Element, second: &Element) -> [usize; 2] {
    let shared: Vec<_> = element_edges(first)
        .filter(|edge| {
            element_edges(second).any(|other| edge_key(&other) == edge_key(edge))
        })
        .collect();
    shared[0]
}

fn facet_to_volume_elements<T: Real>(mesh: &Mesh<T>) -> BTreeMap<(usize, usize), Vec<usize>> {
    let mut map: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for (index, element) in mesh.elements().iter().enumerate() {
        if element.role() == ElementRole::Volume {
            for edge in element_edges(element) {
                map.entry(edge_key(&edge)).or_default().push(index);
            }
        }
    }
    map
}
