//! Mesh topology consumed by the assembly engine.
//!
//! The mesh owns its elements. Volume elements carry a subdomain id, boundary facets in addition
//! carry a boundary id, and interface facets carry a boundary id together with the two volume
//! elements they separate.
use crate::element::ElementKind;
use crate::Real;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

pub mod procedural;

pub type SubdomainId = usize;
pub type BoundaryId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    kind: ElementKind,
    nodes: Vec<usize>,
    subdomain: SubdomainId,
    boundary: Option<BoundaryId>,
    neighbors: Option<[usize; 2]>,
}

/// The role an element plays during assembly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ElementRole {
    Volume,
    Boundary(BoundaryId),
    Interface { boundary: BoundaryId, neighbors: [usize; 2] },
}

impl Element {
    pub fn volume(kind: ElementKind, nodes: Vec<usize>, subdomain: SubdomainId) -> Self {
        assert!(!kind.is_facet(), "Volume elements must have a two-dimensional reference domain");
        assert_eq!(nodes.len(), kind.node_count(), "Node count must match element kind");
        Self {
            kind,
            nodes,
            subdomain,
            boundary: None,
            neighbors: None,
        }
    }

    /// A boundary facet. `subdomain` is the subdomain of the volume element it bounds.
    pub fn boundary(nodes: [usize; 2], subdomain: SubdomainId, boundary: BoundaryId) -> Self {
        Self {
            kind: ElementKind::Segment2,
            nodes: nodes.to_vec(),
            subdomain,
            boundary: Some(boundary),
            neighbors: None,
        }
    }

    /// An interface facet shared by the volume elements `neighbors[0]` and `neighbors[1]`.
    pub fn interface(
        nodes: [usize; 2],
        subdomain: SubdomainId,
        boundary: BoundaryId,
        neighbors: [usize; 2],
    ) -> Self {
        Self {
            kind: ElementKind::Segment2,
            nodes: nodes.to_vec(),
            subdomain,
            boundary: Some(boundary),
            neighbors: Some(neighbors),
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn vertex_nodes(&self) -> &[usize] {
        &self.nodes[..self.kind.vertex_count()]
    }

    pub fn subdomain(&self) -> SubdomainId {
        self.subdomain
    }

    pub fn boundary_id(&self) -> Option<BoundaryId> {
        self.boundary
    }

    pub fn neighbors(&self) -> Option<[usize; 2]> {
        self.neighbors
    }

    pub fn role(&self) -> ElementRole {
        match (self.boundary, self.neighbors) {
            (None, _) => ElementRole::Volume,
            (Some(boundary), None) => ElementRole::Boundary(boundary),
            (Some(boundary), Some(neighbors)) => ElementRole::Interface { boundary, neighbors },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh<T: Real> {
    vertices: Vec<Point2<T>>,
    elements: Vec<Element>,
    revision: u64,
}

impl<T: Real> Mesh<T> {
    pub fn from_vertices_and_elements(vertices: Vec<Point2<T>>, elements: Vec<Element>) -> Self {
        let mesh = Self {
            vertices,
            elements,
            revision: 0,
        };
        mesh.check_connectivity();
        mesh
    }

    fn check_connectivity(&self) {
        for (index, element) in self.elements.iter().enumerate() {
            for &node in element.nodes() {
                assert!(
                    node < self.vertices.len(),
                    "Element {} references node {} which is out of bounds",
                    index,
                    node
                );
            }
            if let Some(neighbors) = element.neighbors() {
                for neighbor in neighbors {
                    let is_volume = self
                        .elements
                        .get(neighbor)
                        .map(|e| e.role() == ElementRole::Volume)
                        .unwrap_or(false);
                    assert!(
                        is_volume,
                        "Interface element {} must neighbor two volume elements",
                        index
                    );
                }
            }
        }
    }

    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// A counter that changes whenever the topology or geometry of the mesh is modified.
    ///
    /// Structures derived from the mesh (such as a [`DofMap`](crate::dofs::DofMap)) record the
    /// revision they were built from, so that stale derived data can be detected.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mutable access to vertex coordinates. Counts as a mesh modification.
    pub fn vertices_mut(&mut self) -> &mut [Point2<T>] {
        self.revision += 1;
        &mut self.vertices
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [Element] {
        self.revision += 1;
        &mut self.elements
    }

    pub fn push_element(&mut self, element: Element) -> usize {
        self.revision += 1;
        self.elements.push(element);
        self.check_connectivity();
        self.elements.len() - 1
    }

    /// Appends the given elements to the mesh, returning the index of the first new element.
    pub fn extend_elements(&mut self, elements: impl IntoIterator<Item = Element>) -> usize {
        self.revision += 1;
        let first = self.elements.len();
        self.elements.extend(elements);
        self.check_connectivity();
        first
    }

    /// Collects the coordinates of the vertex nodes of the given element.
    pub fn populate_element_vertices(&self, element_index: usize, output: &mut Vec<Point2<T>>) {
        output.clear();
        output.extend(
            self.elements[element_index]
                .vertex_nodes()
                .iter()
                .map(|&node| self.vertices[node]),
        );
    }
}
