//! Mapping between element-local shape functions and global degrees of freedom.
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::mesh::{ElementRole, Mesh};
use crate::variable::{FeFamily, FeOrder, Variable, VariableId, VariableSet};
use crate::Real;
use std::ops::Range;

/// The geometric entity a degree of freedom is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DofEntity {
    Node(usize),
    Element(usize),
}

/// Global numbering of the degrees of freedom of all variables.
///
/// Numbering is blocked by variable: all degrees of freedom of variable 0 come first, then
/// those of variable 1 and so on. Within a block, nodal degrees of freedom are ordered by node
/// index and element degrees of freedom by element index.
///
/// The map is immutable once built and may be shared freely between threads. It records the
/// [revision](Mesh::revision) of the mesh it was built from; it must be rebuilt after the mesh
/// changes.
#[derive(Debug, Clone)]
pub struct DofMap {
    variables: Vec<Variable>,
    mesh_revision: u64,
    /// For every variable, the global dof of each mesh node (Lagrange) or element (Monomial).
    entity_dofs: Vec<Vec<Option<usize>>>,
    ranges: Vec<Range<usize>>,
    entities: Vec<(VariableId, DofEntity)>,
}

impl DofMap {
    pub fn build<T: Real>(mesh: &Mesh<T>, variables: &VariableSet) -> Self {
        let mut entity_dofs = Vec::with_capacity(variables.len());
        let mut ranges = Vec::with_capacity(variables.len());
        let mut entities = Vec::new();

        for (id, variable) in variables.iter() {
            let fe_type = variable.fe_type();
            let first_dof = entities.len();
            let dofs = match fe_type.family {
                FeFamily::Lagrange => {
                    let mut supported = vec![false; mesh.num_vertices()];
                    for element in mesh.elements() {
                        let compatible = fe_type.shape_count(element.kind(), false).is_some();
                        if element.role() == ElementRole::Volume
                            && compatible
                            && variable.is_active_on(element.subdomain())
                        {
                            let nodes = match fe_type.order {
                                FeOrder::Second => element.nodes(),
                                _ => element.vertex_nodes(),
                            };
                            for &node in nodes {
                                supported[node] = true;
                            }
                        }
                    }
                    supported
                        .into_iter()
                        .enumerate()
                        .map(|(node, is_supported)| {
                            is_supported.then(|| {
                                entities.push((id, DofEntity::Node(node)));
                                entities.len() - 1
                            })
                        })
                        .collect()
                }
                FeFamily::Monomial => mesh
                    .elements()
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        let has_dof = element.role() == ElementRole::Volume
                            && fe_type.shape_count(element.kind(), false).is_some()
                            && variable.is_active_on(element.subdomain());
                        has_dof.then(|| {
                            entities.push((id, DofEntity::Element(index)));
                            entities.len() - 1
                        })
                    })
                    .collect(),
            };
            entity_dofs.push(dofs);
            ranges.push(first_dof..entities.len());
            log::trace!(
                "Numbered {} dofs for variable '{}'",
                entities.len() - first_dof,
                variable.name()
            );
        }

        Self {
            variables: variables.iter().map(|(_, v)| v.clone()).collect(),
            mesh_revision: mesh.revision(),
            entity_dofs,
            ranges,
            entities,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.entities.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    /// The contiguous range of global dofs belonging to the given variable.
    pub fn variable_dofs(&self, id: VariableId) -> Range<usize> {
        self.ranges[id.0].clone()
    }

    /// The variable and entity a global dof belongs to.
    pub fn dof_entity(&self, dof: usize) -> (VariableId, DofEntity) {
        self.entities[dof]
    }

    pub fn node_dof(&self, id: VariableId, node: usize) -> Option<usize> {
        match self.variables[id.0].fe_type().family {
            FeFamily::Lagrange => self.entity_dofs[id.0].get(node).copied().flatten(),
            FeFamily::Monomial => None,
        }
    }

    pub fn element_dof(&self, id: VariableId, element: usize) -> Option<usize> {
        match self.variables[id.0].fe_type().family {
            FeFamily::Monomial => self.entity_dofs[id.0].get(element).copied().flatten(),
            FeFamily::Lagrange => None,
        }
    }

    pub fn mesh_revision(&self) -> u64 {
        self.mesh_revision
    }

    /// Fails with a concurrency violation if `mesh` has changed since the map was built.
    pub fn check_mesh_revision<T: Real>(&self, mesh: &Mesh<T>) -> Result<(), AssemblyError> {
        if mesh.revision() == self.mesh_revision {
            Ok(())
        } else {
            Err(AssemblyError::concurrency_violation(format!(
                "dof map was built for mesh revision {}, but the mesh is at revision {}",
                self.mesh_revision,
                mesh.revision()
            )))
        }
    }

    /// Whether the variable has any degrees of freedom on the given element.
    pub fn is_active<T: Real>(&self, mesh: &Mesh<T>, element_index: usize, id: VariableId) -> bool {
        self.variables[id.0].is_active_on(mesh.element(element_index).subdomain())
    }

    /// Populates `output` with the global dofs of the local shape functions of `id` on the
    /// given element.
    ///
    /// The output is empty if the variable is not active on the element's subdomain, or, on
    /// interface facets, if a discontinuous variable is missing on either side.
    pub fn populate_local_to_global<T: Real>(
        &self,
        mesh: &Mesh<T>,
        element_index: usize,
        id: VariableId,
        output: &mut Vec<usize>,
    ) -> Result<(), AssemblyError> {
        output.clear();
        let element = mesh.element(element_index);
        let variable = &self.variables[id.0];
        if !variable.is_active_on(element.subdomain()) {
            return Ok(());
        }

        let role = element.role();
        let fe_type = variable.fe_type();
        let is_interface = matches!(role, ElementRole::Interface { .. });
        let shape_count = fe_type
            .shape_count(element.kind(), is_interface)
            .ok_or_else(|| {
                AssemblyError::new(AssemblyErrorKind::InvalidElementKind {
                    element_kind: element.kind(),
                    fe_type,
                })
                .with_element(element_index)
                .with_variable(variable.name())
            })?;

        let dofs = &self.entity_dofs[id.0];
        match fe_type.family {
            FeFamily::Lagrange => {
                let nodes = match fe_type.order {
                    FeOrder::Second => element.nodes(),
                    _ => element.vertex_nodes(),
                };
                for &node in nodes {
                    let dof = dofs.get(node).copied().flatten().ok_or_else(|| {
                        AssemblyError::invalid_parameter(format!(
                            "node {} carries no degree of freedom for variable '{}'",
                            node,
                            variable.name()
                        ))
                        .with_element(element_index)
                    })?;
                    output.push(dof);
                }
            }
            FeFamily::Monomial => {
                if let ElementRole::Interface { neighbors, .. } = role {
                    let neighbor_dofs = [dofs[neighbors[0]], dofs[neighbors[1]]];
                    if let [Some(first), Some(second)] = neighbor_dofs {
                        output.extend([first, second]);
                    }
                } else if let Some(dof) = dofs[element_index] {
                    output.push(dof);
                }
            }
        }

        debug_assert!(output.is_empty() || output.len() == shape_count);
        Ok(())
    }
}
