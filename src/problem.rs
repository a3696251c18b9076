//! A fully resolved problem: variables, index map, physics objects and coupling.
use crate::assembly::global::{assemble_pattern, GlobalStore, ScatterDiscipline};
use crate::coupling::{CouplingMatrix, CouplingResolver};
use crate::dofs::DofMap;
use crate::error::AssemblyError;
use crate::mesh::Mesh;
use crate::physics::{ObjectConfig, ObjectFactory, Registry};
use crate::variable::VariableSet;
use crate::Real;
use std::sync::Arc;

/// Everything an assembly pass reads besides the mesh and the solution.
///
/// A problem is immutable while a pass is running. The dof map records the revision of the mesh
/// it was built from; after the mesh changes, the problem must be rebuilt.
#[derive(Debug)]
pub struct Problem<T: Real> {
    variables: VariableSet,
    dof_map: DofMap,
    registry: Registry<T>,
    coupling: CouplingResolver,
}

impl<T: Real> Problem<T> {
    pub fn new(mesh: &Mesh<T>, variables: VariableSet, registry: Registry<T>, coupling: CouplingMatrix) -> Self {
        assert_eq!(
            registry.num_variables(),
            variables.len(),
            "Registry must be built for the same variables"
        );
        let dof_map = DofMap::build(mesh, &variables);
        Self {
            variables,
            dof_map,
            registry,
            coupling: CouplingResolver::new(coupling),
        }
    }

    /// Resolves the object configurations against `factory` and builds the problem.
    ///
    /// All setup errors are reported here, before any assembly.
    pub fn from_configs(
        mesh: &Mesh<T>,
        variables: VariableSet,
        factory: &ObjectFactory<T>,
        configs: &[ObjectConfig],
        coupling: CouplingMatrix,
    ) -> Result<Self, AssemblyError> {
        let registry = Registry::build(factory, configs, &variables)?;
        Ok(Self::new(mesh, variables, registry, coupling))
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    /// Enables or disables the object with the given name between passes.
    ///
    /// Objects cannot be added once the problem exists, since stores created from it only
    /// cover the Jacobian blocks of the objects registered at construction. Disabled objects
    /// keep their blocks, so toggling never invalidates a store.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), AssemblyError> {
        self.registry.set_enabled(name, enabled)
    }

    pub fn coupling(&self) -> &CouplingResolver {
        &self.coupling
    }

    pub fn num_dofs(&self) -> usize {
        self.dof_map.num_dofs()
    }

    /// Creates a zeroed store whose sparsity pattern covers every Jacobian block the registered
    /// objects can touch.
    pub fn create_store(&self, mesh: &Mesh<T>, discipline: ScatterDiscipline) -> GlobalStore<T> {
        let blocks = self.coupling.required_blocks(&self.registry);
        let pattern = assemble_pattern(mesh, &self.dof_map, &blocks);
        log::debug!(
            "Created store with {} degrees of freedom and {} Jacobian nonzeros",
            pattern.major_dim(),
            pattern.nnz()
        );
        GlobalStore::new(Arc::new(pattern), discipline)
    }
}
