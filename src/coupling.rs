//! Resolution of the off-diagonal Jacobian blocks required by coupled physics objects.
use crate::physics::{PhysicsObject, Registry};
use crate::variable::VariableId;
use crate::Real;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which (row variable, column variable) Jacobian blocks may be assembled.
///
/// Diagonal blocks are always allowed. Restricting the off-diagonal blocks yields a
/// cheaper, approximate Jacobian (for example block-diagonal preconditioning).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CouplingMatrix {
    /// Every block requested by a physics object.
    #[default]
    Full,
    /// Only diagonal blocks.
    Diagonal,
    /// Diagonal blocks and the listed (row, column) blocks.
    Explicit(BTreeSet<(VariableId, VariableId)>),
}

impl CouplingMatrix {
    pub fn allows(&self, ivar: VariableId, jvar: VariableId) -> bool {
        if ivar == jvar {
            return true;
        }
        match self {
            Self::Full => true,
            Self::Diagonal => false,
            Self::Explicit(pairs) => pairs.contains(&(ivar, jvar)),
        }
    }

    pub fn is_block_diagonal(&self) -> bool {
        match self {
            Self::Full => false,
            Self::Diagonal => true,
            Self::Explicit(pairs) => pairs.iter().all(|(i, j)| i == j),
        }
    }
}

/// Decides which off-diagonal blocks a physics object contributes on a given element.
#[derive(Debug, Clone, Default)]
pub struct CouplingResolver {
    matrix: CouplingMatrix,
}

impl CouplingResolver {
    pub fn new(matrix: CouplingMatrix) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &CouplingMatrix {
        &self.matrix
    }

    /// Populates `output` with the variables (other than the object's own) whose Jacobian
    /// block the object must compute on the current element.
    ///
    /// `is_active` tells whether a variable has degrees of freedom on the element. Declared
    /// couplings to inactive variables are skipped, as are blocks the coupling matrix excludes.
    /// Targets are reported in declaration order without duplicates.
    pub fn off_diagonal_targets<T, F>(&self, object: &dyn PhysicsObject<T>, is_active: F, output: &mut Vec<VariableId>)
    where
        T: Real,
        F: Fn(VariableId) -> bool,
    {
        output.clear();
        let ivar = object.variable();
        for &jvar in object.coupled_variables() {
            if jvar != ivar && !output.contains(&jvar) && self.matrix.allows(ivar, jvar) && is_active(jvar) {
                output.push(jvar);
            }
        }
    }

    /// All Jacobian blocks that can be touched by the objects of `registry`, including
    /// disabled ones, sorted by (row, column).
    pub fn required_blocks<T: Real>(&self, registry: &Registry<T>) -> Vec<(VariableId, VariableId)> {
        let mut blocks: BTreeSet<_> = (0..registry.num_variables())
            .map(|i| (VariableId(i), VariableId(i)))
            .collect();
        for object in registry.objects() {
            let ivar = object.variable();
            for &jvar in object.coupled_variables() {
                if self.matrix.allows(ivar, jvar) {
                    blocks.insert((ivar, jvar));
                }
            }
        }
        blocks.into_iter().collect()
    }
}
