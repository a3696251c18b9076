use crate::assembly::global::ScatterTarget;
use crate::error::AssemblyError;
use crate::variable::VariableId;
use crate::Real;
use nalgebra::{DMatrix, DVector};

/// Dense local residual and Jacobian contributions of a single element.
///
/// Contributions are organized in blocks: one residual block per variable (indexed by the
/// variable's local test functions) and one Jacobian block per (row variable, column variable)
/// pair. Only blocks that are touched while visiting an element are scattered.
#[derive(Debug)]
pub struct LocalBuffer<T: Real> {
    num_variables: usize,
    dofs: Vec<Vec<usize>>,
    residual: Vec<DVector<T>>,
    residual_touched: Vec<bool>,
    jacobian: Vec<DMatrix<T>>,
    touched_blocks: Vec<(VariableId, VariableId)>,
}

impl<T: Real> Default for LocalBuffer<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Real> LocalBuffer<T> {
    pub fn new(num_variables: usize) -> Self {
        Self {
            num_variables,
            dofs: vec![Vec::new(); num_variables],
            residual: vec![DVector::zeros(0); num_variables],
            residual_touched: vec![false; num_variables],
            jacobian: vec![DMatrix::zeros(0, 0); num_variables * num_variables],
            touched_blocks: Vec::new(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// Prepares the buffer for a new element: clears all dof lists and contributions.
    pub fn begin_element(&mut self, num_variables: usize) {
        if num_variables != self.num_variables {
            *self = Self::new(num_variables);
            return;
        }
        for dofs in &mut self.dofs {
            dofs.clear();
        }
        self.residual_touched.fill(false);
        self.touched_blocks.clear();
    }

    /// The global dofs of the local shape functions of `variable` on the current element.
    pub fn dofs(&self, variable: VariableId) -> &[usize] {
        &self.dofs[variable.index()]
    }

    pub fn dofs_mut(&mut self, variable: VariableId) -> &mut Vec<usize> {
        &mut self.dofs[variable.index()]
    }

    /// Whether `variable` has degrees of freedom on the current element.
    pub fn is_active(&self, variable: VariableId) -> bool {
        !self.dofs[variable.index()].is_empty()
    }

    fn residual_block_mut(&mut self, variable: VariableId) -> &mut DVector<T> {
        let v = variable.index();
        if !self.residual_touched[v] {
            let n = self.dofs[v].len();
            self.residual[v].resize_vertically_mut(n, T::zero());
            self.residual[v].fill(T::zero());
            self.residual_touched[v] = true;
        }
        &mut self.residual[v]
    }

    fn jacobian_block_mut(&mut self, ivar: VariableId, jvar: VariableId) -> &mut DMatrix<T> {
        let index = ivar.index() * self.num_variables + jvar.index();
        if !self.touched_blocks.contains(&(ivar, jvar)) {
            let (m, n) = (self.dofs[ivar.index()].len(), self.dofs[jvar.index()].len());
            self.jacobian[index].resize_mut(m, n, T::zero());
            self.jacobian[index].fill(T::zero());
            self.touched_blocks.push((ivar, jvar));
        }
        &mut self.jacobian[index]
    }

    /// Adds to the residual entry of local test function `i` of `variable`.
    pub fn add_residual(&mut self, variable: VariableId, i: usize, value: T) {
        self.residual_block_mut(variable)[i] += value;
    }

    /// Adds to the Jacobian entry coupling local test function `i` of `ivar` to local trial
    /// function `j` of `jvar`.
    pub fn add_jacobian(&mut self, ivar: VariableId, jvar: VariableId, i: usize, j: usize, value: T) {
        self.jacobian_block_mut(ivar, jvar)[(i, j)] += value;
    }

    pub fn residual_block(&self, variable: VariableId) -> Option<&DVector<T>> {
        let v = variable.index();
        self.residual_touched[v].then(|| &self.residual[v])
    }

    pub fn jacobian_block(&self, ivar: VariableId, jvar: VariableId) -> Option<&DMatrix<T>> {
        self.touched_blocks
            .contains(&(ivar, jvar))
            .then(|| &self.jacobian[ivar.index() * self.num_variables + jvar.index()])
    }

    /// Multiplies every residual and Jacobian row of each variable by its scaling factor.
    pub fn apply_row_scaling<F>(&mut self, scaling: F)
    where
        F: Fn(VariableId) -> T,
    {
        for v in 0..self.num_variables {
            if self.residual_touched[v] {
                let s = scaling(VariableId(v));
                if s != T::one() {
                    self.residual[v] *= s;
                }
            }
        }
        for &(ivar, jvar) in &self.touched_blocks {
            let s = scaling(ivar);
            if s != T::one() {
                self.jacobian[ivar.index() * self.num_variables + jvar.index()] *= s;
            }
        }
    }

    /// Scatter-adds all touched blocks into `target`.
    pub fn scatter_into(&self, target: &mut impl ScatterTarget<T>) -> Result<(), AssemblyError> {
        for v in 0..self.num_variables {
            if self.residual_touched[v] {
                target.scatter_add_residual(&self.dofs[v], self.residual[v].as_slice());
            }
        }
        for &(ivar, jvar) in &self.touched_blocks {
            let block = &self.jacobian[ivar.index() * self.num_variables + jvar.index()];
            target.scatter_add_jacobian(self.dofs(ivar), self.dofs(jvar), block)?;
        }
        Ok(())
    }
}
