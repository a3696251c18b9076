//! The global residual vector and Jacobian matrix shared by all assembly workers.
use crate::dofs::DofMap;
use crate::error::AssemblyError;
use crate::mesh::Mesh;
use crate::variable::VariableId;
use crate::Real;
use davenport::{define_thread_local_workspace, with_thread_local_workspace};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Floating point types with a lock-free atomic counterpart.
pub trait AtomicFloat: Copy + Send + Sync + 'static {
    type Atomic: Send + Sync + Debug;

    fn new_atomic(value: Self) -> Self::Atomic;

    fn atomic_load(atomic: &Self::Atomic) -> Self;

    fn atomic_store(atomic: &Self::Atomic, value: Self);

    /// Adds `value` to the atomic, retrying until no concurrent update intervenes.
    fn atomic_add(atomic: &Self::Atomic, value: Self);
}

macro_rules! impl_atomic_float {
    ($float:ty, $atomic:ty) => {
        impl AtomicFloat for $float {
            type Atomic = $atomic;

            fn new_atomic(value: Self) -> Self::Atomic {
                <$atomic>::new(value.to_bits())
            }

            fn atomic_load(atomic: &Self::Atomic) -> Self {
                <$float>::from_bits(atomic.load(Ordering::Relaxed))
            }

            fn atomic_store(atomic: &Self::Atomic, value: Self) {
                atomic.store(value.to_bits(), Ordering::Relaxed)
            }

            fn atomic_add(atomic: &Self::Atomic, value: Self) {
                // The closure never returns None, so the update cannot fail
                let _ = atomic.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                    Some((<$float>::from_bits(bits) + value).to_bits())
                });
            }
        }
    };
}

impl_atomic_float!(f32, AtomicU32);
impl_atomic_float!(f64, AtomicU64);

/// How concurrent workers get their contributions into a [`GlobalStore`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScatterDiscipline {
    /// Workers add directly into the shared store with one atomic addition per entry.
    #[default]
    Atomic,
    /// Workers add into private partial stores that are summed into the shared store once all
    /// workers are done. Needs memory for one copy of the store per worker thread.
    ThreadPartials,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// All entries are zero.
    Reset,
    /// The last assembly pass completed.
    Complete,
    /// The last assembly pass was aborted; contributions of the elements finished before the
    /// abort are present, all others are missing.
    Partial,
}

/// Something the local contributions of an element can be scattered into.
pub trait ScatterTarget<T> {
    fn scatter_add_residual(&mut self, rows: &[usize], values: &[T]);

    /// Adds `values[(i, j)]` to the Jacobian entry `(rows[i], cols[j])`.
    ///
    /// Fails if an entry is not part of the sparsity pattern.
    fn scatter_add_jacobian(&mut self, rows: &[usize], cols: &[usize], values: &DMatrix<T>) -> Result<(), AssemblyError>;
}

define_thread_local_workspace!(SCATTER_WORKSPACE);

/// Adds a dense local block into CSR values laid out according to `pattern`.
///
/// Columns are visited in sorted order so that each pattern row is walked only once.
fn add_block_to_csr_values<T, F>(
    pattern: &SparsityPattern,
    rows: &[usize],
    cols: &[usize],
    values: &DMatrix<T>,
    mut add: F,
) -> Result<(), AssemblyError>
where
    T: Real,
    F: FnMut(usize, T),
{
    assert_eq!(values.nrows(), rows.len(), "Row count mismatch");
    assert_eq!(values.ncols(), cols.len(), "Column count mismatch");

    with_thread_local_workspace(&SCATTER_WORKSPACE, |sorted_permutation: &mut Vec<usize>| {
        sorted_permutation.clear();
        sorted_permutation.extend(0..cols.len());
        sorted_permutation.sort_unstable_by_key(|&j| cols[j]);

        let offsets = pattern.major_offsets();
        for (i, &row) in rows.iter().enumerate() {
            let row_offset = offsets[row];
            let row_columns = pattern.lane(row);
            let mut k = 0;
            for &j in sorted_permutation.iter() {
                let col = cols[j];
                while k < row_columns.len() && row_columns[k] < col {
                    k += 1;
                }
                if k == row_columns.len() || row_columns[k] != col {
                    return Err(AssemblyError::numeric_failure(format!(
                        "Jacobian entry ({}, {}) is not part of the sparsity pattern",
                        row, col
                    )));
                }
                add(row_offset + k, values[(i, j)]);
            }
        }
        Ok(())
    })
}

/// The shared residual vector and Jacobian matrix.
///
/// The store uses a single [`ScatterDiscipline`] for its whole lifetime. Entries are stored
/// atomically, so that workers following the [`Atomic`](ScatterDiscipline::Atomic) discipline
/// may scatter concurrently through a shared reference, also into the same entries.
#[derive(Debug)]
pub struct GlobalStore<T: Real> {
    discipline: ScatterDiscipline,
    pattern: Arc<SparsityPattern>,
    residual: Vec<T::Atomic>,
    jacobian: Vec<T::Atomic>,
    status: StoreStatus,
}

impl<T: Real> GlobalStore<T> {
    pub fn new(pattern: Arc<SparsityPattern>, discipline: ScatterDiscipline) -> Self {
        assert_eq!(pattern.major_dim(), pattern.minor_dim(), "Jacobian pattern must be square");
        Self {
            discipline,
            residual: (0..pattern.major_dim()).map(|_| T::new_atomic(T::zero())).collect(),
            jacobian: (0..pattern.nnz()).map(|_| T::new_atomic(T::zero())).collect(),
            pattern,
            status: StoreStatus::Reset,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.residual.len()
    }

    pub fn discipline(&self) -> ScatterDiscipline {
        self.discipline
    }

    pub fn pattern(&self) -> &Arc<SparsityPattern> {
        &self.pattern
    }

    pub fn status(&self) -> StoreStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StoreStatus) {
        self.status = status;
    }

    /// Zeroes all entries.
    ///
    /// Requires exclusive access, so it cannot overlap with an assembly pass.
    pub fn reset(&mut self) {
        for entry in self.residual.iter().chain(&self.jacobian) {
            T::atomic_store(entry, T::zero());
        }
        self.status = StoreStatus::Reset;
    }

    pub fn residual_value(&self, index: usize) -> T {
        T::atomic_load(&self.residual[index])
    }

    /// The Jacobian entry at `(row, col)`. Entries outside the sparsity pattern are zero.
    pub fn jacobian_value(&self, row: usize, col: usize) -> T {
        let offset = self.pattern.major_offsets()[row];
        match self.pattern.lane(row).binary_search(&col) {
            Ok(k) => T::atomic_load(&self.jacobian[offset + k]),
            Err(_) => T::zero(),
        }
    }

    pub fn residual(&self) -> DVector<T> {
        DVector::from_iterator(self.residual.len(), self.residual.iter().map(T::atomic_load))
    }

    pub fn jacobian(&self) -> CsrMatrix<T> {
        let values = self.jacobian.iter().map(T::atomic_load).collect();
        CsrMatrix::try_from_pattern_and_values(SparsityPattern::clone(&self.pattern), values)
            .expect("Values are laid out according to the pattern")
    }

    fn check_atomic_discipline(&self) {
        assert_eq!(
            self.discipline,
            ScatterDiscipline::Atomic,
            "Direct scattering into a store with the thread partials discipline"
        );
    }

    /// Adds a worker's partial store into this store. Single-threaded by construction.
    pub fn merge_partial(&mut self, partial: &PartialStore<T>) {
        assert!(
            Arc::ptr_eq(&self.pattern, &partial.pattern) || *self.pattern == *partial.pattern,
            "Partial store must share the sparsity pattern"
        );
        for (entry, &value) in self.residual.iter().zip(&partial.residual) {
            T::atomic_add(entry, value);
        }
        for (entry, &value) in self.jacobian.iter().zip(&partial.jacobian) {
            T::atomic_add(entry, value);
        }
    }
}

impl<'a, T: Real> ScatterTarget<T> for &'a GlobalStore<T> {
    fn scatter_add_residual(&mut self, rows: &[usize], values: &[T]) {
        self.check_atomic_discipline();
        assert_eq!(rows.len(), values.len());
        for (&row, &value) in rows.iter().zip(values) {
            T::atomic_add(&self.residual[row], value);
        }
    }

    fn scatter_add_jacobian(&mut self, rows: &[usize], cols: &[usize], values: &DMatrix<T>) -> Result<(), AssemblyError> {
        self.check_atomic_discipline();
        let jacobian = &self.jacobian;
        add_block_to_csr_values(&self.pattern, rows, cols, values, |index, value| {
            T::atomic_add(&jacobian[index], value)
        })
    }
}

/// A private, non-atomic copy of a [`GlobalStore`] owned by a single worker.
#[derive(Debug, Clone)]
pub struct PartialStore<T: Real> {
    pattern: Arc<SparsityPattern>,
    residual: Vec<T>,
    jacobian: Vec<T>,
    touched: bool,
}

impl<T: Real> PartialStore<T> {
    pub fn new(pattern: Arc<SparsityPattern>) -> Self {
        Self {
            residual: vec![T::zero(); pattern.major_dim()],
            jacobian: vec![T::zero(); pattern.nnz()],
            pattern,
            touched: false,
        }
    }

    pub fn pattern(&self) -> &Arc<SparsityPattern> {
        &self.pattern
    }

    /// Whether anything was scattered since the last reset.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn reset(&mut self) {
        if self.touched {
            self.residual.fill(T::zero());
            self.jacobian.fill(T::zero());
            self.touched = false;
        }
    }
}

impl<T: Real> ScatterTarget<T> for PartialStore<T> {
    fn scatter_add_residual(&mut self, rows: &[usize], values: &[T]) {
        assert_eq!(rows.len(), values.len());
        self.touched = true;
        for (&row, &value) in rows.iter().zip(values) {
            self.residual[row] += value;
        }
    }

    fn scatter_add_jacobian(&mut self, rows: &[usize], cols: &[usize], values: &DMatrix<T>) -> Result<(), AssemblyError> {
        self.touched = true;
        let jacobian = &mut self.jacobian;
        add_block_to_csr_values(&self.pattern, rows, cols, values, |index, value| {
            jacobian[index] += value
        })
    }
}

/// Computes the Jacobian sparsity pattern implied by the given variable blocks.
///
/// Every element contributes the full coupling between the degrees of freedom of the row
/// variable and those of the column variable of each block. Elements on which a variable has
/// no (or incompatible) degrees of freedom contribute nothing for that variable.
pub fn assemble_pattern<T: Real>(
    mesh: &Mesh<T>,
    dof_map: &DofMap,
    blocks: &[(VariableId, VariableId)],
) -> SparsityPattern {
    let num_rows = dof_map.num_dofs();
    let mut coordinates = Vec::new();
    let mut row_dofs = Vec::new();
    let mut col_dofs = Vec::new();
    for element_index in 0..mesh.num_elements() {
        for &(ivar, jvar) in blocks {
            if dof_map
                .populate_local_to_global(mesh, element_index, ivar, &mut row_dofs)
                .is_err()
                || dof_map
                    .populate_local_to_global(mesh, element_index, jvar, &mut col_dofs)
                    .is_err()
            {
                continue;
            }
            for &i in &row_dofs {
                for &j in &col_dofs {
                    coordinates.push((i, j));
                }
            }
        }
    }

    coordinates.par_sort_unstable();

    let mut row_offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::new();
    row_offsets.push(0);

    let mut current_row = 0;
    let mut prev_col = None;
    for (i, j) in coordinates {
        assert!(i < num_rows, "Coordinates must be in bounds");

        while i > current_row {
            row_offsets.push(column_indices.len());
            current_row += 1;
            prev_col = None;
        }

        // Only add column if it is not a duplicate
        if Some(j) != prev_col {
            column_indices.push(j);
            prev_col = Some(j);
        }
    }

    // Fill out offsets for remaining empty rows
    while row_offsets.len() < num_rows + 1 {
        row_offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, row_offsets, column_indices)
        .expect("Offsets and indices are sorted and in bounds")
}
