//! Parallel assembly passes over a persistent worker pool.
use crate::assembly::buffers::LocalBuffer;
use crate::assembly::context::QuadratureContext;
use crate::assembly::global::{GlobalStore, PartialStore, ScatterDiscipline, StoreStatus};
use crate::assembly::partition::{partition_elements, Chunk};
use crate::error::AssemblyError;
use crate::mesh::{BoundaryId, Element, ElementRole, Mesh, SubdomainId};
use crate::physics::{object_identity, Region, Shape};
use crate::problem::Problem;
use crate::quadrature::QuadratureOrder;
use crate::settings::AssemblySettings;
use crate::variable::VariableId;
use crate::Real;
use itertools::Itertools;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Formatter;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thread_local::ThreadLocal;

/// The phase of the dispatcher. A pass moves linearly through
/// `Idle -> Partitioned -> InFlight -> Merging -> Complete`, or ends in `Aborted`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Partitioned,
    InFlight,
    Merging,
    Complete,
    Aborted,
}

/// What a pass assembles.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssemblyTarget {
    Residual,
    Jacobian,
    Both,
}

impl AssemblyTarget {
    pub fn includes_residual(&self) -> bool {
        matches!(self, Self::Residual | Self::Both)
    }

    pub fn includes_jacobian(&self) -> bool {
        matches!(self, Self::Jacobian | Self::Both)
    }
}

/// Restricts a pass to the elements of one region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RegionFilter {
    #[default]
    All,
    /// Volume elements of the given subdomain.
    Subdomain(SubdomainId),
    /// Boundary and interface facets with the given boundary id.
    Boundary(BoundaryId),
}

impl RegionFilter {
    pub fn admits(&self, element: &Element) -> bool {
        match self {
            Self::All => true,
            Self::Subdomain(id) => element.role() == ElementRole::Volume && element.subdomain() == *id,
            Self::Boundary(id) => element.boundary_id() == Some(*id),
        }
    }
}

/// Description of a single assembly pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPass {
    pub target: AssemblyTarget,
    /// Elements to visit. `None` visits the whole mesh.
    pub elements: Option<Range<usize>>,
    pub region: RegionFilter,
    /// Equations (row variables) to assemble, in order and ignoring repeats. `None` assembles
    /// all of them.
    pub variables: Option<Vec<VariableId>>,
}

impl AssemblyPass {
    pub fn new(target: AssemblyTarget) -> Self {
        Self {
            target,
            elements: None,
            region: RegionFilter::All,
            variables: None,
        }
    }

    pub fn residual() -> Self {
        Self::new(AssemblyTarget::Residual)
    }

    pub fn jacobian() -> Self {
        Self::new(AssemblyTarget::Jacobian)
    }

    pub fn both() -> Self {
        Self::new(AssemblyTarget::Both)
    }

    pub fn with_elements(mut self, elements: Range<usize>) -> Self {
        self.elements = Some(elements);
        self
    }

    pub fn with_region(mut self, region: RegionFilter) -> Self {
        self.region = region;
        self
    }

    pub fn with_variables(mut self, variables: impl IntoIterator<Item = VariableId>) -> Self {
        self.variables = Some(variables.into_iter().collect());
        self
    }
}

/// Outcome of [`AssemblyDispatcher::run`].
///
/// A failed pass is not rolled back: the store keeps the contributions of every element that
/// was completed before the failure was noticed and is marked [`StoreStatus::Partial`].
#[derive(Debug)]
pub struct AssemblyResult {
    pub success: bool,
    /// The first fatal error, with the offending element, object and quadrature point.
    pub error: Option<AssemblyError>,
    /// Number of elements whose contributions were scattered.
    pub elements_assembled: usize,
}

impl AssemblyResult {
    fn failure(error: AssemblyError, elements_assembled: usize) -> Self {
        Self {
            success: false,
            error: Some(error),
            elements_assembled,
        }
    }

    pub fn into_result(self) -> Result<usize, AssemblyError> {
        match self.error {
            None => Ok(self.elements_assembled),
            Some(error) => Err(error),
        }
    }
}

/// Data owned by a single worker thread and reused across elements and passes.
struct WorkerState<T: Real> {
    context: QuadratureContext<T>,
    buffer: LocalBuffer<T>,
    needed: Vec<bool>,
    targets: Vec<VariableId>,
    partial: Option<PartialStore<T>>,
}

/// Runs assembly passes on a fixed pool of worker threads.
///
/// The pool is created once and reused for every pass, as is the per-worker state (quadrature
/// context, local buffer and, for the thread partials discipline, a private partial store).
pub struct AssemblyDispatcher<T: Real> {
    pool: rayon::ThreadPool,
    settings: AssemblySettings,
    state: DispatcherState,
    workers: ThreadLocal<RefCell<WorkerState<T>>>,
}

impl<T: Real> fmt::Debug for AssemblyDispatcher<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyDispatcher")
            .field("num_threads", &self.pool.current_num_threads())
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish()
    }
}

impl<T: Real> AssemblyDispatcher<T> {
    pub fn new(settings: AssemblySettings) -> Result<Self, AssemblyError> {
        settings.validate()?;
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("femcore-worker-{}", i));
        if let Some(num_threads) = settings.num_threads {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder.build().map_err(|err| {
            AssemblyError::invalid_parameter("failed to build worker pool").with_source(eyre::Report::new(err))
        })?;
        log::debug!(
            "Created assembly dispatcher with {} worker threads",
            pool.current_num_threads()
        );
        Ok(Self {
            pool,
            settings,
            state: DispatcherState::Idle,
            workers: ThreadLocal::new(),
        })
    }

    pub fn settings(&self) -> &AssemblySettings {
        &self.settings
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Creates a store for `problem` using the configured scatter discipline.
    pub fn create_store(&self, problem: &Problem<T>, mesh: &Mesh<T>) -> GlobalStore<T> {
        problem.create_store(mesh, self.settings.discipline)
    }

    /// Assembles the contributions of all enabled physics objects over the elements selected by
    /// `pass`, adding them into `store`.
    ///
    /// The store is not reset; callers reset it between independent passes. `solution` holds one
    /// coefficient per degree of freedom of the problem's dof map.
    pub fn run(
        &mut self,
        problem: &Problem<T>,
        mesh: &Mesh<T>,
        store: &mut GlobalStore<T>,
        solution: &[T],
        pass: &AssemblyPass,
    ) -> AssemblyResult {
        self.state = DispatcherState::Idle;
        let variables = match check_pass(problem, mesh, store, solution, pass) {
            Ok(variables) => variables,
            Err(error) => {
                self.state = DispatcherState::Aborted;
                return AssemblyResult::failure(error, 0);
            }
        };

        let elements = pass.elements.clone().unwrap_or(0..mesh.num_elements());
        let num_workers = self.pool.current_num_threads();
        let chunks = partition_elements(elements.clone(), num_workers, self.settings.partitioning);
        self.state = DispatcherState::Partitioned;
        log::debug!(
            "Assembling {:?} over elements {:?} in {} chunks ({:?} partitioning, {:?} discipline)",
            pass.target,
            elements,
            chunks.len(),
            self.settings.partitioning,
            store.discipline()
        );

        let cancelled = AtomicBool::new(false);
        let first_error = Mutex::new(None);
        let assembled = AtomicUsize::new(0);

        self.state = DispatcherState::InFlight;
        {
            let job = PassJob {
                problem,
                mesh,
                store: &*store,
                solution,
                target: pass.target,
                region: pass.region,
                scaling: problem
                    .variables()
                    .iter()
                    .map(|(_, variable)| nalgebra::convert(variable.scaling()))
                    .collect(),
                variables,
                order: self.settings.quadrature_order,
            };
            let job = &job;
            let workers = &self.workers;
            let (cancelled, first_error, assembled) = (&cancelled, &first_error, &assembled);
            self.pool.scope(|scope| {
                for chunk in chunks {
                    scope.spawn(move |_| {
                        let outcome = job.run_chunk(workers, &chunk, cancelled);
                        assembled.fetch_add(outcome.assembled, Ordering::Relaxed);
                        if let Some(error) = outcome.error {
                            cancelled.store(true, Ordering::Relaxed);
                            let mut first_error = first_error.lock();
                            if first_error.is_none() {
                                *first_error = Some(error);
                            }
                        }
                    });
                }
            });
        }

        self.state = DispatcherState::Merging;
        if store.discipline() == ScatterDiscipline::ThreadPartials {
            for cell in self.workers.iter_mut() {
                if let Some(partial) = cell.get_mut().partial.as_mut() {
                    if partial.is_touched() && Arc::ptr_eq(partial.pattern(), store.pattern()) {
                        store.merge_partial(partial);
                    }
                    partial.reset();
                }
            }
        }

        let elements_assembled = assembled.into_inner();
        match first_error.into_inner() {
            None => {
                if store.status() != StoreStatus::Partial {
                    store.set_status(StoreStatus::Complete);
                }
                self.state = DispatcherState::Complete;
                log::debug!("Assembly pass complete, {} elements assembled", elements_assembled);
                AssemblyResult {
                    success: true,
                    error: None,
                    elements_assembled,
                }
            }
            Some(error) => {
                store.set_status(StoreStatus::Partial);
                self.state = DispatcherState::Aborted;
                log::warn!(
                    "Assembly pass cancelled after {} elements: {}",
                    elements_assembled,
                    error
                );
                AssemblyResult::failure(error, elements_assembled)
            }
        }
    }
}

/// Validates the inputs of a pass and returns the row variables to assemble.
fn check_pass<T: Real>(
    problem: &Problem<T>,
    mesh: &Mesh<T>,
    store: &GlobalStore<T>,
    solution: &[T],
    pass: &AssemblyPass,
) -> Result<Vec<VariableId>, AssemblyError> {
    let dof_map = problem.dof_map();
    if cfg!(debug_assertions) {
        dof_map.check_mesh_revision(mesh)?;
        if store.num_dofs() != dof_map.num_dofs() {
            return Err(AssemblyError::concurrency_violation(format!(
                "store has {} rows, but the dof map has {} degrees of freedom",
                store.num_dofs(),
                dof_map.num_dofs()
            )));
        }
    }
    if solution.len() != dof_map.num_dofs() {
        return Err(AssemblyError::invalid_parameter(format!(
            "solution has {} entries, expected {}",
            solution.len(),
            dof_map.num_dofs()
        )));
    }
    if let Some(elements) = &pass.elements {
        if elements.start > elements.end || elements.end > mesh.num_elements() {
            return Err(AssemblyError::invalid_parameter(format!(
                "element range {:?} is out of bounds for a mesh with {} elements",
                elements,
                mesh.num_elements()
            )));
        }
    }
    match &pass.variables {
        None => Ok((0..dof_map.num_variables()).map(VariableId).collect()),
        Some(variables) => {
            if let Some(variable) = variables.iter().find(|v| v.index() >= dof_map.num_variables()) {
                return Err(AssemblyError::unknown_variable(format!("#{}", variable.index())));
            }
            // Repeated equations are assembled once
            Ok(variables.iter().copied().unique().collect())
        }
    }
}

struct ChunkOutcome {
    assembled: usize,
    error: Option<AssemblyError>,
}

/// Everything the workers share during a pass.
struct PassJob<'a, T: Real> {
    problem: &'a Problem<T>,
    mesh: &'a Mesh<T>,
    store: &'a GlobalStore<T>,
    solution: &'a [T],
    target: AssemblyTarget,
    region: RegionFilter,
    variables: Vec<VariableId>,
    scaling: Vec<T>,
    order: QuadratureOrder,
}

impl<'a, T: Real> PassJob<'a, T> {
    fn run_chunk(
        &self,
        workers: &ThreadLocal<RefCell<WorkerState<T>>>,
        chunk: &Chunk,
        cancelled: &AtomicBool,
    ) -> ChunkOutcome {
        let dof_map = self.problem.dof_map();
        let cell = workers.get_or(|| {
            RefCell::new(WorkerState {
                context: QuadratureContext::new(dof_map, self.order),
                buffer: LocalBuffer::new(dof_map.num_variables()),
                needed: Vec::new(),
                targets: Vec::new(),
                partial: None,
            })
        });
        let mut outcome = ChunkOutcome {
            assembled: 0,
            error: None,
        };
        let Ok(mut worker) = cell.try_borrow_mut() else {
            outcome.error = Some(AssemblyError::concurrency_violation(
                "worker state is already in use on this thread",
            ));
            return outcome;
        };
        let worker = &mut *worker;
        worker.context.prepare(dof_map, self.order);
        if self.store.discipline() == ScatterDiscipline::ThreadPartials {
            let stale = match &worker.partial {
                Some(partial) => !Arc::ptr_eq(partial.pattern(), self.store.pattern()),
                None => true,
            };
            if stale {
                worker.partial = Some(PartialStore::new(Arc::clone(self.store.pattern())));
            }
        }

        log::trace!(
            "Worker {} assembling {} elements",
            chunk.worker,
            chunk.num_elements()
        );
        for element_index in chunk.elements() {
            if cancelled.load(Ordering::Relaxed) {
                log::trace!("Worker {} stopping after cancellation", chunk.worker);
                break;
            }
            match self.assemble_element(worker, element_index) {
                Ok(true) => outcome.assembled += 1,
                Ok(false) => {}
                Err(error) => {
                    outcome.error = Some(error);
                    break;
                }
            }
        }
        outcome
    }

    /// Assembles and scatters a single element. Returns `false` if nothing applies to it.
    fn assemble_element(&self, worker: &mut WorkerState<T>, element_index: usize) -> Result<bool, AssemblyError> {
        let WorkerState {
            context,
            buffer,
            needed,
            targets,
            partial,
        } = worker;
        let element = self.mesh.element(element_index);
        if !self.region.admits(element) {
            return Ok(false);
        }
        let region = Region::of_element(element);
        let registry = self.problem.registry();
        let dof_map = self.problem.dof_map();
        let num_variables = dof_map.num_variables();

        needed.clear();
        needed.resize(num_variables, false);
        let mut has_objects = false;
        for &ivar in &self.variables {
            for object in registry.objects_for(ivar, region) {
                has_objects = true;
                needed[ivar.index()] = true;
                for coupled in object.coupled_variables() {
                    needed[coupled.index()] = true;
                }
            }
        }
        if !has_objects {
            return Ok(false);
        }

        context.reinit(self.mesh, element_index)?;
        buffer.begin_element(num_variables);
        for (v, _) in needed.iter().enumerate().filter(|(_, &needed)| needed) {
            let variable = VariableId(v);
            dof_map.populate_local_to_global(self.mesh, element_index, variable, buffer.dofs_mut(variable))?;
            context.gather_field(variable, buffer.dofs(variable), self.solution);
        }

        for &ivar in &self.variables {
            if !buffer.is_active(ivar) {
                continue;
            }
            for object in registry.objects_for(ivar, region) {
                let object = object.as_ref();
                let locate = |error: AssemblyError, q: usize| {
                    error
                        .with_element(element_index)
                        .with_object(object_identity(object))
                        .with_variable(dof_map.variable(ivar).name())
                        .with_qp(q)
                };

                if self.target.includes_jacobian() {
                    self.problem
                        .coupling()
                        .off_diagonal_targets(object, |jvar| buffer.is_active(jvar), targets);
                }

                for q in 0..context.num_quadrature_points() {
                    let jxw = context.jxw(q);
                    for (i, test) in context.shapes(ivar, q).iter().enumerate() {
                        if self.target.includes_residual() {
                            let qp = context.qp_context(q, *test, Shape::zero());
                            let value = checked(object.compute_qp_residual(&qp), "residual")
                                .map_err(|err| locate(err, q))?;
                            buffer.add_residual(ivar, i, value * jxw);
                        }
                        if self.target.includes_jacobian() {
                            for (j, trial) in context.shapes(ivar, q).iter().enumerate() {
                                let qp = context.qp_context(q, *test, *trial);
                                let value = checked(object.compute_qp_jacobian(&qp), "Jacobian")
                                    .map_err(|err| locate(err, q))?;
                                buffer.add_jacobian(ivar, ivar, i, j, value * jxw);
                            }
                            for &jvar in targets.iter() {
                                for (j, trial) in context.shapes(jvar, q).iter().enumerate() {
                                    let qp = context.qp_context(q, *test, *trial);
                                    let value = checked(
                                        object.compute_qp_off_diagonal_jacobian(&qp, jvar),
                                        "off-diagonal Jacobian",
                                    )
                                    .map_err(|err| locate(err, q))?;
                                    buffer.add_jacobian(ivar, jvar, i, j, value * jxw);
                                }
                            }
                        }
                    }
                }
            }
        }

        buffer.apply_row_scaling(|v| self.scaling[v.index()]);
        let scattered = match partial {
            Some(partial) if self.store.discipline() == ScatterDiscipline::ThreadPartials => {
                buffer.scatter_into(partial)
            }
            _ => {
                let mut store = self.store;
                buffer.scatter_into(&mut store)
            }
        };
        scattered.map_err(|err| err.with_element(element_index))?;
        Ok(true)
    }
}

/// Turns a failed or non-finite evaluation into a numeric evaluation failure.
fn checked<T: Real>(result: eyre::Result<T>, what: &str) -> Result<T, AssemblyError> {
    match result {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(value) => Err(AssemblyError::numeric_failure(format!(
            "{} evaluation produced the non-finite value {:?}",
            what, value
        ))),
        Err(report) => Err(AssemblyError::numeric_failure(format!("{} evaluation failed", what)).with_source(report)),
    }
}
