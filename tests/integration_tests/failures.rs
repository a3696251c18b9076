use super::{assemble, build_problem, lagrange_variables, serial_settings, wavy_solution};
use femcore::assembly::{AssemblyDispatcher, AssemblyPass, DispatcherState, StoreStatus};
use femcore::coupling::CouplingMatrix;
use femcore::error::AssemblyErrorKind;
use femcore::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use femcore::mesh::Mesh;
use femcore::physics::registry::Restriction;
use femcore::physics::{ObjectConfig, PhysicsObject, QpContext, Registry};
use femcore::problem::Problem;
use femcore::settings::AssemblySettings;
use femcore::variable::VariableId;
use matrixcompare::assert_matrix_eq;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

enum Fault {
    NonFinite,
    Report,
    /// NaN on the n-th evaluation overall (counting from 1), regardless of the element.
    NonFiniteOnEvaluation(usize),
}

/// A unit source that misbehaves on one element, or on one evaluation.
struct FaultyObject {
    faulty_element: usize,
    fault: Fault,
    evaluations: AtomicUsize,
}

impl PhysicsObject<f64> for FaultyObject {
    fn type_name(&self) -> &str {
        "Faulty"
    }

    fn name(&self) -> &str {
        "faulty"
    }

    fn variable(&self) -> VariableId {
        VariableId(0)
    }

    fn compute_qp_residual(&self, context: &QpContext<f64>) -> eyre::Result<f64> {
        let evaluation = self.evaluations.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fault {
            Fault::NonFiniteOnEvaluation(n) if evaluation == n => Ok(f64::NAN),
            Fault::NonFinite if context.element == self.faulty_element => Ok(f64::NAN),
            Fault::Report if context.element == self.faulty_element => Err(eyre::eyre!("negative density")),
            _ => Ok(context.test.value),
        }
    }
}

fn faulty_problem(mesh: &Mesh<f64>, faulty_element: usize, fault: Fault) -> (Problem<f64>, Arc<FaultyObject>) {
    let object = Arc::new(FaultyObject {
        faulty_element,
        fault,
        evaluations: AtomicUsize::new(0),
    });
    let mut registry = Registry::new(1);
    registry
        .add(Arc::clone(&object) as Arc<dyn PhysicsObject<f64>>, Restriction::Everywhere)
        .unwrap();
    let problem = Problem::new(mesh, lagrange_variables(&["u"]), registry, CouplingMatrix::Full);
    (problem, object)
}

#[test]
fn non_finite_value_cancels_pass() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let (problem, object) = faulty_problem(&mesh, 1, Fault::NonFinite);
    let solution = vec![0.0; problem.num_dofs()];

    let settings = AssemblySettings::default()
        .with_num_threads(1)
        .with_quadrature_order(1);
    let mut dispatcher = AssemblyDispatcher::new(settings.clone()).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let result = dispatcher.run(&problem, &mesh, &mut store, &solution, &AssemblyPass::residual());

    assert!(!result.success);
    assert_eq!(result.elements_assembled, 1);
    assert_eq!(dispatcher.state(), DispatcherState::Aborted);
    assert_eq!(store.status(), StoreStatus::Partial);

    let error = result.error.unwrap();
    assert!(matches!(error.kind(), AssemblyErrorKind::NumericEvaluationFailure { .. }));
    assert_eq!(error.element(), Some(1));
    assert_eq!(error.qp(), Some(0));
    assert_eq!(error.object(), Some("Faulty 'faulty'"));
    assert_eq!(error.variable(), Some("u"));

    // One quadrature point and three test functions on the first element, then the failure
    assert_eq!(object.evaluations.load(Ordering::SeqCst), 4);

    // The contributions of the completed element stay in the store
    let completed = assemble(
        &problem,
        &mesh,
        settings,
        &solution,
        &AssemblyPass::residual().with_elements(0..1),
    );
    assert_matrix_eq!(store.residual(), completed.residual());
}

#[test]
fn nan_on_fifth_evaluation_cancels_pass() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let (problem, object) = faulty_problem(&mesh, usize::MAX, Fault::NonFiniteOnEvaluation(5));
    let solution = vec![0.0; problem.num_dofs()];

    // Three quadrature points and three test functions per triangle, visited point by point,
    // so the fifth evaluation is the second test function at the second point of element 0
    let mut dispatcher = AssemblyDispatcher::new(serial_settings().with_quadrature_order(2)).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let result = dispatcher.run(&problem, &mesh, &mut store, &solution, &AssemblyPass::residual());

    assert!(!result.success);
    assert_eq!(result.elements_assembled, 0);
    assert_eq!(object.evaluations.load(Ordering::SeqCst), 5);
    assert_eq!(dispatcher.state(), DispatcherState::Aborted);
    assert_eq!(store.status(), StoreStatus::Partial);

    let error = result.error.unwrap();
    assert!(matches!(error.kind(), AssemblyErrorKind::NumericEvaluationFailure { .. }));
    assert_eq!(error.element(), Some(0));
    assert_eq!(error.qp(), Some(1));
    assert_eq!(error.object(), Some("Faulty 'faulty'"));

    // Nothing was dispatched after the failing element, so the store is untouched
    assert!(store.residual().iter().all(|&r| r == 0.0));
}

#[test]
fn failed_pass_on_many_threads_reports_first_error() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(8);
    let (problem, _) = faulty_problem(&mesh, 37, Fault::NonFinite);
    let solution = vec![0.0; problem.num_dofs()];

    let mut dispatcher = AssemblyDispatcher::new(AssemblySettings::default().with_num_threads(4)).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let result = dispatcher.run(&problem, &mesh, &mut store, &solution, &AssemblyPass::both());
    assert!(!result.success);
    assert!(result.elements_assembled < 128);
    assert_eq!(result.error.as_ref().and_then(|e| e.element()), Some(37));
    assert_eq!(store.status(), StoreStatus::Partial);

    // A failed pass does not poison the dispatcher
    let (healthy, _) = faulty_problem(&mesh, usize::MAX, Fault::NonFinite);
    let mut store = dispatcher.create_store(&healthy, &mesh);
    let result = dispatcher.run(&healthy, &mesh, &mut store, &solution, &AssemblyPass::both());
    assert!(result.success);
    assert_eq!(result.elements_assembled, 128);
    assert_eq!(dispatcher.state(), DispatcherState::Complete);
}

#[test]
fn evaluation_errors_keep_their_source() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let (problem, _) = faulty_problem(&mesh, 0, Fault::Report);
    let solution = vec![0.0; problem.num_dofs()];

    let mut dispatcher = AssemblyDispatcher::new(serial_settings()).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let error = dispatcher
        .run(&problem, &mesh, &mut store, &solution, &AssemblyPass::residual())
        .into_result()
        .unwrap_err();
    assert_eq!(error.element(), Some(0));
    assert_eq!(error.source().map(|source| source.to_string()), Some("negative density".to_string()));
    assert!(error.to_string().contains("object Faulty 'faulty'"));
}

#[test]
fn solution_of_wrong_length_is_rejected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let configs = [ObjectConfig::new("Diffusion", "diffusion", "u")];
    let problem = build_problem(&mesh, lagrange_variables(&["u"]), &configs);

    let mut dispatcher = AssemblyDispatcher::new(serial_settings()).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let result = dispatcher.run(&problem, &mesh, &mut store, &[0.0; 3], &AssemblyPass::both());
    assert!(!result.success);
    assert_eq!(result.elements_assembled, 0);
    assert_eq!(dispatcher.state(), DispatcherState::Aborted);
    assert!(matches!(
        result.error.unwrap().kind(),
        AssemblyErrorKind::InvalidParameter { .. }
    ));
    // Nothing was touched
    assert_eq!(store.status(), StoreStatus::Reset);
}

#[test]
fn invalid_passes_are_rejected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let configs = [ObjectConfig::new("Diffusion", "diffusion", "u")];
    let problem = build_problem(&mesh, lagrange_variables(&["u"]), &configs);
    let solution = wavy_solution(problem.num_dofs());

    let mut dispatcher = AssemblyDispatcher::new(serial_settings()).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);

    let out_of_bounds = AssemblyPass::both().with_elements(10..mesh.num_elements() + 1);
    let error = dispatcher
        .run(&problem, &mesh, &mut store, &solution, &out_of_bounds)
        .into_result()
        .unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidParameter { .. }));

    let unknown_variable = AssemblyPass::both().with_variables([VariableId(1)]);
    let error = dispatcher
        .run(&problem, &mesh, &mut store, &solution, &unknown_variable)
        .into_result()
        .unwrap_err();
    assert_eq!(error.kind(), &AssemblyErrorKind::UnknownVariable { name: "#1".to_string() });
}

#[test]
fn invalid_settings_are_rejected() {
    let error = AssemblyDispatcher::<f64>::new(AssemblySettings::default().with_num_threads(0)).unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidParameter { .. }));
}

#[cfg(debug_assertions)]
#[test]
fn modified_mesh_is_detected() {
    let mut mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let configs = [ObjectConfig::new("Diffusion", "diffusion", "u")];
    let problem = build_problem(&mesh, lagrange_variables(&["u"]), &configs);
    let solution = wavy_solution(problem.num_dofs());

    let mut dispatcher = AssemblyDispatcher::new(serial_settings()).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    mesh.vertices_mut()[4].x += 0.01;

    let result = dispatcher.run(&problem, &mesh, &mut store, &solution, &AssemblyPass::both());
    assert!(!result.success);
    assert_eq!(dispatcher.state(), DispatcherState::Aborted);
    assert!(matches!(
        result.error.unwrap().kind(),
        AssemblyErrorKind::ConcurrencyViolation { .. }
    ));
}

#[cfg(debug_assertions)]
#[test]
fn store_of_another_problem_is_detected() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(2);
    let configs = [ObjectConfig::new("Diffusion", "diffusion", "u")];
    let small = build_problem(&mesh, lagrange_variables(&["u"]), &configs);
    let large = build_problem(&mesh, lagrange_variables(&["u", "v"]), &configs);

    let mut dispatcher = AssemblyDispatcher::new(serial_settings()).unwrap();
    let mut store = dispatcher.create_store(&small, &mesh);
    let solution = wavy_solution(large.num_dofs());
    let error = dispatcher
        .run(&large, &mesh, &mut store, &solution, &AssemblyPass::both())
        .into_result()
        .unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::ConcurrencyViolation { .. }));
}
