use super::{assemble, build_problem, dense_jacobian, lagrange_variables, wavy_solution};
use femcore::assembly::{AssemblyDispatcher, AssemblyPass, Partitioning, ScatterDiscipline};
use femcore::coupling::CouplingMatrix;
use femcore::error::AssemblyErrorKind;
use femcore::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use femcore::physics::{ObjectConfig, ObjectFactory};
use femcore::problem::Problem;
use femcore::settings::AssemblySettings;
use femcore::variable::{FeType, Variable, VariableSet};
use matrixcompare::assert_matrix_eq;

const OBJECTS_JSON: &str = r#"[
    { "type": "Diffusion", "name": "diffusion", "variable": "u", "params": { "coefficient": 0.5 } },
    { "type": "CoupledForce", "name": "source", "variable": "u", "coupled": { "v": "v" } },
    { "type": "Reaction", "name": "decay", "variable": "v", "params": { "rate": 2.0 } },
    { "type": "PenaltyDirichlet", "name": "walls", "variable": "v", "boundary": [0, 2],
      "params": { "penalty": 50.0, "value": 1.0 } }
]"#;

const VARIABLES_JSON: &str = r#"[
    { "name": "u", "fe_type": { "family": "Lagrange", "order": "First" } },
    { "name": "v", "fe_type": { "family": "Lagrange", "order": "First" }, "scaling": 2.0 }
]"#;

#[test]
fn problem_and_settings_from_json() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(4);
    let configs: Vec<ObjectConfig> = serde_json::from_str(OBJECTS_JSON).unwrap();
    let variables: Vec<Variable> = serde_json::from_str(VARIABLES_JSON).unwrap();
    let variables = VariableSet::from_variables(variables).unwrap();
    let problem = build_problem(&mesh, variables, &configs);
    assert_eq!(problem.registry().num_objects(), 4);

    let settings: AssemblySettings = serde_json::from_str(
        r#"{ "num_threads": 3, "partitioning": { "BlockInterleaved": { "block_size": 5 } },
             "discipline": "ThreadPartials" }"#,
    )
    .unwrap();
    assert_eq!(settings.partitioning, Partitioning::BlockInterleaved { block_size: 5 });
    assert_eq!(settings.discipline, ScatterDiscipline::ThreadPartials);

    let solution = wavy_solution(problem.num_dofs());
    let store = assemble(&problem, &mesh, settings, &solution, &AssemblyPass::both());

    // The same problem written with builders
    let configs = [
        ObjectConfig::new("Diffusion", "diffusion", "u").with_param("coefficient", 0.5),
        ObjectConfig::new("CoupledForce", "source", "u").with_coupled("v", "v"),
        ObjectConfig::new("Reaction", "decay", "v").with_param("rate", 2.0),
        ObjectConfig::new("PenaltyDirichlet", "walls", "v")
            .with_boundary([0, 2])
            .with_param("penalty", 50.0)
            .with_param("value", 1.0),
    ];
    let variables = VariableSet::from_variables([
        Variable::new("u", FeType::LAGRANGE_FIRST),
        Variable::new("v", FeType::LAGRANGE_FIRST).with_scaling(2.0),
    ])
    .unwrap();
    let reference_problem = build_problem(&mesh, variables, &configs);
    let reference = assemble(
        &reference_problem,
        &mesh,
        AssemblySettings::default().with_num_threads(1),
        &solution,
        &AssemblyPass::both(),
    );
    assert_matrix_eq!(store.residual(), reference.residual(), comp = abs, tol = 1e-12);
    assert_matrix_eq!(dense_jacobian(&store), dense_jacobian(&reference), comp = abs, tol = 1e-12);
}

#[test]
fn setup_errors_are_reported_before_assembly() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    let setup = |configs: &[ObjectConfig]| {
        Problem::from_configs(&mesh, lagrange_variables(&["u"]), &factory, configs, CouplingMatrix::Full)
    };

    let error = setup(&[ObjectConfig::new("Convection", "convection", "u")]).unwrap_err();
    assert!(error.is_setup_error());
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::UnregisteredObjectKind {
            type_name: "Convection".to_string()
        }
    );
    assert_eq!(error.object(), Some("Convection 'convection'"));

    let error = setup(&[ObjectConfig::new("Diffusion", "diffusion", "temperature")]).unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::UnknownVariable {
            name: "temperature".to_string()
        }
    );

    let error = setup(&[ObjectConfig::new("NeumannFlux", "flux", "u").with_block([0])]).unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidParameter { .. }));

    let error = setup(&[ObjectConfig::new("Reaction", "reaction", "u").with_param("rat", 1.0)]).unwrap_err();
    assert!(error.to_string().contains("unrecognized parameters: rat"));
}

#[test]
fn unsupported_element_kind_is_reported_during_assembly() {
    let mesh = create_unit_square_uniform_tri_mesh_2d(1);
    let variables = VariableSet::from_variables([Variable::new("p", FeType::LAGRANGE_SECOND)]).unwrap();
    let problem = build_problem(&mesh, variables, &[ObjectConfig::new("Diffusion", "diffusion", "p")]);
    // Second order Lagrange needs Tri6 elements, so the mesh carries no dofs for it
    assert_eq!(problem.num_dofs(), 0);

    let mut dispatcher = AssemblyDispatcher::new(AssemblySettings::default().with_num_threads(1)).unwrap();
    let mut store = dispatcher.create_store(&problem, &mesh);
    let error = dispatcher
        .run(&problem, &mesh, &mut store, &[], &AssemblyPass::residual())
        .into_result()
        .unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidElementKind { .. }));
    assert_eq!(error.element(), Some(0));
    assert_eq!(error.variable(), Some("p"));
}
