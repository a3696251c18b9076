use femcore::error::AssemblyErrorKind;
use femcore::physics::{IntegralKind, ObjectConfig, ObjectFactory, PhysicsObject};
use femcore::variable::{FeType, Variable, VariableId, VariableSet};

fn variables() -> VariableSet {
    VariableSet::from_variables([
        Variable::new("u", FeType::LAGRANGE_FIRST),
        Variable::new("v", FeType::LAGRANGE_FIRST),
    ])
    .unwrap()
}

#[test]
fn builtin_types_are_registered() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    assert_eq!(
        factory.registered_types(),
        vec![
            "BodyForce",
            "CoupledForce",
            "Diffusion",
            "JumpPenalty",
            "NeumannFlux",
            "NonlinearDiffusion",
            "PenaltyDirichlet",
            "Reaction"
        ]
    );
    assert!(factory.is_registered("Diffusion"));
    assert!(!factory.is_registered("diffusion"));
}

#[test]
fn create_resolves_variables() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    let config = ObjectConfig::new("CoupledForce", "source", "u")
        .with_coupled("v", "v")
        .with_param("coefficient", 2.0);
    let object = factory.create(&config, &variables()).unwrap();
    assert_eq!(object.type_name(), "CoupledForce");
    assert_eq!(object.name(), "source");
    assert_eq!(object.variable(), VariableId(0));
    assert_eq!(object.coupled_variables(), &[VariableId(1)]);
    assert_eq!(object.integral_kind(), IntegralKind::Volume);
}

#[test]
fn unregistered_type_is_reported_with_identity() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    let config = ObjectConfig::new("Difusion", "diffusion", "u");
    let error = factory.create(&config, &variables()).unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::UnregisteredObjectKind {
            type_name: "Difusion".to_string()
        }
    );
    assert_eq!(error.object(), Some("Difusion 'diffusion'"));
    assert!(error.is_setup_error());
}

#[test]
fn unknown_variables_are_reported() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();

    let error = factory
        .create(&ObjectConfig::new("Diffusion", "diffusion", "w"), &variables())
        .unwrap_err();
    assert_eq!(error.kind(), &AssemblyErrorKind::UnknownVariable { name: "w".to_string() });
    assert_eq!(error.object(), Some("Diffusion 'diffusion'"));

    let config = ObjectConfig::new("CoupledForce", "source", "u").with_coupled("v", "temperature");
    let error = factory.create(&config, &variables()).unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::UnknownVariable {
            name: "temperature".to_string()
        }
    );
    assert_eq!(error.object(), Some("CoupledForce 'source'"));
}

#[test]
fn unrecognized_parameters_are_rejected() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    let config = ObjectConfig::new("Diffusion", "diffusion", "u")
        .with_param("coefficient", 1.0)
        .with_param("coeficient", 2.0);
    let error = factory.create(&config, &variables()).unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::InvalidParameter {
            message: "unrecognized parameters: coeficient".to_string()
        }
    );
}

#[test]
fn missing_required_inputs_are_rejected() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();

    let error = factory
        .create(&ObjectConfig::new("CoupledForce", "source", "u"), &variables())
        .unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::InvalidParameter {
            message: "missing required coupled variable 'v'".to_string()
        }
    );
    assert_eq!(error.object(), Some("CoupledForce 'source'"));

    let error = factory
        .create(&ObjectConfig::new("PenaltyDirichlet", "bc", "u"), &variables())
        .unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::InvalidParameter {
            message: "missing required parameter 'penalty'".to_string()
        }
    );
}

#[test]
fn non_positive_penalty_is_rejected() {
    let factory = ObjectFactory::<f64>::with_builtin_objects();
    let config = ObjectConfig::new("JumpPenalty", "jump", "u").with_param("penalty", 0.0);
    let error = factory.create(&config, &variables()).unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidParameter { .. }));
}

#[test]
fn custom_types_can_be_registered() {
    use femcore::physics::builtin::Reaction;
    use std::sync::Arc;

    let mut factory = ObjectFactory::<f64>::new();
    assert!(factory.registered_types().is_empty());
    factory.register("Decay", |ctx| {
        Ok(Arc::new(Reaction {
            name: ctx.name().to_string(),
            variable: ctx.variable(),
            rate: ctx.required_param::<f64>("lambda")?,
        }))
    });
    let config = ObjectConfig::new("Decay", "decay", "v").with_param("lambda", 0.5);
    let object = factory.create(&config, &variables()).unwrap();
    assert_eq!(object.type_name(), "Reaction");
    assert_eq!(object.variable(), VariableId(1));
}

#[test]
fn configs_deserialize_from_json() {
    let json = r#"[
        { "type": "Diffusion", "name": "diffusion", "variable": "u", "params": { "coefficient": 2.0 } },
        { "type": "NeumannFlux", "name": "flux", "variable": "u", "boundary": [1, 2], "enabled": false }
    ]"#;
    let configs: Vec<ObjectConfig> = serde_json::from_str(json).unwrap();
    assert_eq!(
        configs[0],
        ObjectConfig::new("Diffusion", "diffusion", "u").with_param("coefficient", 2.0)
    );
    assert_eq!(
        configs[1],
        ObjectConfig::new("NeumannFlux", "flux", "u")
            .with_boundary([1, 2])
            .disabled()
    );
}

#[test]
fn configs_with_unknown_fields_are_rejected() {
    let json = r#"{ "type": "Diffusion", "name": "diffusion", "variable": "u", "coefficient": 2.0 }"#;
    assert!(serde_json::from_str::<ObjectConfig>(json).is_err());
}
