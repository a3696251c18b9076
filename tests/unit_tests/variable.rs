use femcore::element::ElementKind;
use femcore::error::AssemblyErrorKind;
use femcore::variable::{FeFamily, FeOrder, FeType, Variable, VariableId, VariableSet};

#[test]
fn shape_counts_follow_compatibility_table() {
    use ElementKind::*;
    let lagrange = FeType::LAGRANGE_FIRST;
    assert_eq!(lagrange.shape_count(Segment2, false), Some(2));
    assert_eq!(lagrange.shape_count(Segment2, true), Some(2));
    assert_eq!(lagrange.shape_count(Tri3, false), Some(3));
    assert_eq!(lagrange.shape_count(Tri6, false), Some(3));
    assert_eq!(lagrange.shape_count(Quad4, false), Some(4));

    let quadratic = FeType::LAGRANGE_SECOND;
    assert_eq!(quadratic.shape_count(Tri6, false), Some(6));
    assert_eq!(quadratic.shape_count(Tri3, false), None);
    assert_eq!(quadratic.shape_count(Quad4, false), None);

    let monomial = FeType::MONOMIAL_CONSTANT;
    assert_eq!(monomial.shape_count(Quad4, false), Some(1));
    assert_eq!(monomial.shape_count(Segment2, true), Some(2));
    assert_eq!(monomial.shape_count(Segment2, false), None);

    let unsupported = FeType {
        family: FeFamily::Monomial,
        order: FeOrder::First,
    };
    assert_eq!(unsupported.shape_count(Tri3, false), None);
}

#[test]
fn fe_type_display() {
    assert_eq!(FeType::LAGRANGE_SECOND.to_string(), "second order Lagrange");
    assert_eq!(FeType::MONOMIAL_CONSTANT.to_string(), "constant monomial");
}

#[test]
fn names_resolve_to_insertion_indices() {
    let variables = VariableSet::from_variables([
        Variable::new("u", FeType::LAGRANGE_FIRST),
        Variable::new("temperature", FeType::LAGRANGE_FIRST).with_subdomains([2]),
    ])
    .unwrap();
    assert_eq!(variables.len(), 2);
    assert_eq!(variables.resolve("temperature").unwrap(), VariableId(1));
    assert!(variables.is_active(VariableId(0), 5));
    assert!(variables.is_active(VariableId(1), 2));
    assert!(!variables.is_active(VariableId(1), 0));
    assert_eq!(variables.fe_types(), vec![FeType::LAGRANGE_FIRST]);

    let error = variables.resolve("pressure").unwrap_err();
    assert_eq!(
        error.kind(),
        &AssemblyErrorKind::UnknownVariable {
            name: "pressure".to_string()
        }
    );
}

#[test]
fn duplicate_names_and_bad_scaling_are_rejected() {
    let mut variables = VariableSet::new();
    variables.add(Variable::new("u", FeType::LAGRANGE_FIRST)).unwrap();
    let duplicate = variables.add(Variable::new("u", FeType::MONOMIAL_CONSTANT)).unwrap_err();
    assert!(matches!(duplicate.kind(), AssemblyErrorKind::InvalidParameter { .. }));

    for scaling in [0.0, f64::NAN, f64::INFINITY] {
        let error = variables
            .add(Variable::new("v", FeType::LAGRANGE_FIRST).with_scaling(scaling))
            .unwrap_err();
        assert!(error.is_setup_error());
    }
    assert_eq!(variables.len(), 1);
}

#[test]
fn variables_deserialize_with_defaults() {
    let json = r#"{ "name": "u", "fe_type": { "family": "Lagrange", "order": "First" } }"#;
    let variable: Variable = serde_json::from_str(json).unwrap();
    assert_eq!(variable, Variable::new("u", FeType::LAGRANGE_FIRST));
    assert_eq!(variable.scaling(), 1.0);
    assert!(variable.is_active_on(17));
}
