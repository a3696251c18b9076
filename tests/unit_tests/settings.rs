use femcore::assembly::{Partitioning, ScatterDiscipline};
use femcore::error::AssemblyErrorKind;
use femcore::quadrature::QuadratureOrder;
use femcore::settings::AssemblySettings;

#[test]
fn empty_json_yields_defaults() {
    let settings: AssemblySettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, AssemblySettings::default());
    assert_eq!(settings.num_threads, None);
    assert_eq!(settings.partitioning, Partitioning::Contiguous);
    assert_eq!(settings.discipline, ScatterDiscipline::Atomic);
    assert_eq!(settings.quadrature_order, QuadratureOrder(2));
}

#[test]
fn settings_load_from_json() {
    let json = r#"{
        "num_threads": 3,
        "partitioning": { "BlockInterleaved": { "block_size": 16 } },
        "discipline": "ThreadPartials",
        "quadrature_order": 4
    }"#;
    let settings: AssemblySettings = serde_json::from_str(json).unwrap();
    let expected = AssemblySettings::default()
        .with_num_threads(3)
        .with_partitioning(Partitioning::BlockInterleaved { block_size: 16 })
        .with_discipline(ScatterDiscipline::ThreadPartials)
        .with_quadrature_order(4);
    assert_eq!(settings, expected);
    assert!(settings.validate().is_ok());
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(serde_json::from_str::<AssemblySettings>(r#"{ "threads": 3 }"#).is_err());
}

#[test]
fn validation_rejects_zero_sizes() {
    let error = AssemblySettings::default().with_num_threads(0).validate().unwrap_err();
    assert!(matches!(error.kind(), AssemblyErrorKind::InvalidParameter { .. }));

    let settings = AssemblySettings::default().with_partitioning(Partitioning::BlockInterleaved { block_size: 0 });
    assert!(settings.validate().is_err());
}
