use careflag_core::{
    classify, Bound, Catalog, CatalogDocument, Direction, FieldValue, MetricDefinition,
    TrafficLightStatus,
};

fn metric(name: &str, green: f64, amber: f64, direction: Direction) -> MetricDefinition {
    MetricDefinition {
        name: name.to_string(),
        unit: String::new(),
        green_max: Bound::At(green),
        amber_max: Bound::At(amber),
        direction,
    }
}

fn catalog() -> Catalog {
    Catalog::from_document(CatalogDocument {
        metrics: vec![
            metric("hba1c", 7.0, 9.0, Direction::HigherIsWorse),
            metric("egfr", 60.0, 30.0, Direction::LowerIsWorse),
        ],
        rules: Vec::new(),
    })
    .expect("valid catalog")
}

#[test]
fn higher_is_worse_bands_are_monotonic() {
    let catalog = catalog();
    let status = |value: f64| classify(&catalog, "hba1c", &FieldValue::Number(value));

    assert_eq!(status(6.9), TrafficLightStatus::Green);
    assert_eq!(status(7.0), TrafficLightStatus::Green);
    assert_eq!(status(8.5), TrafficLightStatus::Amber);
    assert_eq!(status(9.0), TrafficLightStatus::Amber);
    assert_eq!(status(9.1), TrafficLightStatus::Red);
}

#[test]
fn lower_is_worse_mirrors_the_bands() {
    let catalog = catalog();
    let status = |value: f64| classify(&catalog, "egfr", &FieldValue::Number(value));

    assert_eq!(status(90.0), TrafficLightStatus::Green);
    assert_eq!(status(60.0), TrafficLightStatus::Green);
    assert_eq!(status(45.0), TrafficLightStatus::Amber);
    assert_eq!(status(30.0), TrafficLightStatus::Amber);
    assert_eq!(status(29.9), TrafficLightStatus::Red);
}

#[test]
fn unknown_inputs_never_fail() {
    let catalog = catalog();

    assert_eq!(
        classify(&catalog, "ldl", &FieldValue::Number(3.0)),
        TrafficLightStatus::Unknown
    );
    assert_eq!(
        classify(&catalog, "hba1c", &FieldValue::Number(f64::NAN)),
        TrafficLightStatus::Unknown
    );
    assert_eq!(
        classify(&catalog, "hba1c", &FieldValue::Text("pending".into())),
        TrafficLightStatus::Unknown
    );
    assert_eq!(
        classify(&catalog, "hba1c", &FieldValue::Flag(true)),
        TrafficLightStatus::Unknown
    );
}

#[test]
fn numeric_text_is_classified() {
    let catalog = catalog();
    assert_eq!(
        classify(&catalog, "hba1c", &FieldValue::Text("9.4".into())),
        TrafficLightStatus::Red
    );
}

#[test]
fn unbounded_amber_never_turns_red() {
    let open = MetricDefinition {
        amber_max: Bound::Unbounded,
        ..metric("heart_rate", 100.0, 0.0, Direction::HigherIsWorse)
    };
    assert_eq!(open.classify(250.0), TrafficLightStatus::Amber);
    assert_eq!(open.classify(f64::INFINITY), TrafficLightStatus::Unknown);
}
