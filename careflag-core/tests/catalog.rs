use std::fs;

use careflag_core::{
    Bound, Catalog, ConfigError, Direction, FieldValue, Predicate, Severity, TrafficLightStatus,
};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn fixture_catalog() -> Catalog {
    let json = fs::read_to_string(fixture_path("glycaemic_catalog.json"))
        .expect("cannot read catalog fixture");
    Catalog::from_json_str(&json).expect("fixture catalog must load")
}

#[test]
fn loads_metrics_and_rules_in_order() {
    let catalog = fixture_catalog();

    assert_eq!(catalog.metrics().len(), 3);
    let egfr = catalog.metric("egfr").expect("egfr defined");
    assert_eq!(egfr.direction, Direction::LowerIsWorse);
    assert_eq!(egfr.green_max, Bound::At(60.0));

    let heart_rate = catalog.metric("heart_rate").expect("heart_rate defined");
    assert_eq!(heart_rate.amber_max, Bound::Unbounded);
    assert_eq!(heart_rate.direction, Direction::HigherIsWorse);

    let ids: Vec<_> = catalog.rules().iter().map(|rule| rule.id.as_str()).collect();
    assert_eq!(ids, ["hba1c_poor_control", "renal_caution"]);
    assert_eq!(catalog.rules()[0].severity, Severity::High);
    assert!(matches!(catalog.rules()[1].when, Predicate::All { .. }));
}

#[test]
fn dump_then_load_is_lossless() {
    let catalog = fixture_catalog();
    let dumped = catalog.to_json_pretty().expect("catalog serializes");
    let reloaded = Catalog::from_json_str(&dumped).expect("dump reloads");
    assert_eq!(catalog, reloaded);
    assert!(dumped.contains("\"inf\""));
}

#[test]
fn rejects_green_above_amber() {
    let json = r#"{"metrics": [{"name": "hba1c", "green_max": 9.5, "amber_max": 9.0}]}"#;
    let err = Catalog::from_json_str(json).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidMetric { ref metric, .. } if metric == "hba1c"));
}

#[test]
fn rejects_inverted_lower_is_worse_bounds() {
    let json = r#"{"metrics": [{"name": "egfr", "green_max": 30, "amber_max": 60, "direction": "lower_is_worse"}]}"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::InvalidMetric { .. })
    ));
}

#[test]
fn rejects_unbounded_green_under_bounded_amber() {
    let json = r#"{"metrics": [{"name": "bmi", "green_max": "inf", "amber_max": 30}]}"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::InvalidMetric { .. })
    ));
}

#[test]
fn rejects_missing_threshold_key() {
    let json = r#"{"metrics": [{"name": "hba1c", "green_max": 7.0}]}"#;
    let err = Catalog::from_json_str(json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref message) if message.contains("amber_max")));
}

#[test]
fn rejects_non_numeric_bound() {
    let json = r#"{"metrics": [{"name": "hba1c", "green_max": "seven", "amber_max": 9.0}]}"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn rejects_misspelled_metric_keys() {
    let json = r#"{"metrics": [{"name": "egfr", "green_max": 60, "amber_max": 30, "directon": "lower_is_worse"}]}"#;
    let err = Catalog::from_json_str(json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref message) if message.contains("directon")));
}

#[test]
fn rejects_misspelled_predicate_keys() {
    let json = r#"{
        "metrics": [{"name": "bmi", "green_max": 25, "amber_max": 30}],
        "rules": [{"id": "r", "title": "t", "message": "m", "severity": "LOW",
                   "when": {"kind": "status", "metric": "bmi", "feild": "bmi_recorded", "in": ["red"]}}]
    }"#;
    let err = Catalog::from_json_str(json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ref message) if message.contains("feild")));
}

#[test]
fn contains_predicate_needs_a_value() {
    let json = r#"{
        "metrics": [],
        "rules": [{"id": "r", "title": "t", "message": "m", "severity": "HIGH",
                   "when": {"kind": "contains", "field": "current_medications", "value": " "}}]
    }"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::InvalidRule { .. })
    ));
}

#[test]
fn rejects_duplicates() {
    let metric = r#"{"name": "hba1c", "green_max": 7.0, "amber_max": 9.0}"#;
    let json = format!(r#"{{"metrics": [{metric}, {metric}]}}"#);
    assert!(matches!(
        Catalog::from_json_str(&json),
        Err(ConfigError::DuplicateMetric(ref name)) if name == "hba1c"
    ));

    let rule = r#"{"id": "smoker", "title": "t", "message": "m", "severity": "LOW",
                   "when": {"kind": "is_true", "field": "smoker"}}"#;
    let json = format!(r#"{{"metrics": [], "rules": [{rule}, {rule}]}}"#);
    assert!(matches!(
        Catalog::from_json_str(&json),
        Err(ConfigError::DuplicateRule(ref id)) if id == "smoker"
    ));
}

#[test]
fn rejects_status_rule_on_unknown_metric() {
    let json = r#"{
        "metrics": [],
        "rules": [{"id": "r", "title": "t", "message": "m", "severity": "HIGH",
                   "when": {"kind": "status", "metric": "ldl", "in": ["red"]}}]
    }"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::UnknownMetric { ref metric, .. }) if metric == "ldl"
    ));
}

#[test]
fn rejects_empty_composite() {
    let json = r#"{
        "metrics": [],
        "rules": [{"id": "r", "title": "t", "message": "m", "severity": "LOW",
                   "when": {"kind": "any", "of": []}}]
    }"#;
    assert!(matches!(
        Catalog::from_json_str(json),
        Err(ConfigError::InvalidRule { .. })
    ));
}

#[test]
fn loads_from_json_value() {
    let value: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(fixture_path("glycaemic_catalog.json")).expect("fixture"),
    )
    .expect("fixture is JSON");
    let catalog = Catalog::from_json_value(&value).expect("value loads");
    assert_eq!(catalog, fixture_catalog());
}

#[test]
fn catalog_classify_uses_metric_bands() {
    let catalog = fixture_catalog();
    assert_eq!(
        catalog.classify("heart_rate", &FieldValue::Number(180.0)),
        TrafficLightStatus::Amber
    );
}
