use careflag_core::{
    Choice, DocumentValue, EngineConfig, FieldValue, LabReport, PatientSnapshot, Resolution,
};
use careflag_engine::{
    builtin_catalog, EvaluationContext, ReconcileError, RuleEngine, SessionError,
    SessionRegistry,
};

fn report(hba1c: f64) -> LabReport {
    LabReport::from([("hba1c".to_string(), DocumentValue::new(hba1c, "%"))])
}

#[test]
fn sessions_are_isolated() {
    let mut registry = SessionRegistry::new(EngineConfig::default());
    registry
        .create("alpha")
        .expect("new session")
        .set_field("hba1c", 8.2);
    registry
        .create("beta")
        .expect("new session")
        .set_field("hba1c", 6.1);

    let alpha = registry.get_mut("alpha").expect("alpha exists");
    let pending = alpha.ingest_document(report(9.4));
    assert_eq!(pending.len(), 1);

    let beta = registry.get("beta").expect("beta exists");
    assert!(beta.conflicts().is_empty());
    assert_eq!(beta.snapshot().number("hba1c"), Ok(Some(6.1)));
}

#[test]
fn duplicate_and_unknown_keys_are_errors() {
    let mut registry = SessionRegistry::default();
    registry.create("alpha").expect("new session");

    assert_eq!(
        registry.create("alpha").err(),
        Some(SessionError::AlreadyExists("alpha".to_string()))
    );
    assert_eq!(
        registry.end("gamma").err(),
        Some(SessionError::NotFound("gamma".to_string()))
    );

    registry.end("alpha").expect("alpha exists");
    assert!(registry.is_empty());
    assert!(registry.get("alpha").is_none());
}

#[test]
fn snapshot_is_the_form_until_a_document_arrives() {
    let mut registry = SessionRegistry::default();
    let session = registry.create("alpha").expect("new session");
    session.set_field("hba1c", 8.2);
    session.set_field("smoking_status", "Never Smoked");

    assert_eq!(session.snapshot(), *session.form());
    assert!(session.reconciliation().is_none());
    assert_eq!(
        session.resolve("hba1c", Choice::UseForm),
        Err(ReconcileError::NoConflict("hba1c".to_string()))
    );
}

#[test]
fn session_flow_resolves_and_re_surfaces_on_upload() {
    let catalog = builtin_catalog().expect("bundled catalog loads");
    let engine = RuleEngine::new(&catalog);
    let context = EvaluationContext::default();

    let mut registry = SessionRegistry::default();
    let session = registry.create("alpha").expect("new session");
    session.set_field("hba1c", 8.2);

    session.ingest_document(report(9.4));
    assert!(session
        .evaluate(&engine, &context)
        .iter()
        .all(|alert| !alert.rule_id.starts_with("hba1c")));

    session
        .resolve("hba1c", Choice::UseDocument)
        .expect("conflict exists");
    let alerts = session.evaluate(&engine, &context);
    assert_eq!(alerts[0].rule_id, "hba1c_poor_control");

    let pending = session.ingest_document(report(9.4));
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].resolution, Resolution::Unresolved);
    assert!(!session.snapshot().contains("hba1c"));
}

#[test]
fn form_edits_after_upload_recheck_the_field() {
    let mut registry = SessionRegistry::default();
    let session = registry.create("alpha").expect("new session");
    session.set_field("hba1c", 8.2);
    session.ingest_document(report(9.4));

    session.set_field("hba1c", 9.4);
    assert!(session.conflicts().is_empty());
    assert_eq!(session.snapshot().number("hba1c"), Ok(Some(9.4)));

    session.clear_field("hba1c");
    assert_eq!(session.snapshot().number("hba1c"), Ok(Some(9.4)));
    assert!(!session.form().contains("hba1c"));
}

#[test]
fn replacing_the_form_merges_again() {
    let mut registry = SessionRegistry::default();
    let session = registry.create("alpha").expect("new session");
    session.set_field("hba1c", 8.2);
    session.ingest_document(report(9.4));
    session
        .resolve("hba1c", Choice::UseForm)
        .expect("conflict exists");

    session.replace_form(PatientSnapshot::new().with("hba1c", 7.5));

    let conflicts = session.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].resolution, Resolution::Unresolved);
    assert_eq!(conflicts[0].form_value, FieldValue::Number(7.5));
}
