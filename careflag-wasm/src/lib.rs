//! Framework-neutral WASM <-> JavaScript bridge over the bundled catalog.

use careflag_core::{
    Catalog, Choice, ConfigError, Conflict, EngineConfig, FieldValue, LabReport, PatientSnapshot,
};
use careflag_engine::{shared_catalog, sort_by_severity, EvaluationContext, RuleEngine};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsEngineConfig {
    #[serde(default)]
    numeric_tolerance: Option<f64>,
}

impl From<JsEngineConfig> for EngineConfig {
    fn from(cfg: JsEngineConfig) -> Self {
        let mut base = EngineConfig::default();
        if let Some(tolerance) = cfg.numeric_tolerance {
            base.numeric_tolerance = tolerance;
        }
        base
    }
}

#[derive(Serialize)]
struct MergeResult {
    snapshot: PatientSnapshot,
    conflicts: Vec<Conflict>,
}

#[derive(Serialize)]
struct ResolveResult {
    snapshot: PatientSnapshot,
    conflict: Conflict,
}

/// Traffic-light status (`"green"`, `"amber"`, `"red"`, `"unknown"`).
#[wasm_bindgen]
pub fn classify_metric(metric: &str, value: JsValue) -> Result<String, JsValue> {
    init_panic_hook();
    let catalog = catalog()?;
    // anything that is not a scalar is simply unknown
    let status = match from_value::<FieldValue>(value) {
        Ok(value) => catalog.classify(metric, &value),
        Err(_) => careflag_core::TrafficLightStatus::Unknown,
    };
    Ok(status.as_str().to_string())
}

/// Alerts for a snapshot. `today` is `YYYY-MM-DD`; without it date-based
/// rules do not apply.
#[wasm_bindgen]
pub fn evaluate_snapshot(
    snapshot: JsValue,
    today: Option<String>,
    by_severity: Option<bool>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let snapshot: PatientSnapshot = from_value(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Cannot read snapshot: {err}")))?;

    let context = match today {
        Some(text) => {
            let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map_err(|err| JsValue::from_str(&format!("Cannot read today {text:?}: {err}")))?;
            EvaluationContext::on(date)
        }
        None => EvaluationContext::default(),
    };

    let mut alerts = RuleEngine::new(catalog()?).evaluate(&snapshot, &context);
    if by_severity.unwrap_or(false) {
        sort_by_severity(&mut alerts);
    }

    to_js(&alerts, "alerts")
}

/// Merge form values with an extracted lab report.
#[wasm_bindgen]
pub fn merge_sources(
    form: JsValue,
    document: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let form: PatientSnapshot = from_value(form)
        .map_err(|err| JsValue::from_str(&format!("Cannot read form: {err}")))?;
    let document: LabReport = from_value(document)
        .map_err(|err| JsValue::from_str(&format!("Cannot read lab report: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsEngineConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
            EngineConfig::from(cfg)
        }
        None => EngineConfig::default(),
    };

    let (snapshot, conflicts) = careflag_engine::merge(&form, &document, &cfg);
    to_js(
        &MergeResult {
            snapshot,
            conflicts,
        },
        "merge result",
    )
}

/// Apply `choice` (`"use_form"` or `"use_document"`) to one conflict.
#[wasm_bindgen]
pub fn resolve_conflict(
    snapshot: JsValue,
    conflict: JsValue,
    choice: &str,
) -> Result<JsValue, JsValue> {
    init_panic_hook();
    let snapshot: PatientSnapshot = from_value(snapshot)
        .map_err(|err| JsValue::from_str(&format!("Cannot read snapshot: {err}")))?;
    let mut conflict: Conflict = from_value(conflict)
        .map_err(|err| JsValue::from_str(&format!("Cannot read conflict: {err}")))?;
    let choice: Choice = choice
        .parse()
        .map_err(|err| JsValue::from_str(&format!("{err}")))?;

    let snapshot = careflag_engine::resolve(&snapshot, &mut conflict, choice);
    to_js(&ResolveResult { snapshot, conflict }, "resolution")
}

/// The bundled catalog as pretty JSON.
#[wasm_bindgen]
pub fn catalog_json() -> Result<String, JsValue> {
    catalog()?.to_json_pretty().map_err(config_error)
}

/// Plain JS objects rather than `Map`s, so snapshots read like the input.
fn to_js<T: Serialize>(value: &T, what: &str) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Cannot serialize {what}: {err}")))
}

fn catalog() -> Result<&'static Catalog, JsValue> {
    shared_catalog().map_err(config_error)
}

fn config_error(err: ConfigError) -> JsValue {
    JsValue::from_str(&format!("Catalog error: {err}"))
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}
