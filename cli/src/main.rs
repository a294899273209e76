use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use careflag_core::{
    Alert, Catalog, Choice, Conflict, EngineConfig, FieldValue, LabReport, PatientSnapshot,
    Resolution,
};
use careflag_engine::{
    builtin_catalog, load_catalog, sort_by_severity, EvaluationContext, Reconciliation, RuleEngine,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "careflag",
    about = "Traffic-light checks, clinical alerts and form/lab report reconciliation."
)]
struct Args {
    /// Catalog JSON file. Defaults to the bundled diabetes catalog.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the traffic-light status of one metric value.
    Classify { metric: String, value: String },
    /// Merge a form with an optional lab report and evaluate the rules.
    Evaluate(EvaluateArgs),
    /// Validate a catalog and print it.
    Catalog {
        /// Catalog file to validate instead of the active one.
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct EvaluateArgs {
    /// Form values as a JSON object.
    #[arg(long)]
    form: PathBuf,

    /// Extracted lab report as JSON (`{"field": {"value": .., "unit": ".."}}`).
    #[arg(long)]
    document: Option<PathBuf>,

    /// Reference date for age and duration rules.
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Settle a conflict, e.g. `--resolve hba1c=use_document`. Repeatable.
    #[arg(long = "resolve", value_name = "FIELD=CHOICE", value_parser = parse_resolution)]
    resolutions: Vec<(String, Choice)>,

    /// Numeric agreement tolerance.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Order alerts HIGH first.
    #[arg(long)]
    by_severity: bool,

    /// Print the snapshot, conflicts and alerts as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let catalog = active_catalog(args.catalog.as_deref())?;

    match args.command {
        Command::Classify { metric, value } => {
            if catalog.metric(&metric).is_none() {
                tracing::warn!(metric = %metric, "metric is not in the catalog");
            }
            let status = catalog.classify(&metric, &FieldValue::from(value.as_str()));
            println!("{} {}", status.symbol(), status);
        }
        Command::Evaluate(evaluate_args) => evaluate(&catalog, evaluate_args)?,
        Command::Catalog { check } => {
            let catalog = match check {
                Some(path) => read_catalog(&path)?,
                None => catalog,
            };
            println!("{}", catalog.to_json_pretty()?);
            eprintln!(
                "Catalog OK: {} metrics, {} rules",
                catalog.metrics().len(),
                catalog.rules().len()
            );
        }
    }

    Ok(())
}

fn evaluate(catalog: &Catalog, args: EvaluateArgs) -> anyhow::Result<()> {
    let form: PatientSnapshot = read_json(&args.form)?;

    let mut config = EngineConfig::default();
    if let Some(tolerance) = args.tolerance {
        config.numeric_tolerance = tolerance;
    }

    let (snapshot, conflicts) = match &args.document {
        Some(path) => {
            let document: LabReport = read_json(path)?;
            let mut reconciliation = Reconciliation::merge(&form, &document, &config);
            for (field, choice) in &args.resolutions {
                reconciliation
                    .resolve(field, *choice)
                    .with_context(|| format!("Cannot resolve {field}"))?;
            }
            (reconciliation.snapshot(), reconciliation.conflicts())
        }
        None if !args.resolutions.is_empty() => bail!("--resolve needs a --document"),
        None => (form, Vec::new()),
    };

    let context = args.today.map(EvaluationContext::on).unwrap_or_default();
    let mut alerts = RuleEngine::new(catalog).evaluate(&snapshot, &context);
    if args.by_severity {
        sort_by_severity(&mut alerts);
    }

    if args.json {
        let report = serde_json::json!({
            "snapshot": snapshot,
            "conflicts": conflicts,
            "alerts": alerts,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&conflicts, &alerts);
    }

    Ok(())
}

fn print_report(conflicts: &[Conflict], alerts: &[Alert]) {
    if !conflicts.is_empty() {
        println!("Conflicts: {}", conflicts.len());
        for conflict in conflicts {
            let state = match conflict.resolution {
                Resolution::Unresolved => "unresolved",
                Resolution::UseForm => "using form",
                Resolution::UseDocument => "using document",
            };
            let unit = if conflict.unit.is_empty() {
                String::new()
            } else {
                format!(" {}", conflict.unit)
            };
            println!(
                "  {}: form {} / document {}{} ({state})",
                conflict.field_name, conflict.form_value, conflict.document_value, unit
            );
        }
    }

    println!("Alerts: {}", alerts.len());
    for alert in alerts {
        println!("  [{}] {}: {}", alert.severity, alert.title, alert.message);
    }
}

fn active_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    match path {
        Some(path) => read_catalog(path),
        None => builtin_catalog().context("Bundled catalog is invalid"),
    }
}

fn read_catalog(path: &Path) -> anyhow::Result<Catalog> {
    load_catalog(path).with_context(|| format!("Cannot load catalog {:?}", path))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read file {:?}", path))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn parse_resolution(input: &str) -> Result<(String, Choice), String> {
    let (field, choice) = input
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=CHOICE, got `{input}`"))?;
    let choice = choice.parse::<Choice>().map_err(|err| err.to_string())?;
    Ok((field.trim().to_string(), choice))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_flags_parse() {
        assert_eq!(
            parse_resolution("hba1c=use_document"),
            Ok(("hba1c".to_string(), Choice::UseDocument))
        );
        assert_eq!(
            parse_resolution("egfr=form"),
            Ok(("egfr".to_string(), Choice::UseForm))
        );
        assert!(parse_resolution("hba1c").is_err());
        assert!(parse_resolution("hba1c=maybe").is_err());
    }

    #[test]
    fn today_must_be_iso() {
        assert!(parse_date("2025-01-15").is_ok());
        assert!(parse_date("15/01/2025").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
