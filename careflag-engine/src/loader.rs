use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use careflag_core::{Catalog, ConfigError};

/// Diabetes catalog shipped with the engine.
pub const DEFAULT_CATALOG_JSON: &str = include_str!("../data/default_catalog.json");

static SHARED_CATALOG: OnceLock<Catalog> = OnceLock::new();

/// Load and validate a catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, ConfigError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = Catalog::from_json_str(&json)?;
    tracing::info!(
        path = %path.display(),
        metrics = catalog.metrics().len(),
        rules = catalog.rules().len(),
        "threshold catalog loaded"
    );
    Ok(catalog)
}

/// Parse the bundled catalog. Each call builds a fresh copy.
pub fn builtin_catalog() -> Result<Catalog, ConfigError> {
    Catalog::from_json_str(DEFAULT_CATALOG_JSON)
}

/// Process-wide bundled catalog, parsed on first use and read-only after.
pub fn shared_catalog() -> Result<&'static Catalog, ConfigError> {
    if let Some(catalog) = SHARED_CATALOG.get() {
        return Ok(catalog);
    }
    let catalog = builtin_catalog()?;
    tracing::info!(
        metrics = catalog.metrics().len(),
        rules = catalog.rules().len(),
        "bundled threshold catalog loaded"
    );
    Ok(SHARED_CATALOG.get_or_init(|| catalog))
}
