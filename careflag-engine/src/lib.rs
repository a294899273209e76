//! Rule evaluation, form/report reconciliation and consultation sessions
//! on top of `careflag-core`.

mod loader;
pub mod reconcile;
pub mod rules;
pub mod session;

pub use loader::{builtin_catalog, load_catalog, shared_catalog, DEFAULT_CATALOG_JSON};
pub use reconcile::{merge, resolve, FieldState, Provenance, ReconcileError, Reconciliation};
pub use rules::{sort_by_severity, EvaluationContext, RuleEngine};
pub use session::{Session, SessionError, SessionRegistry};
