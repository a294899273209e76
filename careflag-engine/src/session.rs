//! Per-consultation state with an explicit lifecycle.

use std::collections::HashMap;

use careflag_core::{Alert, Choice, Conflict, EngineConfig, FieldValue, LabReport, PatientSnapshot};

use crate::reconcile::{ReconcileError, Reconciliation};
use crate::rules::{EvaluationContext, RuleEngine};

/// One consultation: the form as typed, and the reconciliation against the
/// most recent lab report, if any.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    config: EngineConfig,
    form: PatientSnapshot,
    reconciliation: Option<Reconciliation>,
}

impl Session {
    pub fn new(key: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            key: key.into(),
            config,
            form: PatientSnapshot::new(),
            reconciliation: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn form(&self) -> &PatientSnapshot {
        &self.form
    }

    pub fn reconciliation(&self) -> Option<&Reconciliation> {
        self.reconciliation.as_ref()
    }

    /// Edit one form field. After a document was ingested only this field
    /// is re-checked against it.
    pub fn set_field(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if let Some(reconciliation) = self.reconciliation.as_mut() {
            reconciliation.update_form(field, Some(value.clone()));
        }
        self.form.insert(field, value);
    }

    pub fn clear_field(&mut self, field: &str) {
        if let Some(reconciliation) = self.reconciliation.as_mut() {
            reconciliation.update_form(field, None);
        }
        self.form.remove(field);
    }

    /// Replace the whole form. An ingested document is merged again from
    /// scratch, so earlier resolutions are dropped.
    pub fn replace_form(&mut self, form: PatientSnapshot) {
        self.form = form;
        if let Some(previous) = self.reconciliation.take() {
            let document = previous.document().clone();
            self.reconciliation = Some(Reconciliation::merge(&self.form, &document, &self.config));
        }
    }

    /// Merge a freshly extracted report against the current form, replacing
    /// any previous reconciliation. Returns the pending conflicts.
    pub fn ingest_document(&mut self, document: LabReport) -> Vec<Conflict> {
        let reconciliation = Reconciliation::merge(&self.form, &document, &self.config);
        let pending = reconciliation.pending().cloned().collect();
        tracing::debug!(session = %self.key, "document ingested");
        self.reconciliation = Some(reconciliation);
        pending
    }

    pub fn resolve(
        &mut self,
        field: &str,
        choice: Choice,
    ) -> Result<PatientSnapshot, ReconcileError> {
        match self.reconciliation.as_mut() {
            Some(reconciliation) => reconciliation.resolve(field, choice),
            None => Err(ReconcileError::NoConflict(field.to_string())),
        }
    }

    /// The view rules run against.
    pub fn snapshot(&self) -> PatientSnapshot {
        match &self.reconciliation {
            Some(reconciliation) => reconciliation.snapshot(),
            None => self.form.clone(),
        }
    }

    pub fn conflicts(&self) -> Vec<Conflict> {
        self.reconciliation
            .as_ref()
            .map(Reconciliation::conflicts)
            .unwrap_or_default()
    }

    pub fn evaluate(&self, engine: &RuleEngine<'_>, context: &EvaluationContext) -> Vec<Alert> {
        engine.evaluate(&self.snapshot(), context)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session `{0}` already exists")]
    AlreadyExists(String),
    #[error("session `{0}` not found")]
    NotFound(String),
}

/// Sessions keyed by caller-supplied key. Nothing is shared between
/// sessions; callers serialize access to any single session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: EngineConfig,
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    pub fn create(&mut self, key: &str) -> Result<&mut Session, SessionError> {
        if self.sessions.contains_key(key) {
            return Err(SessionError::AlreadyExists(key.to_string()));
        }
        tracing::debug!(session = key, "session started");
        Ok(self
            .sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key, self.config.clone())))
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    /// Discard a session and everything it holds.
    pub fn end(&mut self, key: &str) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(key)
            .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        tracing::debug!(session = key, "session ended");
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
