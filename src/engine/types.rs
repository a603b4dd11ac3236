//! Public types for the sync engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::Entry;
use crate::migration::MigrationError;
use crate::store::StoreError;
use crate::validation::FieldError;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// One non-blocking user-facing notification. Every mutating operation
/// resolves to updated state plus exactly one of these — never an
/// indeterminate loading state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn success(title: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// A recorded sync failure, kept for later manual or automatic retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncErrorRecord {
    pub at: DateTime<Utc>,
    /// Which operation failed (`sync_entry`, `offline_sync`, ...).
    pub context: String,
    pub message: String,
}

/// Immutable snapshot of engine state for UI subscribers. Entry vectors are
/// shared whole-value `Arc`s: every snapshot stays internally consistent no
/// matter what the engine does next.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub entries: Arc<Vec<Entry>>,
    pub offline_entries: Arc<Vec<Entry>>,
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_errors: Vec<SyncErrorRecord>,
    /// Set when the remote reported an expired session; the host must
    /// re-authenticate and call
    /// [`clear_auth_reset`](super::SyncEngine::clear_auth_reset).
    pub auth_reset_required: bool,
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures of entry mutations.
#[derive(Debug, Error)]
pub enum EntryError {
    /// Field-level validation failures. Never retried automatically; the
    /// caller corrects input and resubmits.
    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("entry '{0}' not found")]
    NotFound(String),
}

/// Failures loading remote data at boot or month-switch time.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unknown schema version: the file is not loaded, surfaced as a load
    /// failure rather than silently skipped.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("malformed remote document: {0}")]
    Malformed(String),
}
