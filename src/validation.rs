// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entry and configuration validation.
//!
//! Validation is declaration-driven: every dynamic scored field is checked
//! against the static item catalog, on the item's storage scale (3-point
//! display values are normalized before validation, so scale checks always
//! run against the canonical 5-point range). Business-rule failures come
//! back as field-level error lists and never panic; only structurally
//! malformed input is an error elsewhere (at the serde boundary).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{self, ItemKind};
use crate::config::Configuration;
use crate::entry::{Entry, EntryType, FieldValue, Notes, SyncStatus};
use crate::scale;

/// Per-field free-text cap on notes.
pub const MAX_NOTE_LENGTH: usize = 2000;

/// Bounded clock skew: a new entry's timestamp may lead the clock by this
/// much before it is rejected.
pub fn max_future_skew() -> Duration {
    Duration::minutes(5)
}

/// Retention horizon: a newly created entry may not be backdated further
/// than this.
pub fn retention_horizon() -> Duration {
    Duration::days(731)
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Partial entry as submitted by a caller. [`sanitize_entry`] fills every
/// absent field; present fields are never overwritten.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub entry_type: Option<EntryType>,
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub scores: BTreeMap<String, FieldValue>,
    pub notes: Option<Notes>,
}

impl EntryDraft {
    #[must_use]
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Self::default()
        }
    }

    /// Chainable score setter, mostly for call sites building drafts inline.
    #[must_use]
    pub fn score(mut self, item_id: &str, value: FieldValue) -> Self {
        self.scores.insert(item_id.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Notes) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Fill the gaps in a draft and return a complete entry.
///
/// Generates `id`, stamps `timestamp`/`created_at`/`updated_at`, sets
/// `sync_status = Pending` and the default timezone — each only when the
/// draft left it absent. Display-scale values are normalized to the
/// canonical storage scale, and unset values (zero scale, empty selection,
/// empty string) are dropped rather than stored: submitting the same scale
/// value twice toggles it off.
#[must_use]
pub fn sanitize_entry(draft: EntryDraft, default_timezone: &str, now: DateTime<Utc>) -> Entry {
    let mut scores = draft.scores;
    normalize_display_scores(&mut scores);
    scores.retain(|_, value| !value.is_unset());

    Entry {
        id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        timestamp: draft.timestamp.unwrap_or(now),
        entry_type: draft.entry_type.unwrap_or(EntryType::Quick),
        sync_status: SyncStatus::Pending,
        timezone: draft
            .timezone
            .unwrap_or_else(|| default_timezone.to_string()),
        is_deleted: false,
        created_at: now,
        updated_at: now,
        notes: sanitize_notes(draft.notes),
        scores,
    }
}

/// Convert display-scale values to storage values in place. Only values on
/// catalog-declared 3-point items change; everything else is identity.
pub fn normalize_display_scores(scores: &mut BTreeMap<String, FieldValue>) {
    for (id, value) in scores.iter_mut() {
        let Some(ItemKind::Scale { points }) = catalog::item(id).map(|i| i.kind) else {
            continue;
        };
        if let FieldValue::Scale(v) = value {
            *v = scale::normalize(*v, points);
        }
    }
}

/// Drop empty note fields; collapse an all-empty block to `None`.
#[must_use]
pub fn sanitize_notes(notes: Option<Notes>) -> Option<Notes> {
    let mut notes = notes?;
    let prune = |field: &mut Option<String>| {
        if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
            *field = None;
        }
    };
    prune(&mut notes.observations);
    prune(&mut notes.reflections);
    prune(&mut notes.thankful_for);
    if notes.is_empty() {
        None
    } else {
        Some(notes)
    }
}

/// Validate an entry's fields against the item catalog.
///
/// Returns all failures at once rather than stopping at the first. Unknown
/// item identifiers pass through unchecked (forward compatibility).
pub fn validate_entry(entry: &Entry) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if entry.id.trim().is_empty() {
        errors.push(FieldError::new("id", "must not be empty"));
    }
    if entry.updated_at < entry.created_at {
        errors.push(FieldError::new("updated_at", "must not precede created_at"));
    }

    for (id, value) in &entry.scores {
        validate_score(id, value, &mut errors);
    }

    if let Some(notes) = &entry.notes {
        for (name, content) in notes.fields() {
            if content.is_some_and(|s| s.chars().count() > MAX_NOTE_LENGTH) {
                errors.push(FieldError::new(
                    format!("notes.{name}"),
                    format!("exceeds {MAX_NOTE_LENGTH} characters"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a newly created entry: field checks plus timestamp bounds
/// (bounded future skew, retention horizon). Updates to existing entries
/// keep their historic timestamps and use [`validate_entry`] instead.
pub fn validate_new_entry(entry: &Entry, now: DateTime<Utc>) -> Result<(), Vec<FieldError>> {
    let mut errors = match validate_entry(entry) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if entry.timestamp > now + max_future_skew() {
        errors.push(FieldError::new("timestamp", "lies in the future"));
    }
    if entry.timestamp < now - retention_horizon() {
        errors.push(FieldError::new(
            "timestamp",
            "older than the retention horizon",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_score(id: &str, value: &FieldValue, errors: &mut Vec<FieldError>) {
    let Some(item) = catalog::item(id) else {
        return; // unknown items are inert
    };

    match (item.kind, value) {
        (ItemKind::Scale { .. }, FieldValue::Scale(v)) => {
            // Values are stored normalized, so the check always runs against
            // the analytics-facing scale (5 for 3-point items).
            let max = catalog::effective_scale(id).unwrap_or(scale::CANONICAL_SCALE) as i64;
            if *v < 1 || *v > max {
                errors.push(FieldError::new(id, format!("must be between 1 and {max}")));
            }
        }
        (ItemKind::MultiSelect { options }, FieldValue::MultiSelect(values)) => {
            for v in values {
                if !options.contains(&v.as_str()) {
                    errors.push(FieldError::new(id, format!("unknown option '{v}'")));
                }
            }
            let mut seen = std::collections::BTreeSet::new();
            if !values.iter().all(|v| seen.insert(v)) {
                errors.push(FieldError::new(id, "duplicate options"));
            }
        }
        (ItemKind::Numeric, value) => match value.as_number() {
            Some(n) if (0.0..=100.0).contains(&n) => {}
            Some(_) => errors.push(FieldError::new(id, "must be between 0 and 100")),
            None => errors.push(FieldError::new(id, "must be a number")),
        },
        (ItemKind::Date, FieldValue::DateStr(s)) => {
            if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                errors.push(FieldError::new(id, "must be a YYYY-MM-DD date"));
            }
        }
        (_, _) => {
            errors.push(FieldError::new(id, "wrong value shape for this item"));
        }
    }
}

/// Validate a configuration object. Item ids referenced by view
/// configurations that are missing from the catalog are tolerated (inert),
/// per the forward-compatibility contract.
pub fn validate_config(config: &Configuration) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if config.user_id.trim().is_empty() {
        errors.push(FieldError::new("user_id", "must not be empty"));
    }
    if config.version.trim().is_empty() {
        errors.push(FieldError::new("version", "must not be empty"));
    }
    if config.display_options.morning_end_hour > 23 {
        errors.push(FieldError::new(
            "display_options.morning_end_hour",
            "must be an hour between 0 and 23",
        ));
    }
    if config.display_options.evening_start_hour > 23 {
        errors.push(FieldError::new(
            "display_options.evening_start_hour",
            "must be an hour between 0 and 23",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
