//! Tracking entry data structures.
//!
//! The [`Entry`] is the core data unit that flows through the sync engine:
//! one user-submitted observation set for a single view session. Entries are
//! grouped into [`MonthlyTrackingFile`]s, the remote unit of persistence
//! (one file per calendar month, rewritten wholesale on every sync).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current schema version stamped on new files and entries.
pub const SCHEMA_VERSION: &str = "1.3.0";

/// View type of an entry. Determines the applicable item set and the
/// once-per-day semantics (`Morning`/`Evening` collapse onto one entry per
/// local calendar day; `Quick` never collapses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Morning,
    Evening,
    Quick,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Evening => write!(f, "evening"),
            Self::Quick => write!(f, "quick"),
        }
    }
}

/// Remote persistence state of an entry. Mutated only by the sync engine,
/// never by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    #[default]
    Pending,
    Failed,
}

/// Value of a dynamic scored field, keyed by tracking-item identifier.
///
/// Untagged on the wire: integers read as `Scale`, other numbers as
/// `Numeric`, string arrays as `MultiSelect`, strings as `DateStr`. Anything
/// else is carried through as `Other` so unknown fields written by newer
/// clients survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scale(i64),
    Numeric(f64),
    MultiSelect(Vec<String>),
    DateStr(String),
    Other(Value),
}

impl FieldValue {
    /// Numeric view of the value, bridging integer and float encodings.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Scale(v) => Some(*v as f64),
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer scale view of the value.
    #[must_use]
    pub fn as_scale(&self) -> Option<i64> {
        match self {
            Self::Scale(v) => Some(*v),
            _ => None,
        }
    }

    /// True when the value means "unset": zero scale, zero numeric, empty
    /// selection or empty string. Such values are normalized to field
    /// deletion during sanitization (selecting a scale value twice toggles
    /// it off).
    #[must_use]
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Scale(v) => *v == 0,
            Self::Numeric(v) => *v == 0.0,
            Self::MultiSelect(values) => values.is_empty(),
            Self::DateStr(s) => s.is_empty(),
            Self::Other(v) => matches!(v, Value::Null | Value::Bool(false)),
        }
    }
}

/// Free-text notes block, by convention present on evening entries only
/// (not enforced structurally). Each field is capped at 2000 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Notes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflections: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thankful_for: Option<String>,
}

impl Notes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_none() && self.reflections.is_none() && self.thankful_for.is_none()
    }

    /// Field name / content pairs, in flattened-CSV column order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("observations", self.observations.as_deref()),
            ("reflections", self.reflections.as_deref()),
            ("thankful_for", self.thankful_for.as_deref()),
        ]
    }
}

/// One user-submitted observation set for a single view session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque unique id, generated client-side when absent.
    pub id: String,
    /// Authoritative ordering key.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// IANA zone the entry was recorded in. Informational.
    pub timezone: String,
    /// Soft-delete flag: deleted entries stay in storage and are restorable.
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Notes>,
    /// Dynamic scored fields, keyed by tracking-item identifier. Flattened
    /// onto the entry on the wire; unknown keys pass through untouched.
    #[serde(flatten)]
    pub scores: BTreeMap<String, FieldValue>,
}

impl Entry {
    /// Calendar day of this entry in the given zone. Drives the
    /// one-entry-per-day invariant for morning/evening types.
    #[must_use]
    pub fn local_day(&self, zone: Tz) -> NaiveDate {
        self.timestamp.with_timezone(&zone).date_naive()
    }

    /// `YYYY-MM` key of the monthly file this entry belongs to, derived in
    /// the same zone as day bucketing so the two can never disagree.
    #[must_use]
    pub fn month_key(&self, zone: Tz) -> String {
        self.timestamp.with_timezone(&zone).format("%Y-%m").to_string()
    }
}

/// The remote unit of persistence: all entries for one calendar month.
///
/// Created lazily on first write, loaded fully before any entry in the month
/// is merged, and rewritten wholesale on every successful sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrackingFile {
    pub version: String,
    /// `YYYY-MM` key; one file per month.
    pub month: String,
    pub entries: Vec<Entry>,
    /// Advisory, recomputed on every write.
    #[serde(default)]
    pub estimated_size_kb: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyTrackingFile {
    /// Empty file for a month, stamped with the current schema version.
    #[must_use]
    pub fn new(month: &str, now: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            month: month.to_string(),
            entries: Vec::new(),
            estimated_size_kb: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find an entry by id.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Insert or replace an entry by id. Returns `true` when an existing
    /// entry was replaced.
    pub fn upsert(&mut self, entry: Entry) -> bool {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *slot = entry;
            true
        } else {
            self.entries.push(entry);
            false
        }
    }

    /// Recompute the advisory size estimate and bump `updated_at`.
    /// Call before every write.
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        let bytes = serde_json::to_vec(&self.entries).map(|v| v.len()).unwrap_or(0);
        self.estimated_size_kb = (bytes as f64 / 1024.0 * 10.0).round() / 10.0;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn test_entry(id: &str) -> Entry {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 7, 30, 0).unwrap();
        Entry {
            id: id.to_string(),
            timestamp: at,
            entry_type: EntryType::Morning,
            sync_status: SyncStatus::Pending,
            timezone: "Europe/London".to_string(),
            is_deleted: false,
            created_at: at,
            updated_at: at,
            notes: None,
            scores: BTreeMap::from([
                ("energy_level".to_string(), FieldValue::Scale(3)),
                ("sleep_score".to_string(), FieldValue::Numeric(82.5)),
            ]),
        }
    }

    #[test]
    fn scores_flatten_onto_the_wire() {
        let entry = test_entry("e-1");
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["energy_level"], json!(3));
        assert_eq!(value["sleep_score"], json!(82.5));
        assert_eq!(value["type"], json!("morning"));
        assert_eq!(value["sync_status"], json!("pending"));
        // No nested "scores" object on the wire.
        assert!(value.get("scores").is_none());
    }

    #[test]
    fn unknown_fields_round_trip() {
        let raw = json!({
            "id": "e-2",
            "timestamp": "2026-03-14T07:30:00Z",
            "type": "quick",
            "timezone": "UTC",
            "created_at": "2026-03-14T07:30:00Z",
            "updated_at": "2026-03-14T07:30:00Z",
            "hot_flash_intensity": 4,
            "future_field": {"nested": true}
        });

        let entry: Entry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.scores["hot_flash_intensity"], FieldValue::Scale(4));
        assert!(matches!(entry.scores["future_field"], FieldValue::Other(_)));

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["future_field"], json!({"nested": true}));
    }

    #[test]
    fn field_value_untagged_parsing() {
        assert_eq!(
            serde_json::from_value::<FieldValue>(json!(4)).unwrap(),
            FieldValue::Scale(4)
        );
        assert_eq!(
            serde_json::from_value::<FieldValue>(json!(72.5)).unwrap(),
            FieldValue::Numeric(72.5)
        );
        assert_eq!(
            serde_json::from_value::<FieldValue>(json!(["cramps", "bloating"])).unwrap(),
            FieldValue::MultiSelect(vec!["cramps".to_string(), "bloating".to_string()])
        );
        assert_eq!(
            serde_json::from_value::<FieldValue>(json!("2026-03-01")).unwrap(),
            FieldValue::DateStr("2026-03-01".to_string())
        );
    }

    #[test]
    fn unset_detection() {
        assert!(FieldValue::Scale(0).is_unset());
        assert!(FieldValue::MultiSelect(vec![]).is_unset());
        assert!(FieldValue::DateStr(String::new()).is_unset());
        assert!(!FieldValue::Scale(1).is_unset());
        assert!(!FieldValue::Numeric(0.5).is_unset());
    }

    #[test]
    fn local_day_respects_zone() {
        let mut entry = test_entry("e-3");
        // 23:30 UTC on the 14th is already the 15th in Auckland.
        entry.timestamp = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap();

        let utc_day = entry.local_day(chrono_tz::UTC);
        let nz_day = entry.local_day(chrono_tz::Pacific::Auckland);
        assert_eq!(utc_day, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        assert_eq!(nz_day, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn month_key_follows_zone() {
        let mut entry = test_entry("e-4");
        entry.timestamp = Utc.with_ymd_and_hms(2026, 3, 31, 23, 30, 0).unwrap();
        assert_eq!(entry.month_key(chrono_tz::UTC), "2026-03");
        assert_eq!(entry.month_key(chrono_tz::Pacific::Auckland), "2026-04");
    }

    #[test]
    fn upsert_replaces_by_id() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        let mut file = MonthlyTrackingFile::new("2026-03", now);

        assert!(!file.upsert(test_entry("a")));
        assert!(!file.upsert(test_entry("b")));
        assert_eq!(file.entries.len(), 2);

        let mut replacement = test_entry("a");
        replacement.scores.insert("mood".to_string(), FieldValue::Scale(5));
        assert!(file.upsert(replacement));
        assert_eq!(file.entries.len(), 2);
        assert!(file.entry("a").unwrap().scores.contains_key("mood"));
    }

    #[test]
    fn finalize_recomputes_size_and_updated_at() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        let mut file = MonthlyTrackingFile::new("2026-03", created);
        file.upsert(test_entry("a"));

        file.finalize(later);
        assert!(file.estimated_size_kb > 0.0);
        assert_eq!(file.updated_at, later);
        assert_eq!(file.created_at, created);
    }
}
