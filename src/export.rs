// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Import/export file formats.
//!
//! Three portable formats leave the engine:
//! - plain JSON entry exports (`{version, exported_at, total_entries,
//!   date_range, entries}`),
//! - compressed config exports (zstd + base64 behind a `compressed: true`
//!   flag, with size stats recorded alongside),
//! - CSV (header derived from the union of keys across exported entries,
//!   `notes.*` flattened to `notes_*` columns, standard quote escaping).
//!
//! Imports validate structure first: a malformed or undecompressable
//! document aborts the whole operation, while individually broken records
//! inside a well-formed document are filtered out without aborting.

use std::collections::BTreeSet;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::compression;
use crate::entry::{Entry, FieldValue, SCHEMA_VERSION};
use crate::migration::MigrationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The document itself is unusable. Nothing was written.
    #[error("malformed import document: {0}")]
    Malformed(String),

    /// The payload claimed to be compressed but would not decompress.
    #[error("payload could not be decompressed: {0}")]
    Decompress(String),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub entries_imported: usize,
    pub months_imported: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// Plain entry export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub total_entries: usize,
    pub date_range: DateRange,
    pub entries: Vec<Entry>,
}

/// Serialize an entry set for export.
#[must_use]
pub fn export_entries(entries: &[Entry], now: DateTime<Utc>) -> EntryExport {
    let start = entries.iter().map(|e| e.timestamp).min();
    let end = entries.iter().map(|e| e.timestamp).max();

    EntryExport {
        version: SCHEMA_VERSION.to_string(),
        exported_at: now,
        total_entries: entries.len(),
        date_range: DateRange { start, end },
        entries: entries.to_vec(),
    }
}

/// Compressed configuration export. The consumer must check `compressed`
/// before attempting to decode `data`.
pub fn export_config_compressed(
    config: &crate::config::Configuration,
) -> Result<Value, compression::CompressionError> {
    let raw = serde_json::to_value(config)?;
    let (compressed, stats) = compression::compress_with_stats(&raw)?;
    let data = base64::engine::general_purpose::STANDARD.encode(compressed);

    Ok(json!({
        "version": config.version,
        "compressed": true,
        "original_size": stats.original_bytes,
        "compressed_size": stats.compressed_bytes,
        "compression_ratio": stats.ratio,
        "data": data,
    }))
}

/// Unwrap a configuration export back to the raw config document.
///
/// Decompression is attempted only when the document says `compressed:
/// true`; a plain document is treated as the config itself.
pub fn parse_config_export(document: &Value) -> Result<Value, ImportError> {
    if document.get("compressed").and_then(Value::as_bool) != Some(true) {
        return Ok(document.clone());
    }

    let data = document
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| ImportError::Malformed("compressed export without data field".into()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ImportError::Decompress(format!("invalid base64: {e}")))?;

    compression::decompress(&bytes).map_err(|e| ImportError::Decompress(e.to_string()))
}

/// Structurally validate an entry export and parse its records.
///
/// Returns the valid entries plus the count of records dropped for missing
/// required fields (`id`, `timestamp`, `type`) or unparseable content.
/// A document without a top-level `entries` array aborts the whole import.
pub fn parse_entry_export(document: &Value) -> Result<(Vec<Entry>, usize), ImportError> {
    let records = document
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| ImportError::Malformed("missing entries array".into()))?;

    let mut valid = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for record in records {
        let has_required = record.get("id").and_then(Value::as_str).is_some()
            && record.get("timestamp").is_some()
            && record.get("type").is_some();
        if !has_required {
            skipped += 1;
            continue;
        }
        match serde_json::from_value::<Entry>(record.clone()) {
            Ok(entry) => valid.push(entry),
            Err(_) => skipped += 1,
        }
    }

    Ok((valid, skipped))
}

// --- CSV ---

const FIXED_COLUMNS: [&str; 8] = [
    "id",
    "timestamp",
    "type",
    "timezone",
    "sync_status",
    "is_deleted",
    "created_at",
    "updated_at",
];

const NOTE_COLUMNS: [&str; 3] = ["notes_observations", "notes_reflections", "notes_thankful_for"];

/// Render entries as CSV. The header is the fixed column set, then the
/// sorted union of score keys across all entries, then flattened note
/// columns when any entry carries notes.
#[must_use]
pub fn export_entries_csv(entries: &[Entry]) -> String {
    let score_keys: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.scores.keys())
        .map(String::as_str)
        .collect();
    let any_notes = entries.iter().any(|e| e.notes.is_some());

    let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
    header.extend(score_keys.iter().copied());
    if any_notes {
        header.extend(NOTE_COLUMNS);
    }

    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| csv_escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for entry in entries {
        let mut row: Vec<String> = vec![
            entry.id.clone(),
            entry.timestamp.to_rfc3339(),
            entry.entry_type.to_string(),
            entry.timezone.clone(),
            format!("{:?}", entry.sync_status).to_lowercase(),
            entry.is_deleted.to_string(),
            entry.created_at.to_rfc3339(),
            entry.updated_at.to_rfc3339(),
        ];

        for key in &score_keys {
            row.push(entry.scores.get(*key).map(render_value).unwrap_or_default());
        }

        if any_notes {
            match &entry.notes {
                Some(notes) => {
                    for (_, content) in notes.fields() {
                        row.push(content.unwrap_or_default().to_string());
                    }
                }
                None => row.extend([String::new(), String::new(), String::new()]),
            }
        }

        out.push_str(
            &row.iter()
                .map(|v| csv_escape(v))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }

    out
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Scale(v) => v.to_string(),
        FieldValue::Numeric(v) => v.to_string(),
        FieldValue::MultiSelect(values) => values.join(";"),
        FieldValue::DateStr(s) => s.clone(),
        FieldValue::Other(v) => v.to_string(),
    }
}

/// Standard CSV quoting: fields containing commas, quotes or newlines are
/// wrapped in double quotes with embedded quotes doubled.
#[must_use]
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
