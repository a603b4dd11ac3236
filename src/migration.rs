// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Schema migration for persisted data.
//!
//! Remote files and imported exports may carry any schema version back to
//! `1.0.0`. An ordered chain of version-to-version steps upgrades raw JSON
//! documents before they are parsed into typed state; each step is additive
//! (adds missing fields and sections, never removes user data) and tolerant
//! of optional fields it does not find.
//!
//! Idempotency of the whole operation is guaranteed by the version gate:
//! data already at the target version gets zero steps applied. The `1.3.0`
//! value renormalization in particular must only run once, and only on
//! items the catalog declares 3-point — a raw value of 1..3 is ambiguous
//! with a legitimate 5-point low value, so the value range alone proves
//! nothing.

use serde_json::{json, Value};
use thiserror::Error;

use crate::catalog;
use crate::entry::SCHEMA_VERSION;
use crate::scale;

/// Known schema versions, oldest first.
pub const VERSION_CHAIN: [&str; 4] = ["1.0.0", "1.1.0", "1.2.0", "1.3.0"];

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Source or target version not in the known chain. The affected file
    /// must not be loaded: proceeding could corrupt newer writes.
    #[error("unknown schema version '{0}'")]
    UnknownVersion(String),
    #[error("malformed document: {0}")]
    Malformed(String),
}

type Step = fn(&mut Value);

const TRACKING_STEPS: [Step; 3] = [tracking_to_1_1_0, tracking_to_1_2_0, tracking_to_1_3_0];
const CONFIG_STEPS: [Step; 3] = [config_to_1_1_0, config_to_1_2_0, config_to_1_3_0];

/// Migrate a monthly tracking file document to the current version.
pub fn migrate_tracking_file(value: Value) -> Result<Value, MigrationError> {
    migrate_tracking_file_to(value, SCHEMA_VERSION)
}

/// Migrate a monthly tracking file document to an explicit target version.
pub fn migrate_tracking_file_to(value: Value, target: &str) -> Result<Value, MigrationError> {
    run_chain(value, target, &TRACKING_STEPS)
}

/// Migrate a configuration document to the current version.
pub fn migrate_config(value: Value) -> Result<Value, MigrationError> {
    migrate_config_to(value, SCHEMA_VERSION)
}

/// Migrate a configuration document to an explicit target version.
pub fn migrate_config_to(value: Value, target: &str) -> Result<Value, MigrationError> {
    run_chain(value, target, &CONFIG_STEPS)
}

/// Apply the steps between the document's declared version (default
/// `1.0.0` when absent) and the target. A document already at or past the
/// target is returned unchanged.
fn run_chain(mut value: Value, target: &str, steps: &[Step]) -> Result<Value, MigrationError> {
    if !value.is_object() {
        return Err(MigrationError::Malformed(
            "expected a JSON object at the top level".to_string(),
        ));
    }

    let from = value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(VERSION_CHAIN[0])
        .to_string();

    let from_idx = VERSION_CHAIN
        .iter()
        .position(|v| *v == from)
        .ok_or_else(|| MigrationError::UnknownVersion(from.clone()))?;
    let to_idx = VERSION_CHAIN
        .iter()
        .position(|v| *v == target)
        .ok_or_else(|| MigrationError::UnknownVersion(target.to_string()))?;

    if from_idx >= to_idx {
        return Ok(value);
    }

    for step in &steps[from_idx..to_idx] {
        step(&mut value);
    }
    value["version"] = json!(target);
    Ok(value)
}

fn entries_mut(value: &mut Value) -> impl Iterator<Item = &mut serde_json::Map<String, Value>> {
    value
        .get_mut("entries")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

fn ensure(map: &mut serde_json::Map<String, Value>, key: &str, default: Value) {
    map.entry(key.to_string()).or_insert(default);
}

// --- tracking file steps ---

/// 1.0.0 → 1.1.0: entries gain sync metadata. Legacy data only ever lived
/// on the server, so it counts as synced.
fn tracking_to_1_1_0(value: &mut Value) {
    for entry in entries_mut(value) {
        ensure(entry, "sync_status", json!("synced"));
        ensure(entry, "timezone", json!("UTC"));
    }
}

/// 1.1.0 → 1.2.0: soft-delete flag and audit instants, backfilled from the
/// entry timestamp.
fn tracking_to_1_2_0(value: &mut Value) {
    for entry in entries_mut(value) {
        ensure(entry, "is_deleted", json!(false));
        let timestamp = entry.get("timestamp").cloned().unwrap_or(Value::Null);
        ensure(entry, "created_at", timestamp.clone());
        ensure(entry, "updated_at", timestamp);
    }
}

/// 1.2.0 → 1.3.0: renormalize raw 3-point values to the canonical storage
/// scale. Scoped to catalog-declared 3-point items holding 1..=3.
fn tracking_to_1_3_0(value: &mut Value) {
    for entry in entries_mut(value) {
        for (key, field) in entry.iter_mut() {
            if !catalog::is_three_point(key) {
                continue;
            }
            if let Some(v) = field.as_i64() {
                if (1..=3).contains(&v) {
                    *field = json!(scale::normalize(v, 3));
                }
            }
        }
    }
    if let Some(file) = value.as_object_mut() {
        ensure(file, "estimated_size_kb", json!(0.0));
    }
}

// --- configuration steps ---

/// 1.0.0 → 1.1.0: display options block.
fn config_to_1_1_0(value: &mut Value) {
    let Some(config) = value.as_object_mut() else {
        return;
    };
    ensure(config, "display_options", json!({}));
    if let Some(display) = config
        .get_mut("display_options")
        .and_then(Value::as_object_mut)
    {
        ensure(display, "display_type", json!("emoji"));
        ensure(display, "morning_end_hour", json!(11));
        ensure(display, "evening_start_hour", json!(18));
    }
}

/// 1.1.0 → 1.2.0: insights and privacy blocks.
fn config_to_1_2_0(value: &mut Value) {
    let Some(config) = value.as_object_mut() else {
        return;
    };
    ensure(
        config,
        "insights",
        json!({"enabled": true, "min_entries": 7}),
    );
    ensure(
        config,
        "privacy",
        json!({"analytics_enabled": false, "local_only": false}),
    );
}

/// 1.2.0 → 1.3.0: per-view configuration map plus session/section blocks.
fn config_to_1_3_0(value: &mut Value) {
    let Some(config) = value.as_object_mut() else {
        return;
    };
    ensure(config, "view_configurations", json!({}));
    ensure(config, "session", json!({"auto_lock_minutes": 15}));
    ensure(config, "section", json!({"collapsed": []}));
}
