// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Import/export operations on the engine.
//!
//! Exports read consistent snapshots; imports validate structurally, write
//! through the remote store exactly as `sync_entry` would (load month,
//! merge by id, replace whole file), then merge into in-memory state.
//! Whole-operation failures abort before any remote write.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::{LoadError, SyncEngine};
use crate::config::Configuration;
use crate::entry::{Entry, MonthlyTrackingFile, SyncStatus};
use crate::export::{
    export_config_compressed, export_entries, export_entries_csv, parse_config_export,
    parse_entry_export, EntryExport, ImportError, ImportSummary,
};
use crate::migration::migrate_config;
use crate::validation::validate_config;

impl SyncEngine {
    /// Export the visible (non-deleted) entry set.
    #[must_use]
    pub fn export_entries(&self) -> EntryExport {
        export_entries(&self.visible_entries(), self.now())
    }

    /// Export every entry including soft-deleted ones.
    #[must_use]
    pub fn export_all_entries(&self) -> EntryExport {
        export_entries(&self.all_entries(), self.now())
    }

    /// CSV rendering of the visible entry set.
    #[must_use]
    pub fn export_entries_csv(&self) -> String {
        export_entries_csv(&self.visible_entries())
    }

    /// Compressed configuration export (loads the config first if needed).
    pub async fn export_config(&self) -> Result<Value, LoadError> {
        let config = self.load_config().await?;
        export_config_compressed(&config).map_err(|e| LoadError::Malformed(e.to_string()))
    }

    /// Ingest a previously exported entry document.
    ///
    /// Structurally invalid records are filtered out without aborting;
    /// valid records are grouped by month and written through the remote
    /// store, then merged into memory. An unusable document aborts with no
    /// partial writes.
    pub async fn import_entries(&self, document: &Value) -> Result<ImportSummary, ImportError> {
        let (valid, skipped) = parse_entry_export(document)?;
        if skipped > 0 {
            warn!(skipped, "import dropped structurally invalid records");
        }
        if valid.is_empty() {
            return Ok(ImportSummary::default());
        }

        let now = self.now();
        let mut by_month: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        for entry in valid {
            by_month
                .entry(entry.month_key(self.zone()))
                .or_default()
                .push(entry);
        }

        let mut summary = ImportSummary::default();
        for (month, month_entries) in &by_month {
            let mut file = self
                .fetch_month_file(month)
                .await?
                .unwrap_or_else(|| MonthlyTrackingFile::new(month, now));

            for entry in month_entries {
                let mut imported = entry.clone();
                imported.sync_status = SyncStatus::Synced;
                file.upsert(imported);
                summary.entries_imported += 1;
            }

            file.finalize(now);
            self.store().save_monthly_file(month, &file).await?;
            summary.months_imported += 1;
        }

        // Merge into memory; the remote copy just written is authoritative.
        self.mutate(|state| {
            let mut entries: Vec<Entry> = (*state.entries).clone();
            for month_entries in by_month.values() {
                for imported in month_entries {
                    let mut merged = imported.clone();
                    merged.sync_status = SyncStatus::Synced;
                    match entries.iter_mut().find(|e| e.id == merged.id) {
                        Some(local) => *local = merged,
                        None => entries.push(merged),
                    }
                }
            }
            state.entries = Arc::new(entries);
        });
        self.persist().await;

        info!(
            entries = summary.entries_imported,
            months = summary.months_imported,
            "entry import complete"
        );
        Ok(summary)
    }

    /// Ingest a configuration export (compressed or plain). Aborts wholesale
    /// on an undecompressable payload or a config that fails validation.
    pub async fn import_config(&self, document: &Value) -> Result<Arc<Configuration>, ImportError> {
        let raw = parse_config_export(document)?;
        let migrated = migrate_config(raw)?;
        let config: Configuration = serde_json::from_value(migrated)
            .map_err(|e| ImportError::Malformed(e.to_string()))?;

        if let Err(errors) = validate_config(&config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ImportError::Malformed(joined));
        }

        let config = Arc::new(config);
        self.mutate(|state| state.config = Some(config.clone()));
        self.persist().await;

        if self.is_online() {
            if let Err(err) = self.store().save_config_file(&config).await {
                warn!(error = %err, "imported config not persisted remotely");
                self.record_sync_error("import_config", err.to_string());
            }
        }

        info!("configuration imported");
        Ok(config)
    }
}
