// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote synchronization paths.
//!
//! Monthly files are the unit of remote persistence: syncing an entry means
//! loading its month file, upserting by id, recomputing the size estimate
//! and writing the whole file back. The offline queue drains all-or-nothing
//! in one batched call; a failed drain leaves the queue intact for the next
//! online transition or manual retry.
//!
//! Per-entry status machine: `pending → synced` on success, `pending →
//! failed` on non-auth failure, `failed → synced` on a later retry. Auth
//! expiry is not a data failure: it resets local auth state and leaves the
//! entry pending. Any mutation resets status to pending; there is no
//! terminal failure state.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{EntryError, LoadError, SyncEngine};
use crate::config::Configuration;
use crate::entry::{Entry, MonthlyTrackingFile, SyncStatus};
use crate::migration::{migrate_config, migrate_tracking_file};
use crate::store::StoreError;
use crate::validation::validate_config;

impl SyncEngine {
    /// Push one entry to its monthly file. Returns the entry's resulting
    /// sync status; store failures are absorbed into that status rather
    /// than surfaced as errors.
    pub async fn sync_entry(&self, id: &str) -> Result<SyncStatus, EntryError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))?;
        let month = entry.month_key(self.zone());

        match self.push_to_month_file(&entry, &month).await {
            Ok(synced_copy) => {
                let mut synced = synced_copy;
                synced.sync_status = SyncStatus::Synced;
                self.replace_entry(synced);
                self.persist().await;
                debug!(id, %month, "entry synced");
                Ok(SyncStatus::Synced)
            }
            Err(StoreError::AuthExpired) => {
                // Not a data problem: reset auth, leave the entry pending so
                // it retries once the user signs back in.
                self.reset_auth();
                self.persist().await;
                Ok(SyncStatus::Pending)
            }
            Err(err) => {
                self.set_entry_status(id, SyncStatus::Failed);
                self.record_sync_error("sync_entry", format!("{id}: {err}"));
                self.persist().await;
                Ok(SyncStatus::Failed)
            }
        }
    }

    /// Load-merge-write one entry into its month file. Returns the entry
    /// version that now lives remotely (the local one, or the remote copy
    /// when it proved newer).
    async fn push_to_month_file(
        &self,
        entry: &Entry,
        month: &str,
    ) -> Result<Entry, StoreError> {
        let now = self.now();
        let mut file = self.fetch_month_file(month).await?.unwrap_or_else(|| {
            debug!(month, "creating monthly file on first write");
            MonthlyTrackingFile::new(month, now)
        });

        // Conflict guard: a concurrent writer (another device) may have
        // pushed a newer copy since we loaded state. Strictly newer
        // updated_at wins; ties favor the local write.
        if let Some(remote) = file.entry(&entry.id) {
            if remote.updated_at > entry.updated_at {
                info!(
                    id = %entry.id,
                    local = %entry.updated_at,
                    remote = %remote.updated_at,
                    "remote copy is newer, adopting it"
                );
                return Ok(remote.clone());
            }
        }

        let mut outgoing = entry.clone();
        outgoing.sync_status = SyncStatus::Synced;
        file.upsert(outgoing);
        file.finalize(now);
        self.store().save_monthly_file(month, &file).await?;
        Ok(entry.clone())
    }

    /// Fetch and migrate a month file. Migration or parse failures are
    /// permanent: proceeding with a half-understood file could corrupt
    /// newer writes.
    pub(super) async fn fetch_month_file(
        &self,
        month: &str,
    ) -> Result<Option<MonthlyTrackingFile>, StoreError> {
        let Some(raw) = self.store().get_monthly_file(month).await? else {
            return Ok(None);
        };
        let migrated = migrate_tracking_file(raw)
            .map_err(|e| StoreError::Permanent(format!("migrate {month}: {e}")))?;
        let file = serde_json::from_value(migrated)
            .map_err(|e| StoreError::Permanent(format!("decode {month}: {e}")))?;
        Ok(Some(file))
    }

    /// Drain the entire offline queue in one batched remote call.
    ///
    /// All-or-nothing: on success the queue empties and every drained entry
    /// is marked synced; on failure the queue stays intact and the error is
    /// recorded for the next online transition or manual retry.
    pub async fn sync_offline_entries(&self) {
        let queue: Arc<Vec<Entry>> = self.read_state(|state| state.offline.clone());
        if queue.is_empty() {
            return;
        }

        self.mutate(|state| state.is_syncing = true);
        info!(queued = queue.len(), "draining offline queue");

        match self.store().sync_offline_entries(&queue).await {
            Ok(result) => {
                let now = self.now();
                self.mutate(|state| {
                    state.offline = Arc::new(Vec::new());
                    let mut entries: Vec<Entry> = (*state.entries).clone();
                    for entry in entries.iter_mut() {
                        if result.synced_ids.contains(&entry.id) {
                            entry.sync_status = SyncStatus::Synced;
                        }
                    }
                    state.entries = Arc::new(entries);
                    state.last_sync_time = Some(now);
                    state.is_syncing = false;
                });
                self.persist().await;
                info!(synced = result.synced, "offline queue drained");
            }
            Err(StoreError::AuthExpired) => {
                self.mutate(|state| state.is_syncing = false);
                self.reset_auth();
                self.persist().await;
            }
            Err(err) => {
                self.mutate(|state| state.is_syncing = false);
                self.record_sync_error("offline_sync", err.to_string());
                warn!(error = %err, queued = queue.len(), "offline drain failed, queue kept");
            }
        }
    }

    /// Connectivity transition trigger. Coming online with a non-empty
    /// offline queue starts a drain.
    pub async fn set_online_status(&self, online: bool) {
        let queued = self.mutate(|state| {
            state.is_online = online;
            state.offline.len()
        });
        info!(online, queued, "online status changed");

        if online && queued > 0 {
            self.sync_offline_entries().await;
        }
    }

    /// Load (or create) the user configuration.
    ///
    /// Priority: already-loaded state → remote file (migrated) → freshly
    /// created default persisted locally and, when reachable, remotely.
    pub async fn load_config(&self) -> Result<Arc<Configuration>, LoadError> {
        if let Some(config) = self.config() {
            return Ok(config);
        }

        if self.is_online() {
            match self.store().get_config_file(self.user_key()).await {
                Ok(Some(raw)) => {
                    let config = parse_config(raw)?;
                    let config = Arc::new(config);
                    self.mutate(|state| state.config = Some(config.clone()));
                    self.persist().await;
                    info!("configuration loaded from remote");
                    return Ok(config);
                }
                Ok(None) => {
                    debug!("no remote configuration, creating default");
                    return self.create_default_config(true).await;
                }
                Err(StoreError::AuthExpired) => {
                    self.reset_auth();
                    return self.create_default_config(false).await;
                }
                Err(err) => {
                    // Offline-first: a transient failure must not block the
                    // session. Work from a local default and leave the
                    // remote untouched until it answers.
                    warn!(error = %err, "config fetch failed, using local default");
                    self.record_sync_error("load_config", err.to_string());
                    return self.create_default_config(false).await;
                }
            }
        }

        self.create_default_config(false).await
    }

    async fn create_default_config(
        &self,
        write_remote: bool,
    ) -> Result<Arc<Configuration>, LoadError> {
        let config = Arc::new(Configuration::default_for_user(self.user_key()));
        self.mutate(|state| state.config = Some(config.clone()));
        self.persist().await;

        if write_remote {
            if let Err(err) = self.store().save_config_file(&config).await {
                warn!(error = %err, "could not persist default config remotely");
                self.record_sync_error("save_config", err.to_string());
            }
        }
        info!("default configuration created");
        Ok(config)
    }

    /// Replace the configuration (settings screens), persisting locally and
    /// remotely when online.
    pub async fn save_config(&self, config: Configuration) -> Result<(), EntryError> {
        if let Err(errors) = validate_config(&config) {
            return Err(EntryError::Validation(errors));
        }

        let config = Arc::new(config);
        self.mutate(|state| state.config = Some(config.clone()));
        self.persist().await;

        if self.is_online() {
            match self.store().save_config_file(&config).await {
                Ok(_) => debug!("configuration saved remotely"),
                Err(StoreError::AuthExpired) => {
                    self.reset_auth();
                    self.persist().await;
                }
                Err(err) => {
                    self.record_sync_error("save_config", err.to_string());
                }
            }
        }
        Ok(())
    }

    /// Load a month of entries from the remote store and merge them into
    /// memory. Runs the migration chain before anything is parsed. Returns
    /// the number of entries merged or refreshed.
    pub async fn load_month(&self, month: &str) -> Result<usize, LoadError> {
        let Some(raw) = self.store().get_monthly_file(month).await? else {
            debug!(month, "no remote file for month");
            return Ok(0);
        };

        let migrated = migrate_tracking_file(raw)?;
        let file: MonthlyTrackingFile = serde_json::from_value(migrated)
            .map_err(|e| LoadError::Malformed(e.to_string()))?;

        let mut merged = 0usize;
        self.mutate(|state| {
            let mut entries: Vec<Entry> = (*state.entries).clone();
            for remote in &file.entries {
                match entries.iter_mut().find(|e| e.id == remote.id) {
                    Some(local) => {
                        // Keep whichever copy was written last.
                        if remote.updated_at > local.updated_at {
                            *local = remote.clone();
                            merged += 1;
                        }
                    }
                    None => {
                        entries.push(remote.clone());
                        merged += 1;
                    }
                }
            }
            state.entries = Arc::new(entries);
        });

        self.persist().await;
        info!(month, merged, total = file.entries.len(), "month loaded");
        Ok(merged)
    }

    /// Retry every entry currently marked failed. Manual-retry hook for the
    /// UI; `failed` is always retry-eligible.
    pub async fn retry_failed_entries(&self) {
        let failed: Vec<String> = self.read_state(|state| {
            state
                .entries
                .iter()
                .filter(|e| e.sync_status == SyncStatus::Failed)
                .map(|e| e.id.clone())
                .collect()
        });

        for id in failed {
            // NotFound cannot happen for ids read from state.
            let _ = self.sync_entry(&id).await;
        }
    }
}

fn parse_config(raw: Value) -> Result<Configuration, LoadError> {
    let migrated = migrate_config(raw)?;
    serde_json::from_value(migrated).map_err(|e| LoadError::Malformed(e.to_string()))
}
