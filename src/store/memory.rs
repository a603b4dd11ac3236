//! In-memory mock of the remote store.
//!
//! Stands in for the cloud file store in tests and local/offline builds.
//! Failure injection knobs simulate connectivity loss, throttling and
//! session expiry so engine behavior under degraded conditions is testable
//! without a network.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use dashmap::DashMap;
use serde_json::Value;

use super::traits::{
    monthly_file_name, Ack, FileMeta, OfflineSyncResult, RemoteStore, StoreError,
    CONFIG_FILE_NAME, TRACKING_FILE_PREFIX,
};
use crate::entry::{Entry, MonthlyTrackingFile, SyncStatus};

pub struct MockRemoteStore {
    /// File bodies keyed by name.
    files: DashMap<String, Value>,
    /// Zone used to bucket batched entries into months.
    zone: Tz,
    fail_next: AtomicU32,
    rate_limit_next: AtomicU32,
    auth_expired: AtomicBool,
    calls: AtomicU64,
}

impl MockRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_zone(chrono_tz::UTC)
    }

    #[must_use]
    pub fn with_zone(zone: Tz) -> Self {
        Self {
            files: DashMap::new(),
            zone,
            fail_next: AtomicU32::new(0),
            rate_limit_next: AtomicU32::new(0),
            auth_expired: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` calls with a network error.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Throttle the next `n` calls.
    pub fn rate_limit_next(&self, n: u32) {
        self.rate_limit_next.store(n, Ordering::SeqCst);
    }

    /// Reject every call with an expired session until restored.
    pub fn expire_auth(&self) {
        self.auth_expired.store(true, Ordering::SeqCst);
    }

    pub fn restore_auth(&self) {
        self.auth_expired.store(false, Ordering::SeqCst);
    }

    /// Total calls that reached the store (including rejected ones).
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Preload a raw file body, bypassing the gate. Test seam for legacy
    /// documents that would not round-trip through the typed writers.
    pub fn seed_file(&self, name: &str, body: Value) {
        self.files.insert(name.to_string(), body);
    }

    /// Typed view of a stored monthly file, if present and parseable.
    #[must_use]
    pub fn monthly_file(&self, month: &str) -> Option<MonthlyTrackingFile> {
        let raw = self.files.get(&monthly_file_name(month))?.clone();
        serde_json::from_value(raw).ok()
    }

    fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_expired.load(Ordering::SeqCst) {
            return Err(StoreError::AuthExpired);
        }
        if self
            .rate_limit_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::RateLimited);
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Network("injected failure".to_string()));
        }
        Ok(())
    }

    fn ack(&self, name: &str) -> Ack {
        Ack {
            file_id: name.to_string(),
            updated_at: Utc::now(),
        }
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn get_config_file(&self, _user_key: &str) -> Result<Option<Value>, StoreError> {
        self.gate()?;
        Ok(self.files.get(CONFIG_FILE_NAME).map(|r| r.value().clone()))
    }

    async fn save_config_file(&self, config: &crate::config::Configuration) -> Result<Ack, StoreError> {
        self.gate()?;
        let body = serde_json::to_value(config)
            .map_err(|e| StoreError::Permanent(format!("encode config: {e}")))?;
        self.files.insert(CONFIG_FILE_NAME.to_string(), body);
        Ok(self.ack(CONFIG_FILE_NAME))
    }

    async fn get_monthly_file(&self, month: &str) -> Result<Option<Value>, StoreError> {
        self.gate()?;
        let name = monthly_file_name(month);
        Ok(self.files.get(&name).map(|r| r.value().clone()))
    }

    async fn save_monthly_file(
        &self,
        month: &str,
        file: &MonthlyTrackingFile,
    ) -> Result<Ack, StoreError> {
        self.gate()?;
        let name = monthly_file_name(month);
        let body = serde_json::to_value(file)
            .map_err(|e| StoreError::Permanent(format!("encode tracking file: {e}")))?;
        self.files.insert(name.clone(), body);
        Ok(self.ack(&name))
    }

    async fn list_monthly_files(&self) -> Result<Vec<FileMeta>, StoreError> {
        self.gate()?;
        let mut metas: Vec<FileMeta> = self
            .files
            .iter()
            .filter(|r| r.key().starts_with(TRACKING_FILE_PREFIX))
            .map(|r| FileMeta {
                id: r.key().clone(),
                name: r.key().clone(),
                updated_at: Utc::now(),
            })
            .collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metas)
    }

    async fn sync_offline_entries(
        &self,
        entries: &[Entry],
    ) -> Result<OfflineSyncResult, StoreError> {
        // One batched call: a single gate check covers the whole drain, so
        // injected failures reject it atomically.
        self.gate()?;

        let now = Utc::now();
        let mut result = OfflineSyncResult::default();

        let mut by_month: std::collections::BTreeMap<String, Vec<Entry>> = Default::default();
        for entry in entries {
            by_month
                .entry(entry.month_key(self.zone))
                .or_default()
                .push(entry.clone());
        }

        for (month, month_entries) in by_month {
            let name = monthly_file_name(&month);
            let mut file = self
                .files
                .get(&name)
                .and_then(|raw| serde_json::from_value(raw.value().clone()).ok())
                .unwrap_or_else(|| MonthlyTrackingFile::new(&month, now));

            for mut entry in month_entries {
                entry.sync_status = SyncStatus::Synced;
                result.synced_ids.push(entry.id.clone());
                result.synced += 1;
                file.upsert(entry);
            }

            file.finalize(now);
            let body = serde_json::to_value(&file)
                .map_err(|e| StoreError::Permanent(format!("encode tracking file: {e}")))?;
            self.files.insert(name, body);
        }

        Ok(result)
    }
}
