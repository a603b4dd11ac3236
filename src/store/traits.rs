//! Remote store contract and error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::config::Configuration;
use crate::entry::{Entry, MonthlyTrackingFile};

/// Name of the singleton configuration file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Prefix of per-month tracking files: `tracking-journal_<YYYY-MM>.json`.
pub const TRACKING_FILE_PREFIX: &str = "tracking-journal_";

/// Remote file name for a month key.
#[must_use]
pub fn monthly_file_name(month: &str) -> String {
    format!("{TRACKING_FILE_PREFIX}{month}.json")
}

/// Month key from a remote file name, if it is a tracking file.
#[must_use]
pub fn month_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(TRACKING_FILE_PREFIX)?.strip_suffix(".json")
}

/// Store failures, split by how the caller must react.
///
/// The three families must not be collapsed: transient errors are retried
/// with backoff, auth expiry triggers a local auth reset (never a data
/// failure), and permanent errors surface to the caller unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity failure. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// The remote store throttled the request. Retryable with backoff.
    #[error("rate limited by the remote store")]
    RateLimited,

    /// The call exceeded its ceiling. Distinguishable from a plain network
    /// failure; side effects that partially landed are not rolled back.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The credential was rejected. The caller must reset local auth state
    /// rather than mark data failed.
    #[error("authentication expired")]
    AuthExpired,

    /// Malformed request or other non-retryable failure.
    #[error("permanent store error: {0}")]
    Permanent(String),
}

impl StoreError {
    /// True for failures worth an automatic retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited | Self::Timeout(_))
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }
}

/// Remote file listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub file_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Result of a batched offline-queue sync.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OfflineSyncResult {
    pub synced: usize,
    pub synced_ids: Vec<String>,
}

/// The cloud file store boundary consumed by the sync engine.
///
/// Read operations return raw JSON documents so the migration chain can run
/// before anything is parsed into typed state; writes take typed values and
/// own the wire encoding. All operations may fail transiently
/// ([`StoreError::Network`]) or permanently, or report an expired session
/// ([`StoreError::AuthExpired`]).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the singleton configuration document, if any.
    async fn get_config_file(&self, user_key: &str) -> Result<Option<Value>, StoreError>;

    /// Write the configuration file (replace-whole-file).
    async fn save_config_file(&self, config: &Configuration) -> Result<Ack, StoreError>;

    /// Fetch the tracking file for a `YYYY-MM` month, if any.
    async fn get_monthly_file(&self, month: &str) -> Result<Option<Value>, StoreError>;

    /// Write a monthly tracking file (replace-whole-file).
    async fn save_monthly_file(
        &self,
        month: &str,
        file: &MonthlyTrackingFile,
    ) -> Result<Ack, StoreError>;

    /// List tracking files present remotely.
    async fn list_monthly_files(&self) -> Result<Vec<FileMeta>, StoreError>;

    /// Batched upsert of queued offline entries into their month files.
    /// All-or-nothing from the caller's perspective.
    async fn sync_offline_entries(&self, entries: &[Entry])
        -> Result<OfflineSyncResult, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_round_trip() {
        let name = monthly_file_name("2026-08");
        assert_eq!(name, "tracking-journal_2026-08.json");
        assert_eq!(month_from_file_name(&name), Some("2026-08"));
        assert_eq!(month_from_file_name("config.json"), None);
        assert_eq!(month_from_file_name("tracking-journal_2026-08.txt"), None);
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Network("reset".into()).is_transient());
        assert!(StoreError::RateLimited.is_transient());
        assert!(StoreError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(!StoreError::AuthExpired.is_transient());
        assert!(!StoreError::Permanent("bad request".into()).is_transient());
        assert!(StoreError::AuthExpired.is_auth());
    }
}
