//! Persisted local state.
//!
//! A single keyed blob holding auth, configuration, tracking data (entries
//! plus the offline queue) and minor UI state. The engine rehydrates it at
//! startup before any remote call is attempted — that is what makes
//! offline-first cold start work — and writes it back after every mutation.
//!
//! The port is a trait so the host can supply whatever storage it has; a
//! JSON-file implementation and an in-memory one (for tests) ship here.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Configuration;
use crate::entry::Entry;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("local state I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local state encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Local authentication state. Reset (not failed) when the remote reports
/// an expired session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthState {
    #[serde(default)]
    pub signed_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrackingData {
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub offline_entries: Vec<Entry>,
}

/// UI restoration state. Opaque to the engine; carried for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UiState {
    #[serde(default)]
    pub current_view: String,
    #[serde(default)]
    pub modals: Vec<String>,
}

/// The single persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PersistedState {
    #[serde(default)]
    pub auth: AuthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration>,
    #[serde(default)]
    pub tracking_data: TrackingData,
    #[serde(default)]
    pub ui: UiState,
}

/// Storage port for the persisted blob.
#[async_trait]
pub trait LocalStatePort: Send + Sync {
    /// Load the blob, `None` on first run.
    async fn load(&self) -> Result<Option<PersistedState>, PersistError>;

    /// Replace the blob wholesale.
    async fn save(&self, state: &PersistedState) -> Result<(), PersistError>;
}

/// JSON file on disk.
pub struct JsonFileState {
    path: PathBuf,
}

impl JsonFileState {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocalStatePort for JsonFileState {
    async fn load(&self) -> Result<Option<PersistedState>, PersistError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

/// In-memory port for tests and throwaway sessions.
#[derive(Default)]
pub struct InMemoryState {
    slot: parking_lot::Mutex<Option<PersistedState>>,
}

impl InMemoryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the blob before engine boot.
    pub fn seed(&self, state: PersistedState) {
        *self.slot.lock() = Some(state);
    }

    /// Snapshot of the stored blob, if any.
    #[must_use]
    pub fn stored(&self) -> Option<PersistedState> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl LocalStatePort for InMemoryState {
    async fn load(&self) -> Result<Option<PersistedState>, PersistError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<(), PersistError> {
        *self.slot.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFileState::new(dir.path().join("state.json"));
        assert!(port.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let port = JsonFileState::new(dir.path().join("nested/state.json"));

        let mut state = PersistedState::default();
        state.auth.signed_in = true;
        state.auth.user_key = Some("user-1".to_string());
        state.ui.current_view = "morning".to_string();

        port.save(&state).await.unwrap();
        let loaded = port.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let port = JsonFileState::new(path);
        assert!(matches!(
            port.load().await,
            Err(PersistError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_round_trip() {
        let port = InMemoryState::new();
        assert!(port.load().await.unwrap().is_none());

        let state = PersistedState::default();
        port.save(&state).await.unwrap();
        assert_eq!(port.load().await.unwrap().unwrap(), state);
    }
}
