// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync engine.
//!
//! The [`SyncEngine`] is the single owner of in-memory tracking state: the
//! entry set, the offline queue and the online/syncing flags. UI
//! collaborators call its operations and render the snapshots it exposes;
//! they never mutate entries or configuration directly.
//!
//! Mutations follow the optimistic pattern: in-memory state is updated
//! synchronously first, then the operation suspends on the network attempt.
//! Offline, entries queue up instead; the queue drains in one batched
//! remote call when connectivity returns.
//!
//! Construction is explicit — a remote store and a local persistence port
//! are injected once at startup and the engine instance is passed by
//! reference to consumers. There is no process-wide state.

mod entries;
mod sync;
mod transfer;
mod types;

pub use entries::EntryUpdate;
pub use types::{
    EngineSnapshot, EntryError, LoadError, Notification, Severity, SyncErrorRecord,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Configuration;
use crate::entry::{Entry, SyncStatus};
use crate::persist::{AuthState, LocalStatePort, PersistedState, TrackingData, UiState};
use crate::store::RemoteStore;

/// Construction options.
#[derive(Clone)]
pub struct EngineOptions {
    /// Key identifying the user's remote file space.
    pub user_key: String,
    /// Zone for day and month bucketing (the user's home zone).
    pub timezone: Tz,
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            user_key: "default".to_string(),
            timezone: chrono_tz::UTC,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Internal mutable state. Entry vectors are replaced wholesale (never
/// mutated in place) so outstanding snapshots stay consistent.
struct EngineState {
    entries: Arc<Vec<Entry>>,
    offline: Arc<Vec<Entry>>,
    is_online: bool,
    is_syncing: bool,
    last_sync_time: Option<DateTime<Utc>>,
    sync_errors: Vec<SyncErrorRecord>,
    config: Option<Arc<Configuration>>,
    auth: AuthState,
    auth_reset_required: bool,
    ui: UiState,
}

impl EngineState {
    fn new() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            offline: Arc::new(Vec::new()),
            is_online: true,
            is_syncing: false,
            last_sync_time: None,
            sync_errors: Vec::new(),
            config: None,
            auth: AuthState::default(),
            auth_reset_required: false,
            ui: UiState::default(),
        }
    }
}

/// The sync engine. `Send + Sync`; methods take `&self`.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStatePort>,
    clock: Arc<dyn Clock>,
    zone: Tz,
    user_key: String,
    state: RwLock<EngineState>,
    notifications: broadcast::Sender<Notification>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStatePort>,
        options: EngineOptions,
    ) -> Self {
        let (notifications, _) = broadcast::channel(64);
        Self {
            store,
            local,
            clock: options.clock,
            zone: options.timezone,
            user_key: options.user_key,
            state: RwLock::new(EngineState::new()),
            notifications,
        }
    }

    /// Rehydrate persisted local state. Must run before any remote call so
    /// a cold start works fully offline.
    pub async fn boot(&self) -> Result<(), crate::persist::PersistError> {
        let Some(persisted) = self.local.load().await? else {
            info!("no persisted local state, starting fresh");
            return Ok(());
        };

        let entry_count = persisted.tracking_data.entries.len();
        let queued = persisted.tracking_data.offline_entries.len();
        self.mutate(|state| {
            state.entries = Arc::new(persisted.tracking_data.entries);
            state.offline = Arc::new(persisted.tracking_data.offline_entries);
            state.config = persisted.config.map(Arc::new);
            state.auth = persisted.auth;
            state.ui = persisted.ui;
        });

        info!(entry_count, queued, "rehydrated local state");
        Ok(())
    }

    // --- Accessors ---

    /// Consistent snapshot of engine state.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        self.read_state(|state| EngineSnapshot {
            entries: state.entries.clone(),
            offline_entries: state.offline.clone(),
            is_online: state.is_online,
            is_syncing: state.is_syncing,
            last_sync_time: state.last_sync_time,
            sync_errors: state.sync_errors.clone(),
            auth_reset_required: state.auth_reset_required,
        })
    }

    /// Subscribe to the non-blocking notification stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.read_state(|state| state.is_online)
    }

    /// The loaded configuration, if any. Use
    /// [`load_config`](Self::load_config) to populate it.
    #[must_use]
    pub fn config(&self) -> Option<Arc<Configuration>> {
        self.read_state(|state| state.config.clone())
    }

    /// Whether the remote reported an expired session. The host
    /// re-authenticates and then calls [`clear_auth_reset`](Self::clear_auth_reset).
    #[must_use]
    pub fn auth_reset_required(&self) -> bool {
        self.read_state(|state| state.auth_reset_required)
    }

    /// Mark the session re-authenticated.
    pub fn clear_auth_reset(&self) {
        self.mutate(|state| {
            state.auth_reset_required = false;
            state.auth.signed_in = true;
        });
    }

    // --- Internal helpers shared by the operation modules ---

    fn read_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.state.read())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        f(&mut self.state.write())
    }

    fn notify(&self, notification: Notification) {
        // Nobody listening is fine; notifications are fire-and-forget.
        let _ = self.notifications.send(notification);
    }

    /// Replace an entry by id in a fresh vector. Returns false when absent.
    fn replace_entry(&self, entry: Entry) -> bool {
        self.mutate(|state| {
            let mut entries: Vec<Entry> = (*state.entries).clone();
            if let Some(slot) = entries.iter_mut().find(|e| e.id == entry.id) {
                *slot = entry;
                state.entries = Arc::new(entries);
                true
            } else {
                false
            }
        })
    }

    fn push_entry(&self, entry: Entry) {
        self.mutate(|state| {
            let mut entries: Vec<Entry> = (*state.entries).clone();
            entries.push(entry);
            state.entries = Arc::new(entries);
        });
    }

    /// Queue an entry for the next offline drain, replacing any stale copy.
    fn queue_offline(&self, entry: Entry) {
        self.mutate(|state| {
            let mut queue: Vec<Entry> = (*state.offline).clone();
            if let Some(slot) = queue.iter_mut().find(|e| e.id == entry.id) {
                *slot = entry;
            } else {
                queue.push(entry);
            }
            state.offline = Arc::new(queue);
        });
    }

    fn set_entry_status(&self, id: &str, status: SyncStatus) {
        self.mutate(|state| {
            let mut entries: Vec<Entry> = (*state.entries).clone();
            if let Some(slot) = entries.iter_mut().find(|e| e.id == id) {
                slot.sync_status = status;
                state.entries = Arc::new(entries);
            }
        });
    }

    fn record_sync_error(&self, context: &str, message: String) {
        let at = self.clock.now_utc();
        warn!(context, %message, "sync error recorded");
        self.mutate(|state| {
            state.sync_errors.push(SyncErrorRecord {
                at,
                context: context.to_string(),
                message,
            });
        });
    }

    /// Reset local auth state after the remote rejected the credential.
    /// Deliberately not a data failure: affected entries stay `pending` so
    /// they retry once the user signs back in.
    fn reset_auth(&self) {
        warn!("remote session expired, resetting local auth state");
        self.mutate(|state| {
            state.auth.signed_in = false;
            state.auth.access_token = None;
            state.auth_reset_required = true;
        });
    }

    /// Write the persisted blob. Failures are logged, never fatal — local
    /// persistence is a convenience layer under the in-memory truth.
    async fn persist(&self) {
        let state = self.read_state(|state| PersistedState {
            auth: state.auth.clone(),
            config: state.config.as_deref().cloned(),
            tracking_data: TrackingData {
                entries: (*state.entries).clone(),
                offline_entries: (*state.offline).clone(),
            },
            ui: state.ui.clone(),
        });

        if let Err(err) = self.local.save(&state).await {
            warn!(error = %err, "failed to persist local state");
        }
    }

    fn zone(&self) -> Tz {
        self.zone
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    fn user_key(&self) -> &str {
        &self.user_key
    }
}
