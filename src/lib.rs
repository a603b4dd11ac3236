//! # journal-sync
//!
//! Offline-first synchronization and data-integrity core for a client-side
//! symptom-tracking journal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      UI collaborators                       │
//! │  • call add/update/delete/restore, load_config, import      │
//! │  • render EngineSnapshot + Notification stream              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SyncEngine                           │
//! │  • in-memory entries + offline queue (copy-on-write)        │
//! │  • optimistic mutations, per-day collapse, soft delete      │
//! │  • per-entry status: pending / synced / failed              │
//! └─────────────────────────────────────────────────────────────┘
//!          │ validation/scales          │ remote I/O
//!          ▼                            ▼
//! ┌───────────────────┐   ┌─────────────────────────────────────┐
//! │ catalog/validation │   │           ThrottledStore            │
//! │ scale/migration    │   │  single lane, bounded retry,        │
//! └───────────────────┘   │  1s→8s backoff, reset on success    │
//!                          └─────────────────────────────────────┘
//!                                       │
//!                          ┌────────────┴────────────┐
//!                          ▼                         ▼
//!                 ┌────────────────┐       ┌──────────────────┐
//!                 │ MockRemoteStore │       │  CloudFileStore  │
//!                 │  (in-memory)    │       │   (HTTP/JSON)    │
//!                 └────────────────┘       └──────────────────┘
//! ```
//!
//! The remote unit of persistence is the monthly tracking file
//! (`tracking-journal_<YYYY-MM>.json`), loaded fully, merged by entry id
//! and rewritten wholesale. A singleton `config.json` holds the user
//! configuration. Both run through the migration chain before they are
//! parsed, so exports and files from older app versions remain loadable.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use journal_sync::{
//!     EngineOptions, EntryDraft, EntryType, FieldValue, InMemoryState,
//!     MockRemoteStore, SyncEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MockRemoteStore::new());
//! let local = Arc::new(InMemoryState::new());
//! let engine = SyncEngine::new(store, local, EngineOptions::default());
//!
//! engine.boot().await?;
//! engine.load_config().await?;
//!
//! let entry = engine
//!     .add_entry(
//!         EntryDraft::new(EntryType::Quick).score("hot_flash_intensity", FieldValue::Scale(4)),
//!     )
//!     .await?;
//! println!("recorded {}", entry.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: the [`SyncEngine`] orchestrator
//! - [`store`]: remote store adapter (mock, HTTP, throttling)
//! - [`catalog`] / [`validation`] / [`scale`]: the item catalog and the
//!   declaration-driven checks built on it
//! - [`migration`]: ordered schema upgrade chain
//! - [`export`] / [`compression`]: portable import/export formats
//! - [`persist`]: local state blob for offline-first cold start

pub mod catalog;
pub mod clock;
pub mod compression;
pub mod config;
pub mod engine;
pub mod entry;
pub mod export;
pub mod migration;
pub mod persist;
pub mod scale;
pub mod store;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Configuration;
pub use engine::{
    EngineOptions, EngineSnapshot, EntryError, EntryUpdate, LoadError, Notification, Severity,
    SyncEngine, SyncErrorRecord,
};
pub use entry::{Entry, EntryType, FieldValue, MonthlyTrackingFile, Notes, SyncStatus};
pub use export::{EntryExport, ImportError, ImportSummary};
pub use migration::MigrationError;
pub use persist::{InMemoryState, JsonFileState, LocalStatePort, PersistedState};
pub use store::{
    BackoffPolicy, CloudFileStore, MockRemoteStore, RemoteStore, StoreError, ThrottledStore,
};
pub use validation::{EntryDraft, FieldError};
