//! Remote store adapter.
//!
//! The cloud file store is an external collaborator reached through the
//! [`RemoteStore`](traits::RemoteStore) trait: per-month tracking files and
//! a singleton config file, keyed by name. Two implementations exist —
//! an in-memory mock ([`memory::MockRemoteStore`]) and a cloud HTTP client
//! ([`http::CloudFileStore`]) — selected at construction time, never
//! branched on internally. Either can be wrapped in a
//! [`throttle::ThrottledStore`] to serialize outbound calls and apply
//! bounded retry with exponential backoff.

pub mod http;
pub mod memory;
pub mod throttle;
pub mod traits;

pub use http::CloudFileStore;
pub use memory::MockRemoteStore;
pub use throttle::{BackoffPolicy, RecordingSleeper, Sleeper, ThrottledStore, TokioSleeper};
pub use traits::{
    month_from_file_name, monthly_file_name, Ack, FileMeta, OfflineSyncResult, RemoteStore,
    StoreError, CONFIG_FILE_NAME, TRACKING_FILE_PREFIX,
};
