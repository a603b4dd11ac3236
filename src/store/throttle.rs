// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Single-lane request queue with bounded retry and exponential backoff.
//!
//! Every remote call funnels through one lane so bursty UI-triggered writes
//! (rapid settings toggles, quick entries) cannot stampede the remote quota.
//! Transient failures are retried up to a bounded attempt count with an
//! explicit [`BackoffPolicy`]: 1s initial delay, doubling to an 8s cap,
//! reset to the initial delay on any success. Auth and permanent failures
//! surface immediately.
//!
//! Sleeping goes through the [`Sleeper`] trait so the policy is testable
//! without timing the real clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{Ack, FileMeta, OfflineSyncResult, RemoteStore, StoreError};
use crate::config::Configuration;
use crate::entry::{Entry, MonthlyTrackingFile};

/// Attempts per request before the failure surfaces to the caller.
pub const MAX_ATTEMPTS: usize = 3;

/// Explicit backoff state: current delay, cap, reset-on-success.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl BackoffPolicy {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// The production policy: 1s doubling to 8s.
    #[must_use]
    pub fn remote_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(8))
    }

    /// The delay to sleep before the next attempt. Doubles the stored delay
    /// up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Any success winds the policy back to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.current
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::remote_default()
    }
}

/// Sleep abstraction so retry behavior is testable in isolation.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test double: records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: parking_lot::Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

/// Wraps any [`RemoteStore`] in the single-lane retry queue.
pub struct ThrottledStore<S> {
    inner: S,
    lane: tokio::sync::Mutex<()>,
    backoff: parking_lot::Mutex<BackoffPolicy>,
    sleeper: Arc<dyn Sleeper>,
    max_attempts: usize,
}

impl<S: RemoteStore> ThrottledStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self::with_sleeper(inner, Arc::new(TokioSleeper))
    }

    #[must_use]
    pub fn with_sleeper(inner: S, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            inner,
            lane: tokio::sync::Mutex::new(()),
            backoff: parking_lot::Mutex::new(BackoffPolicy::remote_default()),
            sleeper,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// The delay the policy would apply to the next transient failure.
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.backoff.lock().current_delay()
    }

    /// The wrapped store (mock knobs, token management).
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
    {
        let _lane = self.lane.lock().await;
        let mut attempts = 0;

        loop {
            match call().await {
                Ok(value) => {
                    self.backoff.lock().reset();
                    if attempts > 0 {
                        debug!(operation, attempts, "remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        warn!(operation, attempts, error = %err, "remote call exhausted retries");
                        return Err(err);
                    }
                    let delay = self.backoff.lock().next_delay();
                    warn!(
                        operation,
                        attempt = attempts,
                        ?delay,
                        error = %err,
                        "remote call failed, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(err) => {
                    // Auth expiry and permanent failures are not retried
                    // here; the engine decides what they mean.
                    debug!(operation, error = %err, "remote call failed without retry");
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for ThrottledStore<S> {
    async fn get_config_file(&self, user_key: &str) -> Result<Option<Value>, StoreError> {
        self.run("get_config_file", || self.inner.get_config_file(user_key))
            .await
    }

    async fn save_config_file(&self, config: &Configuration) -> Result<Ack, StoreError> {
        self.run("save_config_file", || self.inner.save_config_file(config))
            .await
    }

    async fn get_monthly_file(&self, month: &str) -> Result<Option<Value>, StoreError> {
        self.run("get_monthly_file", || self.inner.get_monthly_file(month))
            .await
    }

    async fn save_monthly_file(
        &self,
        month: &str,
        file: &MonthlyTrackingFile,
    ) -> Result<Ack, StoreError> {
        self.run("save_monthly_file", || {
            self.inner.save_monthly_file(month, file)
        })
        .await
    }

    async fn list_monthly_files(&self) -> Result<Vec<FileMeta>, StoreError> {
        self.run("list_monthly_files", || self.inner.list_monthly_files())
            .await
    }

    async fn sync_offline_entries(
        &self,
        entries: &[Entry],
    ) -> Result<OfflineSyncResult, StoreError> {
        self.run("sync_offline_entries", || {
            self.inner.sync_offline_entries(entries)
        })
        .await
    }
}
