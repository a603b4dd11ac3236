// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cloud file store client.
//!
//! Implements [`RemoteStore`] against the hosted file API: files are keyed
//! by name (`config.json`, `tracking-journal_<YYYY-MM>.json`), bodies are
//! UTF-8 JSON, and writes replace whole files. The client owns nothing but
//! the wire format; throttling and retry live in
//! [`ThrottledStore`](super::throttle::ThrottledStore).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::traits::{
    monthly_file_name, Ack, FileMeta, OfflineSyncResult, RemoteStore, StoreError,
    CONFIG_FILE_NAME, TRACKING_FILE_PREFIX,
};
use crate::config::Configuration;
use crate::entry::{Entry, MonthlyTrackingFile, SyncStatus};

/// Ceiling for data operations.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RemoteFileMeta {
    id: String,
    name: String,
    updated_at: DateTime<Utc>,
}

impl From<RemoteFileMeta> for FileMeta {
    fn from(meta: RemoteFileMeta) -> Self {
        Self {
            id: meta.id,
            name: meta.name,
            updated_at: meta.updated_at,
        }
    }
}

/// HTTP client for the cloud file API.
pub struct CloudFileStore {
    client: reqwest::Client,
    base_url: String,
    /// Bearer token; cleared on auth reset, set again after re-auth.
    access_token: RwLock<Option<String>>,
    zone: Tz,
}

impl CloudFileStore {
    /// Build a client for the given API base URL.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_zone(base_url, chrono_tz::UTC)
    }

    pub fn with_zone(base_url: &str, zone: Tz) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Permanent(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
            zone,
        })
    }

    pub fn set_access_token(&self, token: &str) {
        *self.access_token.write() = Some(token.to_string());
    }

    pub fn clear_access_token(&self) {
        *self.access_token.write() = None;
    }

    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let token = self
            .access_token
            .read()
            .clone()
            .ok_or(StoreError::AuthExpired)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| StoreError::AuthExpired)?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !status.is_success() {
            debug!(%status, body_len = body.len(), "cloud store error response");
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Permanent(format!("decode body: {e}")))
    }

    /// List files whose name matches exactly.
    async fn find_file(&self, name: &str) -> Result<Option<FileMeta>, StoreError> {
        let response = self
            .client
            .get(self.url("files"))
            .query(&[("name", name)])
            .headers(self.headers()?)
            .send()
            .await
            .map_err(map_transport)?;

        let metas: Vec<RemoteFileMeta> = Self::parse_response(response).await?;
        Ok(metas
            .into_iter()
            .find(|meta| meta.name == name)
            .map(Into::into))
    }

    async fn get_body(&self, file_id: &str) -> Result<Value, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("files/{file_id}/content")))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(map_transport)?;

        Self::parse_response(response).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Value>, StoreError> {
        match self.find_file(name).await? {
            Some(meta) => Ok(Some(self.get_body(&meta.id).await?)),
            None => Ok(None),
        }
    }

    /// Create or replace the file with the given name.
    async fn put_by_name(&self, name: &str, body: &Value) -> Result<Ack, StoreError> {
        let meta: RemoteFileMeta = match self.find_file(name).await? {
            Some(existing) => {
                let response = self
                    .client
                    .put(self.url(&format!("files/{}", existing.id)))
                    .headers(self.headers()?)
                    .json(&json!({"content": body}))
                    .send()
                    .await
                    .map_err(map_transport)?;
                Self::parse_response(response).await?
            }
            None => {
                let response = self
                    .client
                    .post(self.url("files"))
                    .headers(self.headers()?)
                    .json(&json!({"name": name, "content": body}))
                    .send()
                    .await
                    .map_err(map_transport)?;
                Self::parse_response(response).await?
            }
        };

        debug!(name, file_id = %meta.id, "cloud file written");
        Ok(Ack {
            file_id: meta.id,
            updated_at: meta.updated_at,
        })
    }
}

/// Map an HTTP status onto the store error taxonomy. 401/403 mean the
/// session is gone; 429 and 5xx are worth retrying; anything else that
/// failed is a malformed request or a server-side rejection.
fn classify_status(status: StatusCode, body: &str) -> StoreError {
    match status.as_u16() {
        401 | 403 => StoreError::AuthExpired,
        429 => StoreError::RateLimited,
        408 => StoreError::Timeout(REQUEST_TIMEOUT),
        500..=599 => StoreError::Network(format!("server error {status}")),
        _ => StoreError::Permanent(format!("{status}: {}", body.chars().take(200).collect::<String>())),
    }
}

fn map_transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout(REQUEST_TIMEOUT)
    } else {
        StoreError::Network(err.to_string())
    }
}

#[async_trait]
impl RemoteStore for CloudFileStore {
    async fn get_config_file(&self, _user_key: &str) -> Result<Option<Value>, StoreError> {
        self.get_by_name(CONFIG_FILE_NAME).await
    }

    async fn save_config_file(&self, config: &Configuration) -> Result<Ack, StoreError> {
        let body = serde_json::to_value(config)
            .map_err(|e| StoreError::Permanent(format!("encode config: {e}")))?;
        self.put_by_name(CONFIG_FILE_NAME, &body).await
    }

    async fn get_monthly_file(&self, month: &str) -> Result<Option<Value>, StoreError> {
        self.get_by_name(&monthly_file_name(month)).await
    }

    async fn save_monthly_file(
        &self,
        month: &str,
        file: &MonthlyTrackingFile,
    ) -> Result<Ack, StoreError> {
        let body = serde_json::to_value(file)
            .map_err(|e| StoreError::Permanent(format!("encode tracking file: {e}")))?;
        self.put_by_name(&monthly_file_name(month), &body).await
    }

    async fn list_monthly_files(&self) -> Result<Vec<FileMeta>, StoreError> {
        let response = self
            .client
            .get(self.url("files"))
            .query(&[("name", TRACKING_FILE_PREFIX)])
            .headers(self.headers()?)
            .send()
            .await
            .map_err(map_transport)?;

        let metas: Vec<RemoteFileMeta> = Self::parse_response(response).await?;
        Ok(metas
            .into_iter()
            .filter(|meta| meta.name.starts_with(TRACKING_FILE_PREFIX))
            .map(Into::into)
            .collect())
    }

    /// The file API has no batch endpoint: the batch is materialized
    /// client-side as one read-merge-write per affected month.
    async fn sync_offline_entries(
        &self,
        entries: &[Entry],
    ) -> Result<OfflineSyncResult, StoreError> {
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
            let mut file = match self.get_monthly_file(&month).await? {
                Some(raw) => serde_json::from_value(raw)
                    .map_err(|e| StoreError::Permanent(format!("decode tracking file: {e}")))?,
                None => MonthlyTrackingFile::new(&month, now),
            };

            for mut entry in month_entries {
                entry.sync_status = SyncStatus::Synced;
                result.synced_ids.push(entry.id.clone());
                result.synced += 1;
                file.upsert(entry);
            }

            file.finalize(now);
            self.save_monthly_file(&month, &file).await?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            StoreError::AuthExpired
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            StoreError::AuthExpired
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            StoreError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            StoreError::Network(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "nope"),
            StoreError::Permanent(_)
        ));
    }

    #[test]
    fn missing_token_reads_as_expired_session() {
        let store = CloudFileStore::new("https://api.example.test").unwrap();
        assert!(matches!(store.headers(), Err(StoreError::AuthExpired)));

        store.set_access_token("token-1");
        assert!(store.headers().is_ok());

        store.clear_access_token();
        assert!(matches!(store.headers(), Err(StoreError::AuthExpired)));
    }

    #[test]
    fn base_url_is_normalized() {
        let store = CloudFileStore::new("https://api.example.test/").unwrap();
        assert_eq!(store.url("files"), "https://api.example.test/v1/files");
    }
}
