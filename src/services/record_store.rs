use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use moka::Expiry;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::RecordStoreConfig;
use crate::error::{AdvisorError, Result};

pub fn cocktail_key(id: i64) -> String {
    format!("cocktail:{id}")
}

pub fn preference_key(user_id: &str) -> String {
    format!("preferences:{user_id}")
}

/// Expiring key-value store for serialized records.
///
/// `get` of an absent or expired key is `Ok(None)`, never an error; a
/// `StoreUnavailable` error means the backing store could not be reached at
/// all. Callers treat missing records as silent exclusions and unavailability
/// as degradation, not as fatal failures.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Unconditionally overwrite `key`, with an optional expiry.
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
}

#[derive(Clone)]
struct StoredRecord {
    value: serde_json::Value,
    ttl: Option<Duration>,
}

struct PerRecordExpiry;

impl Expiry<String, StoredRecord> for PerRecordExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        record: &StoredRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        record.ttl
    }
}

/// In-memory store with per-entry TTL. Used by local deployments and tests.
pub struct MemoryRecordStore {
    entries: Cache<String, StoredRecord>,
}

impl MemoryRecordStore {
    const DEFAULT_CAPACITY: u64 = 100_000;

    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(Self::DEFAULT_CAPACITY)
                .expire_after(PerRecordExpiry)
                .build(),
        }
    }

    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_string(), StoredRecord { value, ttl });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.get(key).map(|record| record.value))
    }
}

#[derive(Deserialize)]
struct StoredRow {
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
}

/// REST-backed store against a `records` table (`key`, `value`,
/// `expires_at`). Expiry is enforced client-side on read; the table is
/// cleaned up out of band.
#[derive(Debug, Clone)]
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(config: &RecordStoreConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at =
            ttl.map(|ttl| Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64));

        let url = format!("{}/rest/v1/records", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&json!({
                "key": key,
                "value": value,
                "expires_at": expires_at,
            }))
            .send()
            .await
            .map_err(|e| AdvisorError::StoreUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(AdvisorError::StoreUnavailable(format!(
                "failed to store record: {status}"
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let url = format!(
            "{}/rest/v1/records?key=eq.{}&select=value,expires_at&limit=1",
            self.base_url, key
        );
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| AdvisorError::StoreUnavailable(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(AdvisorError::StoreUnavailable(format!(
                "unexpected status code: {}",
                response.status()
            )));
        }

        let mut rows: Vec<StoredRow> = response
            .json()
            .await
            .map_err(|e| AdvisorError::Serialization(e.to_string()))?;

        let Some(row) = rows.pop() else {
            return Ok(None);
        };

        if let Some(expires_at) = row.expires_at {
            if expires_at < Utc::now() {
                debug!(key, "record expired");
                return Ok(None);
            }
        }

        Ok(Some(row.value))
    }
}
