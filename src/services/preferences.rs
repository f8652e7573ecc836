use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AdvisorError, Result};
use crate::models::UserPreference;
use crate::services::record_store::{preference_key, RecordStore};

/// Reads and writes `UserPreference` records. An update fully replaces the
/// stored record for that user; nothing is merged.
pub struct PreferenceService {
    store: Arc<dyn RecordStore>,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreference>> {
        let Some(value) = self.store.get(&preference_key(user_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Normalize, stamp `last_updated`, and overwrite the stored record.
    /// Returns the record as stored.
    pub async fn update_preferences(&self, prefs: UserPreference) -> Result<UserPreference> {
        if prefs.user_id.trim().is_empty() {
            return Err(AdvisorError::InvalidInput(
                "user_id cannot be empty".to_string(),
            ));
        }

        let mut prefs = prefs.normalized();
        prefs.last_updated = Utc::now();

        let value = serde_json::to_value(&prefs)?;
        self.store
            .put(&preference_key(&prefs.user_id), value, None)
            .await?;

        debug!(user_id = %prefs.user_id, "replaced stored preferences");
        Ok(prefs)
    }
}
