//! Event Grid envelopes and the storage notification they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const SUBSCRIPTION_VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Storage operations that leave a complete, readable blob behind.
const FINALIZING_OPERATIONS: [&str; 3] = ["PutBlob", "PutBlockList", "FlushWithClose"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event `{id}` data is not a storage notification: {reason}")]
    InvalidData { id: String, reason: String },
    #[error("event `{0}` carries neither `url` nor `blobUrl`")]
    MissingUrl(String),
    #[error("validation event `{0}` has no validation code")]
    MissingValidationCode(String),
}

/// One entry of the array Event Grid posts to a webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGridEvent {
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subject: String,
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub data_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageEventData {
    api: String,
    url: Option<String>,
    blob_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationEventData {
    validation_code: Option<String>,
}

impl EventGridEvent {
    pub fn is_subscription_validation(&self) -> bool {
        self.event_type == SUBSCRIPTION_VALIDATION_EVENT
    }

    pub fn validation_code(&self) -> Result<String, EventError> {
        serde_json::from_value::<ValidationEventData>(self.data.clone())
            .ok()
            .and_then(|data| data.validation_code)
            .ok_or_else(|| EventError::MissingValidationCode(self.id.clone()))
    }

    pub fn transfer_event(&self) -> Result<TransferEvent, EventError> {
        let data: StorageEventData =
            serde_json::from_value(self.data.clone()).map_err(|err| EventError::InvalidData {
                id: self.id.clone(),
                reason: err.to_string(),
            })?;

        let source_url = data
            .url
            .filter(|u| !u.is_empty())
            .or(data.blob_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EventError::MissingUrl(self.id.clone()))?;

        Ok(TransferEvent::new(data.api, source_url))
    }
}

/// An operation on a source blob, as reported by the storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub operation: String,
    pub source_url: String,
}

impl TransferEvent {
    pub fn new(operation: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            source_url: source_url.into(),
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.operation.starts_with("Delete")
    }

    pub fn is_finalized_write(&self) -> bool {
        FINALIZING_OPERATIONS.contains(&self.operation.as_str())
    }
}
