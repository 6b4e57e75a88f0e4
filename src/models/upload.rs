//! Acknowledgement returned for every file accepted by the upload endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

const ACK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the upload response, rendered by the page as
/// `<time> <message>`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadAck {
    /// UTC time the file was stored, `YYYY-MM-DD HH:MM:SS`.
    pub time: String,

    /// File name as submitted by the browser.
    pub message: String,
}

impl UploadAck {
    pub fn new(at: DateTime<Utc>, file_name: impl Into<String>) -> Self {
        Self {
            time: at.format(ACK_TIME_FORMAT).to_string(),
            message: file_name.into(),
        }
    }
}
