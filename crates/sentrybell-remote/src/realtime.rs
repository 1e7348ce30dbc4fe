//! Realtime key/value backend: visitor directory, priority flags,
//! attendance push, and the gallery-changed signal.
//!
//! Every write is idempotent from this system's perspective, so a
//! retried write after a timeout is always safe.

use crate::RemoteError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One visitor directory entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VisitorProfile {
    pub name: String,
    #[serde(default)]
    pub priority: u8,
}

/// The three exclusive priority booleans, written as one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityFlags {
    pub low: bool,
    pub medium: bool,
    pub high: bool,
}

/// Attendance event pushed to the backend alongside the ledger row.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceEvent {
    pub name: String,
    pub timestamp: String,
    pub priority: u8,
    pub message: String,
}

pub trait RealtimeDb: Send + Sync {
    fn visitor_directory(&self) -> Result<Vec<VisitorProfile>, RemoteError>;
    fn write_priority_flags(&self, flags: PriorityFlags) -> Result<(), RemoteError>;
    fn push_attendance(&self, event: &AttendanceEvent) -> Result<(), RemoteError>;
    fn gallery_dirty(&self) -> Result<bool, RemoteError>;
    fn clear_gallery_dirty(&self) -> Result<(), RemoteError>;
}

/// Parse the visitor directory document: a map of push-keys to visitor
/// objects, tolerating nulls and missing priority fields.
pub fn parse_visitor_directory(body: &str) -> Result<Vec<VisitorProfile>, RemoteError> {
    let value: Value = serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    let Value::Object(map) = value else {
        // `null` means an empty directory, anything else is malformed.
        return if value.is_null() {
            Ok(Vec::new())
        } else {
            Err(RemoteError::Decode("visitor directory is not an object".into()))
        };
    };

    let mut profiles = Vec::new();
    for (key, entry) in map {
        match serde_json::from_value::<VisitorProfile>(entry) {
            Ok(profile) => profiles.push(profile),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping malformed visitor entry");
            }
        }
    }
    Ok(profiles)
}

/// HTTP-backed realtime database client.
pub struct HttpRealtimeDb {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRealtimeDb {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}.json", self.base_url)
    }

    fn expect_success(response: reqwest::blocking::Response, context: &str) -> Result<(), RemoteError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                status: response.status().as_u16(),
                context: context.to_string(),
            })
        }
    }
}

impl RealtimeDb for HttpRealtimeDb {
    fn visitor_directory(&self) -> Result<Vec<VisitorProfile>, RemoteError> {
        let response = self.client.get(self.url("visitors")).send()?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                context: "read visitor directory".into(),
            });
        }
        parse_visitor_directory(&response.text()?)
    }

    fn write_priority_flags(&self, flags: PriorityFlags) -> Result<(), RemoteError> {
        // One multi-field PATCH so the three booleans change together.
        let response = self
            .client
            .patch(self.url("status/priority"))
            .json(&flags)
            .send()?;
        Self::expect_success(response, "write priority flags")
    }

    fn push_attendance(&self, event: &AttendanceEvent) -> Result<(), RemoteError> {
        let response = self.client.post(self.url("attendance")).json(event).send()?;
        Self::expect_success(response, "push attendance")
    }

    fn gallery_dirty(&self) -> Result<bool, RemoteError> {
        let response = self.client.get(self.url("gallery_dirty")).send()?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                context: "read gallery-changed flag".into(),
            });
        }
        let value: Value = serde_json::from_str(&response.text()?)
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn clear_gallery_dirty(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.url("gallery_dirty"))
            .json(&false)
            .send()?;
        Self::expect_success(response, "clear gallery-changed flag")
    }
}
