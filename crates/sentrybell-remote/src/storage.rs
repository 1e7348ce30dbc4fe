//! Remote object storage for gallery source images.
//!
//! Speaks the Firebase-storage-style REST surface: list objects under a
//! prefix with modification timestamps, fetch bytes by key.

use crate::RemoteError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One remote object: key plus last-modified timestamp.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub updated_at: DateTime<Utc>,
}

/// Listing and fetching of gallery source objects.
pub trait ObjectStore: Send {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, RemoteError>;
    fn fetch(&self, key: &str) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Deserialize)]
struct ListingItem {
    name: String,
    updated: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    items: Vec<ListingItem>,
}

/// Parse a storage listing response body.
pub fn parse_listing(body: &str) -> Result<Vec<ObjectInfo>, RemoteError> {
    let listing: Listing =
        serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))?;
    Ok(listing
        .items
        .into_iter()
        .map(|item| ObjectInfo { key: item.name, updated_at: item.updated })
        .collect())
}

/// HTTP-backed object store for one bucket.
pub struct HttpObjectStore {
    bucket: String,
    client: reqwest::blocking::Client,
}

impl HttpObjectStore {
    pub fn new(bucket: &str) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { bucket: bucket.to_string(), client })
    }

    fn listing_url(&self) -> String {
        format!("https://firebasestorage.googleapis.com/v0/b/{}/o", self.bucket)
    }

    fn object_url(&self, key: &str) -> String {
        // The object key goes into a single path segment, slashes included.
        format!(
            "https://firebasestorage.googleapis.com/v0/b/{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(key)
        )
    }
}

impl ObjectStore for HttpObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, RemoteError> {
        let response = self
            .client
            .get(self.listing_url())
            .query(&[("prefix", prefix)])
            .send()?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                context: format!("list objects under {prefix}"),
            });
        }
        parse_listing(&response.text()?)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.client.get(self.object_url(key)).send()?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                context: format!("fetch object {key}"),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}
