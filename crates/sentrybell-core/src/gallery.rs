//! Known-identity gallery snapshots.
//!
//! A snapshot is immutable once built; refresh produces a brand-new
//! snapshot that the owner swaps in whole, so in-flight matching never
//! observes a half-updated gallery.

use crate::types::IdentityVector;
use chrono::{DateTime, Utc};

/// One known identity: display name plus its reference embedding.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub vector: IdentityVector,
}

/// The current known-identity set plus the refresh watermark used for
/// remote change detection.
#[derive(Debug, Clone)]
pub struct GallerySnapshot {
    pub entries: Vec<GalleryEntry>,
    pub refreshed_at: DateTime<Utc>,
}

impl GallerySnapshot {
    pub fn empty(refreshed_at: DateTime<Utc>) -> Self {
        Self { entries: Vec::new(), refreshed_at }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulates entries for a new snapshot.
///
/// Uniqueness is by name, last-write-wins: a later entry with the same
/// name replaces the earlier vector but keeps its original position, so
/// equal-distance tie-breaks stay stable across refreshes.
#[derive(Default)]
pub struct GalleryBuilder {
    entries: Vec<GalleryEntry>,
}

impl GalleryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, vector: IdentityVector) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.vector = vector;
        } else {
            self.entries.push(GalleryEntry { name: name.to_string(), vector });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self, refreshed_at: DateTime<Utc>) -> GallerySnapshot {
        GallerySnapshot { entries: self.entries, refreshed_at }
    }
}

/// Change-detection policy: a remote batch is worth downloading only if
/// its newest object is strictly newer than the last recorded refresh.
pub fn remote_is_newer(last_refresh: Option<DateTime<Utc>>, latest_remote: DateTime<Utc>) -> bool {
    match last_refresh {
        Some(watermark) => latest_remote > watermark,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vec_of(v: f32) -> IdentityVector {
        IdentityVector { values: vec![v, v] }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_builder_last_write_wins_keeps_position() {
        let mut b = GalleryBuilder::new();
        b.push("alice", vec_of(1.0));
        b.push("bob", vec_of(2.0));
        b.push("alice", vec_of(3.0));
        let snap = b.build(ts(0));
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.entries[0].name, "alice");
        assert_eq!(snap.entries[0].vector.values, vec![3.0, 3.0]);
        assert_eq!(snap.entries[1].name, "bob");
    }

    #[test]
    fn test_remote_is_newer_first_refresh() {
        assert!(remote_is_newer(None, ts(100)));
    }

    #[test]
    fn test_remote_is_newer_requires_strictly_newer() {
        assert!(!remote_is_newer(Some(ts(100)), ts(100)));
        assert!(!remote_is_newer(Some(ts(100)), ts(50)));
        assert!(remote_is_newer(Some(ts(100)), ts(101)));
    }
}
