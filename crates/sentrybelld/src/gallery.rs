//! Gallery refresh from remote object storage.
//!
//! Lists image objects under a prefix, skips the whole batch when
//! nothing is newer than the last refresh, and otherwise rebuilds the
//! snapshot from every object that downloads, decodes, and contains at
//! least one face. Individual failures are logged and skipped, never
//! fatal to the refresh.

use chrono::{DateTime, Utc};
use sentrybell_core::analyzer::FaceAnalyzer;
use sentrybell_core::gallery::{remote_is_newer, GalleryBuilder, GallerySnapshot};
use sentrybell_remote::{ObjectStore, RemoteError};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct GallerySync {
    store: Box<dyn ObjectStore>,
    prefix: String,
    /// Newest remote modification timestamp seen on the last
    /// successful refresh; the change-detection watermark.
    last_seen: Option<DateTime<Utc>>,
}

impl GallerySync {
    pub fn new(store: Box<dyn ObjectStore>, prefix: &str) -> Self {
        Self { store, prefix: prefix.to_string(), last_seen: None }
    }

    /// Refresh the gallery if remote storage changed.
    ///
    /// `Ok(None)` means no change (or nothing usable); the caller keeps
    /// its current snapshot. `Ok(Some(..))` is a complete replacement
    /// built from exactly the successfully encoded images.
    pub fn refresh(
        &mut self,
        analyzer: &mut dyn FaceAnalyzer,
        now: DateTime<Utc>,
    ) -> Result<Option<GallerySnapshot>, RemoteError> {
        let objects: Vec<_> = self
            .store
            .list(&self.prefix)?
            .into_iter()
            .filter(|o| has_image_extension(&o.key))
            .collect();

        let Some(latest) = objects.iter().map(|o| o.updated_at).max() else {
            tracing::debug!(prefix = %self.prefix, "no gallery images in storage");
            return Ok(None);
        };

        if !remote_is_newer(self.last_seen, latest) {
            return Ok(None);
        }

        tracing::info!(count = objects.len(), prefix = %self.prefix, "gallery changed; re-encoding");

        let mut builder = GalleryBuilder::new();
        for object in &objects {
            match self.encode_object(analyzer, &object.key) {
                Ok(Some(vector)) => builder.push(&entry_name(&object.key), vector),
                Ok(None) => {
                    tracing::warn!(object = %object.key, "no face in gallery image; skipping");
                }
                Err(err) => {
                    tracing::warn!(object = %object.key, error = %err, "gallery image skipped");
                }
            }
        }

        if builder.is_empty() {
            tracing::warn!(prefix = %self.prefix, "refresh produced no entries; keeping previous gallery");
            return Ok(None);
        }

        tracing::info!(entries = builder.len(), "gallery snapshot rebuilt");
        self.last_seen = Some(latest);
        Ok(Some(builder.build(now)))
    }

    /// Fetch, decode, and encode the first face of one object.
    fn encode_object(
        &self,
        analyzer: &mut dyn FaceAnalyzer,
        key: &str,
    ) -> Result<Option<sentrybell_core::IdentityVector>, String> {
        let bytes = self.store.fetch(key).map_err(|e| e.to_string())?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| format!("decode: {e}"))?
            .to_rgb8();

        let faces = analyzer.locate_faces(&image).map_err(|e| e.to_string())?;
        let Some(first) = faces.first() else {
            return Ok(None);
        };
        let vectors = analyzer
            .encode_faces(&image, std::slice::from_ref(first))
            .map_err(|e| e.to_string())?;
        Ok(vectors.into_iter().next())
    }
}

fn has_image_extension(key: &str) -> bool {
    key.rsplit('.')
        .next()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Display name for a gallery entry: the object's file stem.
fn entry_name(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    file.rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| file.to_string())
}
