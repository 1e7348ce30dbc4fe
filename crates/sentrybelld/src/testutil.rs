//! In-memory fakes shared by daemon tests.

use chrono::{DateTime, Utc};
use image::RgbImage;
use sentrybell_core::analyzer::{AnalyzerError, FaceAnalyzer};
use sentrybell_core::types::{FaceBox, IdentityVector};
use sentrybell_remote::{
    AttendanceEvent, ObjectInfo, ObjectStore, PriorityFlags, RealtimeDb, RemoteError,
    VisitorProfile,
};
use std::sync::{Arc, Mutex};

/// Encode a uniform 4x4 PNG of the given color.
pub fn png_bytes(r: u8, g: u8, b: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, image::Rgb([r, g, b]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// Analyzer that sees one face in any non-black image and encodes it as
/// the normalized color of the top-left pixel. Deterministic and fast.
pub struct FakeAnalyzer;

impl FaceAnalyzer for FakeAnalyzer {
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError> {
        let pixel = image.get_pixel(0, 0).0;
        if pixel == [0, 0, 0] {
            return Ok(Vec::new());
        }
        Ok(vec![FaceBox {
            x: 0.0,
            y: 0.0,
            width: image.width() as f32,
            height: image.height() as f32,
            confidence: 0.99,
        }])
    }

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        faces: &[FaceBox],
    ) -> Result<Vec<IdentityVector>, AnalyzerError> {
        let pixel = image.get_pixel(0, 0).0;
        let vector = IdentityVector {
            values: pixel.iter().map(|&c| c as f32 / 255.0).collect(),
        };
        Ok(faces.iter().map(|_| vector.clone()).collect())
    }
}

type StoredObject = (String, DateTime<Utc>, Vec<u8>);

/// In-memory object store with a shared handle for mid-test mutation.
pub struct MemoryStore {
    objects: Arc<Mutex<Vec<StoredObject>>>,
}

#[derive(Clone)]
pub struct MemoryStoreHandle {
    objects: Arc<Mutex<Vec<StoredObject>>>,
}

impl MemoryStore {
    pub fn new(objects: Vec<(&str, DateTime<Utc>, Vec<u8>)>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(
                objects
                    .into_iter()
                    .map(|(k, t, b)| (k.to_string(), t, b))
                    .collect(),
            )),
        }
    }

    pub fn handle(&self) -> MemoryStoreHandle {
        MemoryStoreHandle { objects: self.objects.clone() }
    }
}

impl MemoryStoreHandle {
    pub fn insert(&self, key: &str, updated_at: DateTime<Utc>, bytes: Vec<u8>) {
        self.objects.lock().unwrap().push((key.to_string(), updated_at, bytes));
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, RemoteError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| k.starts_with(prefix))
            .map(|(k, t, _)| ObjectInfo { key: k.clone(), updated_at: *t })
            .collect())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _, _)| k == key)
            .map(|(_, _, b)| b.clone())
            .ok_or(RemoteError::Status { status: 404, context: format!("fetch object {key}") })
    }
}

/// In-memory realtime backend recording every write.
#[derive(Clone, Default)]
pub struct MemoryDb {
    pub directory: Arc<Mutex<Vec<VisitorProfile>>>,
    pub flag_writes: Arc<Mutex<Vec<PriorityFlags>>>,
    pub attendance: Arc<Mutex<Vec<AttendanceEvent>>>,
    pub dirty: Arc<Mutex<bool>>,
}

impl MemoryDb {
    pub fn with_directory(entries: Vec<(&str, u8)>) -> Self {
        let db = Self::default();
        *db.directory.lock().unwrap() = entries
            .into_iter()
            .map(|(name, priority)| VisitorProfile { name: name.to_string(), priority })
            .collect();
        db
    }

    pub fn last_flags(&self) -> Option<PriorityFlags> {
        self.flag_writes.lock().unwrap().last().copied()
    }
}

impl RealtimeDb for MemoryDb {
    fn visitor_directory(&self) -> Result<Vec<VisitorProfile>, RemoteError> {
        Ok(self.directory.lock().unwrap().clone())
    }

    fn write_priority_flags(&self, flags: PriorityFlags) -> Result<(), RemoteError> {
        self.flag_writes.lock().unwrap().push(flags);
        Ok(())
    }

    fn push_attendance(&self, event: &AttendanceEvent) -> Result<(), RemoteError> {
        self.attendance.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn gallery_dirty(&self) -> Result<bool, RemoteError> {
        Ok(*self.dirty.lock().unwrap())
    }

    fn clear_gallery_dirty(&self) -> Result<(), RemoteError> {
        *self.dirty.lock().unwrap() = false;
        Ok(())
    }
}
