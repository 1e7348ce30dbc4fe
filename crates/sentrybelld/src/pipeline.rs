//! Per-frame recognition pipeline.
//!
//! Everything that touches the cooldown ledgers, the priority machine,
//! or the gallery snapshot runs here, strictly sequentially within one
//! frame: schedule check (gallery refresh), downscale, detect, match,
//! gate, record, escalate, tick, annotate. Remote failures are logged
//! and skipped; they never stop the loop.

use crate::config::Config;
use crate::gallery::GallerySync;
use crate::ledger::AttendanceLedger;
use crate::signals::ControlSignal;
use chrono::{DateTime, Duration, Utc};
use sentrybell_core::analyzer::{candidates_in, FaceAnalyzer};
use sentrybell_core::gallery::GallerySnapshot;
use sentrybell_core::{
    match_candidates, CooldownLedger, FaceBox, FlagWrite, PriorityMachine, PriorityTier,
    VisitorKey,
};
use sentrybell_hw::{CaptureLoop, VideoFrame};
use sentrybell_remote::{AttendanceEvent, PriorityFlags, RealtimeDb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// A matched face mapped back to source-resolution coordinates.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub face: FaceBox,
}

/// On-screen rendering collaborator. The pipeline only produces
/// annotations; what happens to them is someone else's business.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &VideoFrame, annotations: &[Annotation]);
}

/// Default sink: structured log per annotated frame.
pub struct LogSink;

impl FrameSink for LogSink {
    fn present(&mut self, frame: &VideoFrame, annotations: &[Annotation]) {
        if !annotations.is_empty() {
            let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
            tracing::debug!(sequence = frame.sequence, visitors = ?names, "frame annotated");
        }
    }
}

pub struct Pipeline {
    analyzer: Box<dyn FaceAnalyzer>,
    sync: GallerySync,
    snapshot: GallerySnapshot,
    notify_gate: CooldownLedger,
    record_gate: CooldownLedger,
    priority: PriorityMachine,
    ledger: AttendanceLedger,
    db: Arc<dyn RealtimeDb>,
    match_threshold: f32,
    downscale: f32,
    refresh_interval: Duration,
    last_refresh_attempt: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        analyzer: Box<dyn FaceAnalyzer>,
        sync: GallerySync,
        ledger: AttendanceLedger,
        db: Arc<dyn RealtimeDb>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            analyzer,
            sync,
            snapshot: GallerySnapshot::empty(now),
            notify_gate: CooldownLedger::new(Duration::seconds(config.notify_window_secs)),
            record_gate: CooldownLedger::new(Duration::seconds(config.record_window_secs)),
            priority: PriorityMachine::new(Duration::seconds(config.reset_delay_secs)),
            ledger,
            db,
            match_threshold: config.match_threshold,
            downscale: config.downscale,
            refresh_interval: Duration::seconds(config.refresh_interval_secs),
            last_refresh_attempt: None,
        }
    }

    /// Run until the capture loop stops or shutdown is requested.
    /// Signals are drained once per frame, at the same serialization
    /// point as everything else.
    pub fn run(
        mut self,
        mut capture: CaptureLoop,
        signals: Receiver<ControlSignal>,
        shutdown: Arc<AtomicBool>,
        mut sink: Box<dyn FrameSink>,
    ) {
        tracing::info!("pipeline started");
        loop {
            if shutdown.load(Ordering::Relaxed) {
                capture.stop();
                tracing::info!("shutdown requested; capture released");
                break;
            }

            let signaled = signals
                .try_iter()
                .any(|s| s == ControlSignal::GalleryChanged);

            let Some(frame) = capture.next_frame() else {
                tracing::error!("capture stopped; pipeline ending");
                break;
            };

            let annotations = self.process_frame(&frame, Utc::now(), signaled);
            sink.present(&frame, &annotations);
        }
        tracing::info!("pipeline exiting");
    }

    /// Process one frame. `signaled` marks an external gallery-changed
    /// event drained from the control channel this cycle.
    pub fn process_frame(
        &mut self,
        frame: &VideoFrame,
        now: DateTime<Utc>,
        signaled: bool,
    ) -> Vec<Annotation> {
        self.maybe_refresh_gallery(now, signaled);

        let small = sentrybell_hw::frame::downscale(&frame.image, self.downscale);
        let candidates = match candidates_in(self.analyzer.as_mut(), &small) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(sequence = frame.sequence, error = %err, "face analysis failed; skipping frame");
                Vec::new()
            }
        };

        let mut annotations = Vec::new();
        let upscale = 1.0 / self.downscale;

        for outcome in match_candidates(&candidates, &self.snapshot, self.match_threshold) {
            let Some(name) = outcome.name else {
                continue; // unmatched faces never reach the gates
            };
            let display_name = name.to_uppercase();
            let key = VisitorKey::normalize(&name);

            if self.notify_gate.check_and_commit(&key, now) {
                tracing::info!(visitor = %display_name, distance = outcome.distance, "visitor at the door");
            }

            if self.record_gate.check_and_commit(&key, now) {
                self.record_attendance(&key, &display_name, now);
            }

            annotations.push(Annotation { name: display_name, face: outcome.face.scaled(upscale) });
        }

        if let Some(write) = self.priority.tick(now) {
            tracing::debug!("priority escalation expired; clearing flags");
            self.apply_flags(write);
        }

        annotations
    }

    /// Schedule check, once per frame: refresh on the fixed interval or
    /// on an external signal, both through the same path.
    fn maybe_refresh_gallery(&mut self, now: DateTime<Utc>, signaled: bool) {
        let interval_due = match self.last_refresh_attempt {
            Some(last) => now - last >= self.refresh_interval,
            None => true,
        };
        if !signaled && !interval_due {
            return;
        }
        self.last_refresh_attempt = Some(now);

        match self.sync.refresh(self.analyzer.as_mut(), now) {
            Ok(Some(snapshot)) => {
                tracing::info!(entries = snapshot.len(), "gallery snapshot swapped");
                self.snapshot = snapshot;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "gallery refresh failed; keeping previous snapshot");
                return; // leave the dirty flag set so the poller retries
            }
        }

        if signaled {
            if let Err(err) = self.db.clear_gallery_dirty() {
                tracing::warn!(error = %err, "failed to clear gallery-changed flag");
            }
        }
    }

    /// Ledger row, backend push, and priority escalation for one passed
    /// record gate.
    fn record_attendance(&mut self, key: &VisitorKey, display_name: &str, now: DateTime<Utc>) {
        let time_of_day = now.format("%H:%M:%S").to_string();

        if let Err(err) = self.ledger.append(display_name, &time_of_day) {
            tracing::warn!(visitor = %display_name, error = %err, "ledger append failed");
        } else {
            tracing::info!(visitor = %display_name, time = %time_of_day, "attendance recorded");
        }

        let level = self.directory_level(key);
        let tier = PriorityTier::from_level(level);

        let event = AttendanceEvent {
            name: display_name.to_string(),
            timestamp: time_of_day,
            priority: level,
            message: format!("{display_name} is at the door!"),
        };
        if let Err(err) = self.db.push_attendance(&event) {
            tracing::warn!(visitor = %display_name, error = %err, "attendance push failed; skipping");
        }

        tracing::info!(visitor = %display_name, tier = %tier, "priority escalated");
        let write = self.priority.escalate(tier, now);
        self.apply_flags(write);
    }

    /// Priority level from the visitor directory; lookup failure or
    /// absence defaults to the lowest severity.
    fn directory_level(&self, key: &VisitorKey) -> u8 {
        match self.db.visitor_directory() {
            Ok(profiles) => profiles
                .iter()
                .find(|p| VisitorKey::normalize(&p.name) == *key)
                .map(|p| p.priority)
                .unwrap_or(0),
            Err(err) => {
                tracing::warn!(error = %err, "visitor directory unavailable; defaulting priority");
                0
            }
        }
    }

    fn apply_flags(&self, write: FlagWrite) {
        let flags = PriorityFlags { low: write.low, medium: write.medium, high: write.high };
        if let Err(err) = self.db.write_priority_flags(flags) {
            tracing::warn!(error = %err, "priority flag write failed; skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{png_bytes, FakeAnalyzer, MemoryDb, MemoryStore};
    use chrono::TimeZone;
    use image::RgbImage;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn frame_of(r: u8, g: u8, b: u8) -> VideoFrame {
        VideoFrame { image: RgbImage::from_pixel(16, 16, image::Rgb([r, g, b])), sequence: 0 }
    }

    struct Fixture {
        pipeline: Pipeline,
        db: MemoryDb,
        ledger_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    /// Pipeline over a gallery with one entry ("alice", red) and a
    /// directory marking Alice as medium priority.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("Attendance.csv");
        let config = Config::from_env();

        let store = MemoryStore::new(vec![("photos/alice.jpg", ts(100), png_bytes(200, 0, 0))]);
        let db = MemoryDb::with_directory(vec![("Alice", 2)]);

        let pipeline = Pipeline::new(
            &config,
            Box::new(FakeAnalyzer),
            GallerySync::new(Box::new(store), "photos/"),
            AttendanceLedger::open(&ledger_path).unwrap(),
            Arc::new(db.clone()),
            ts(0),
        );

        Fixture { pipeline, db, ledger_path, _dir: dir }
    }

    #[test]
    fn test_end_to_end_sighting_records_and_escalates() {
        let mut fx = fixture();

        let annotations = fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1000), false);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].name, "ALICE");
        // Box mapped back from the 0.25 downscale to source coordinates.
        assert_eq!(annotations[0].face.width, 16.0);

        let ledger = std::fs::read_to_string(&fx.ledger_path).unwrap();
        assert_eq!(ledger, "Name,Time\nALICE,00:16:40\n");

        let attendance = fx.db.attendance.lock().unwrap();
        assert_eq!(attendance.len(), 1);
        assert_eq!(attendance[0].name, "ALICE");
        assert_eq!(attendance[0].priority, 2);

        // Alice is medium priority in the directory.
        assert_eq!(
            fx.db.last_flags(),
            Some(PriorityFlags { low: false, medium: true, high: false })
        );
    }

    #[test]
    fn test_flags_revert_after_reset_delay() {
        let mut fx = fixture();
        fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1000), false);

        // Nothing at the door; reset not yet due.
        fx.pipeline.process_frame(&frame_of(0, 0, 0), ts(1005), false);
        assert_eq!(
            fx.db.last_flags(),
            Some(PriorityFlags { low: false, medium: true, high: false })
        );

        fx.pipeline.process_frame(&frame_of(0, 0, 0), ts(1010), false);
        assert_eq!(
            fx.db.last_flags(),
            Some(PriorityFlags { low: false, medium: false, high: false })
        );
    }

    #[test]
    fn test_repeat_sighting_within_window_not_rerecorded() {
        let mut fx = fixture();
        fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1000), false);
        let annotations = fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1020), false);

        // Still annotated, but no second ledger row or backend push.
        assert_eq!(annotations.len(), 1);
        let ledger = std::fs::read_to_string(&fx.ledger_path).unwrap();
        assert_eq!(ledger.lines().count(), 2);
        assert_eq!(fx.db.attendance.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_window_elapsed_rerecords() {
        let mut fx = fixture();
        fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1000), false);
        fx.pipeline.process_frame(&frame_of(200, 0, 0), ts(1300), false);
        assert_eq!(fx.db.attendance.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_unmatched_face_never_reaches_gates() {
        let mut fx = fixture();
        // Blue face: far from alice's red embedding.
        let annotations = fx.pipeline.process_frame(&frame_of(0, 0, 200), ts(1000), false);
        assert!(annotations.is_empty());
        assert!(fx.db.attendance.lock().unwrap().is_empty());
        let ledger = std::fs::read_to_string(&fx.ledger_path).unwrap();
        assert_eq!(ledger, "Name,Time\n");
    }

    #[test]
    fn test_unknown_visitor_defaults_to_low() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("Attendance.csv");
        let config = Config::from_env();
        let store = MemoryStore::new(vec![("photos/mallory.jpg", ts(100), png_bytes(0, 200, 0))]);
        let db = MemoryDb::default(); // empty directory

        let mut pipeline = Pipeline::new(
            &config,
            Box::new(FakeAnalyzer),
            GallerySync::new(Box::new(store), "photos/"),
            AttendanceLedger::open(&ledger_path).unwrap(),
            Arc::new(db.clone()),
            ts(0),
        );

        pipeline.process_frame(&frame_of(0, 200, 0), ts(1000), false);
        assert_eq!(
            db.last_flags(),
            Some(PriorityFlags { low: true, medium: false, high: false })
        );
    }

    #[test]
    fn test_gallery_signal_forces_refresh_and_clears_flag() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("Attendance.csv");
        let config = Config::from_env();

        let store = MemoryStore::new(vec![("photos/alice.jpg", ts(100), png_bytes(200, 0, 0))]);
        let handle = store.handle();
        let db = MemoryDb::with_directory(vec![("Bob", 3)]);
        *db.dirty.lock().unwrap() = true;

        let mut pipeline = Pipeline::new(
            &config,
            Box::new(FakeAnalyzer),
            GallerySync::new(Box::new(store), "photos/"),
            AttendanceLedger::open(&ledger_path).unwrap(),
            Arc::new(db.clone()),
            ts(0),
        );

        // First frame loads the initial gallery.
        pipeline.process_frame(&frame_of(0, 0, 0), ts(1000), false);

        // Bob enrolls; signal arrives well inside the refresh interval.
        handle.insert("photos/bob.png", ts(2000), png_bytes(0, 200, 0));
        let annotations = pipeline.process_frame(&frame_of(0, 200, 0), ts(1005), true);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].name, "BOB");
        assert!(!*db.dirty.lock().unwrap());
        assert_eq!(
            db.last_flags(),
            Some(PriorityFlags { low: false, medium: false, high: true })
        );
    }
}
