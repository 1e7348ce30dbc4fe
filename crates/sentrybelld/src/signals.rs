//! Control-signal subscriber.
//!
//! External events (the backend's gallery-changed flag) are delivered
//! into the frame loop through a channel drained once per frame, never
//! as a callback firing on an arbitrary context.

use sentrybell_remote::RealtimeDb;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    GalleryChanged,
}

/// Spawn the poller thread that watches the backend's gallery-changed
/// flag and posts into the pipeline's channel. Poll errors are treated
/// as "no change".
pub fn spawn_signal_poller(
    db: Arc<dyn RealtimeDb>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> Receiver<ControlSignal> {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::Builder::new()
        .name("sentrybell-signals".into())
        .spawn(move || poll_loop(db, poll_interval, shutdown, tx))
        .expect("failed to spawn signal poller thread");

    rx
}

fn poll_loop(
    db: Arc<dyn RealtimeDb>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    tx: Sender<ControlSignal>,
) {
    tracing::debug!(interval_ms = poll_interval.as_millis() as u64, "signal poller started");
    while !shutdown.load(Ordering::Relaxed) {
        match db.gallery_dirty() {
            Ok(true) => {
                if tx.send(ControlSignal::GalleryChanged).is_err() {
                    break; // pipeline gone
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::debug!(error = %err, "gallery-changed poll failed; treating as no change");
            }
        }
        std::thread::sleep(poll_interval);
    }
    tracing::debug!("signal poller exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryDb;
    use std::sync::mpsc::RecvTimeoutError;

    #[test]
    fn test_poller_posts_on_dirty_flag() {
        let db = MemoryDb::default();
        *db.dirty.lock().unwrap() = true;
        let shutdown = Arc::new(AtomicBool::new(false));

        let rx = spawn_signal_poller(Arc::new(db), Duration::from_millis(5), shutdown.clone());
        let signal = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(signal, ControlSignal::GalleryChanged);
        shutdown.store(true, Ordering::Relaxed);
    }

    #[test]
    fn test_poller_quiet_when_clean() {
        let db = MemoryDb::default();
        let shutdown = Arc::new(AtomicBool::new(false));

        let rx = spawn_signal_poller(Arc::new(db), Duration::from_millis(5), shutdown.clone());
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Timeout)
        );
        shutdown.store(true, Ordering::Relaxed);
    }
}
