//! Resilient frame acquisition.
//!
//! The loop survives transient read failures by releasing the source,
//! backing off, and re-initializing with the same source-kind
//! preference. Only a failed initialization is fatal.

use crate::frame::VideoFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open source {0}: {1}")]
    OpenFailed(String, String),
    #[error("frame read failed: {0}")]
    ReadFailed(String),
    #[error("frame conversion failed: {0}")]
    Conversion(#[from] crate::frame::FrameError),
}

/// An open video source: read one frame at a time, release on teardown.
pub trait VideoSource: Send {
    fn read_frame(&mut self) -> Result<VideoFrame, SourceError>;

    /// Release underlying resources. Default drop-based cleanup is
    /// enough for most sources.
    fn release(&mut self) {}
}

/// Source initialization, re-executed on every (re)connect so fallback
/// preferences are re-applied consistently.
pub trait SourceOpener: Send {
    fn open(&mut self) -> Result<Box<dyn VideoSource>, SourceError>;

    /// Human-readable identifier for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Connecting,
    Streaming,
    Reconnecting,
    Stopped,
}

/// Drives Connecting → Streaming → Reconnecting → Stopped.
pub struct CaptureLoop {
    opener: Box<dyn SourceOpener>,
    backoff: Duration,
    state: CaptureState,
    source: Option<Box<dyn VideoSource>>,
    sequence: u64,
    sleeper: Box<dyn FnMut(Duration) + Send>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureLoop {
    pub fn new(opener: Box<dyn SourceOpener>, backoff: Duration, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            opener,
            backoff,
            state: CaptureState::Connecting,
            source: None,
            sequence: 0,
            sleeper: Box::new(std::thread::sleep),
            shutdown,
        }
    }

    /// Replace the backoff sleeper (used by tests to observe waits).
    pub fn with_sleeper(mut self, sleeper: Box<dyn FnMut(Duration) + Send>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Produce the next frame, reconnecting through failures.
    /// Returns `None` only once the loop is `Stopped` (shutdown
    /// request, fatal initialization failure, or an explicit `stop()`).
    ///
    /// The shutdown flag is checked before every (re)connect attempt,
    /// so a wedged source cannot keep the reconnect cycle spinning past
    /// a requested exit.
    pub fn next_frame(&mut self) -> Option<VideoFrame> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                self.stop();
                tracing::info!("shutdown requested; capture released");
                return None;
            }
            match self.state {
                CaptureState::Stopped => return None,
                CaptureState::Connecting | CaptureState::Reconnecting => {
                    match self.opener.open() {
                        Ok(source) => {
                            tracing::info!(source = %self.opener.describe(), "source streaming");
                            self.source = Some(source);
                            self.state = CaptureState::Streaming;
                        }
                        Err(err) => {
                            tracing::error!(
                                source = %self.opener.describe(),
                                error = %err,
                                "source initialization failed; stopping capture"
                            );
                            self.state = CaptureState::Stopped;
                            return None;
                        }
                    }
                }
                CaptureState::Streaming => {
                    let source = self.source.as_mut()?;
                    match source.read_frame() {
                        Ok(mut frame) => {
                            frame.sequence = self.sequence;
                            self.sequence += 1;
                            return Some(frame);
                        }
                        Err(err) => {
                            tracing::warn!(
                                source = %self.opener.describe(),
                                error = %err,
                                backoff_ms = self.backoff.as_millis() as u64,
                                "frame read failed; reconnecting"
                            );
                            source.release();
                            self.source = None;
                            (self.sleeper)(self.backoff);
                            self.state = CaptureState::Reconnecting;
                        }
                    }
                }
            }
        }
    }

    /// User-requested quit: release the source and end the loop.
    pub fn stop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.release();
        }
        self.source = None;
        self.state = CaptureState::Stopped;
    }
}
