//! Network camera sources: MJPEG stream with single-JPEG snapshot
//! fallback.
//!
//! The stream endpoint is preferred; when it cannot be opened, the
//! opener falls back to polling the snapshot endpoint once per frame.
//! Both paths are bounded by client timeouts so a wedged camera never
//! blocks the pipeline indefinitely.

use crate::capture::{SourceError, SourceOpener, VideoSource};
use crate::frame::{FrameError, VideoFrame};
use std::io::Read;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Refuse to buffer more than this much stream data without finding a
/// complete JPEG.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

fn blocking_client() -> Result<reqwest::blocking::Client, SourceError> {
    reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| SourceError::OpenFailed("http client".into(), e.to_string()))
}

fn stream_client() -> Result<reqwest::blocking::Client, SourceError> {
    // The MJPEG response body is endless by design; the blocking
    // client's `timeout` re-arms per read on the streaming `Read` path,
    // so individual reads are bounded and a camera that goes silent
    // mid-stream surfaces as a read error and reconnects.
    reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()
        .map_err(|e| SourceError::OpenFailed("http client".into(), e.to_string()))
}

/// Incremental scanner that pulls complete JPEG images out of a byte
/// stream by SOI/EOI markers, ignoring multipart boundaries in between.
pub struct JpegScanner {
    buf: Vec<u8>,
}

impl JpegScanner {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed bytes and try to extract the next complete JPEG.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Option<Vec<u8>>, FrameError> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > MAX_FRAME_BYTES {
            self.buf.clear();
            return Err(FrameError::Decode("no JPEG marker within buffer limit".into()));
        }

        let Some(start) = find(&self.buf, &JPEG_SOI) else {
            // Nothing useful yet; drop boundary chatter but keep a
            // trailing 0xFF in case the SOI marker is split mid-feed.
            let keep_from = if self.buf.last() == Some(&0xFF) { self.buf.len() - 1 } else { self.buf.len() };
            self.buf.drain(..keep_from);
            return Ok(None);
        };
        let Some(end) = find(&self.buf[start..], &JPEG_EOI).map(|i| start + i + 2) else {
            // Keep the partial image, discard what precedes it.
            self.buf.drain(..start);
            return Ok(None);
        };

        let jpeg = self.buf[start..end].to_vec();
        self.buf.drain(..end);
        Ok(Some(jpeg))
    }
}

impl Default for JpegScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

/// A long-lived MJPEG stream connection.
pub struct MjpegStream {
    url: String,
    response: reqwest::blocking::Response,
    scanner: JpegScanner,
}

impl MjpegStream {
    pub fn open(url: &str) -> Result<Self, SourceError> {
        let response = stream_client()?
            .get(url)
            .send()
            .map_err(|e| SourceError::OpenFailed(url.to_string(), e.to_string()))?;
        if !response.status().is_success() {
            return Err(SourceError::OpenFailed(
                url.to_string(),
                format!("HTTP {}", response.status()),
            ));
        }
        Ok(Self {
            url: url.to_string(),
            response,
            scanner: JpegScanner::new(),
        })
    }
}

impl VideoSource for MjpegStream {
    fn read_frame(&mut self) -> Result<VideoFrame, SourceError> {
        let mut chunk = [0u8; 16 * 1024];
        loop {
            let n = self
                .response
                .read(&mut chunk)
                .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.url)))?;
            if n == 0 {
                return Err(SourceError::ReadFailed(format!("{}: stream ended", self.url)));
            }
            if let Some(jpeg) = self.scanner.feed(&chunk[..n])? {
                let image = image::load_from_memory(&jpeg)
                    .map_err(|e| FrameError::Decode(e.to_string()))?
                    .to_rgb8();
                return Ok(VideoFrame { image, sequence: 0 });
            }
        }
    }
}

/// Snapshot polling: one HTTP GET per frame against a still-JPEG
/// endpoint (the ESP32-CAM `cam-hi.jpg` style).
pub struct SnapshotPoller {
    url: String,
    client: reqwest::blocking::Client,
}

impl SnapshotPoller {
    pub fn open(url: &str) -> Result<Self, SourceError> {
        Ok(Self { url: url.to_string(), client: blocking_client()? })
    }
}

impl VideoSource for SnapshotPoller {
    fn read_frame(&mut self) -> Result<VideoFrame, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.url)))?;
        if !response.status().is_success() {
            return Err(SourceError::ReadFailed(format!(
                "{}: HTTP {}",
                self.url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.url)))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .to_rgb8();
        Ok(VideoFrame { image, sequence: 0 })
    }
}

/// Opener for a network camera: MJPEG stream first, snapshot fallback.
pub struct NetworkOpener {
    pub stream_url: String,
    pub snapshot_url: String,
}

impl SourceOpener for NetworkOpener {
    fn open(&mut self) -> Result<Box<dyn VideoSource>, SourceError> {
        match MjpegStream::open(&self.stream_url) {
            Ok(stream) => Ok(Box::new(stream)),
            Err(err) => {
                tracing::warn!(
                    stream = %self.stream_url,
                    snapshot = %self.snapshot_url,
                    error = %err,
                    "stream open failed; falling back to snapshot polling"
                );
                // Snapshot open failure is fatal: no further fallback.
                let mut poller = SnapshotPoller::open(&self.snapshot_url)?;
                // Probe once so a dead endpoint fails initialization
                // instead of the first streaming read.
                poller.read_frame().map_err(|e| {
                    SourceError::OpenFailed(self.snapshot_url.clone(), e.to_string())
                })?;
                Ok(Box::new(poller))
            }
        }
    }

    fn describe(&self) -> String {
        self.stream_url.clone()
    }
}
