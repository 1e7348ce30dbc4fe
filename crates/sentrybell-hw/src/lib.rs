//! sentrybell-hw — video acquisition for the doorbell pipeline.
//!
//! Local V4L2 devices and network MJPEG/snapshot cameras behind one
//! `VideoSource` trait, plus the reconnecting capture loop.

pub mod capture;
pub mod frame;
pub mod local;
pub mod network;

pub use capture::{CaptureLoop, CaptureState, SourceError, SourceOpener, VideoSource};
pub use frame::VideoFrame;
pub use local::LocalOpener;
pub use network::NetworkOpener;
