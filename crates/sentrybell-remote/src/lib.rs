//! sentrybell-remote — HTTP collaborators for the doorbell pipeline.
//!
//! Object storage (gallery source images) and the realtime key/value
//! backend (visitor directory, priority flags, attendance, signals).
//! All calls are timeout-bounded; callers treat errors as "no change"
//! or "skip this write", never as fatal.

pub mod realtime;
pub mod storage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} while trying to {context}")]
    Status { status: u16, context: String },
    #[error("decode failed: {0}")]
    Decode(String),
}

pub use realtime::{AttendanceEvent, HttpRealtimeDb, PriorityFlags, RealtimeDb, VisitorProfile};
pub use storage::{HttpObjectStore, ObjectInfo, ObjectStore};
