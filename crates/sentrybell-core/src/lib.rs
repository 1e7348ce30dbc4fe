//! sentrybell-core — visitor-recognition pipeline logic.
//!
//! Identity matching against a gallery snapshot, per-identity cooldown
//! gating, exclusive priority escalation, and the pluggable face
//! detection/encoding capability (ONNX-backed by default).

pub mod analyzer;
pub mod debounce;
pub mod gallery;
pub mod matcher;
pub mod onnx;
pub mod priority;
pub mod types;

pub use analyzer::{candidates_in, AnalyzerError, FaceAnalyzer};
pub use debounce::CooldownLedger;
pub use gallery::{GalleryEntry, GallerySnapshot};
pub use matcher::{match_candidates, MatchOutcome};
pub use onnx::OnnxAnalyzer;
pub use priority::{FlagWrite, PriorityMachine, PriorityTier};
pub use types::{DetectionCandidate, FaceBox, IdentityVector, VisitorKey};
