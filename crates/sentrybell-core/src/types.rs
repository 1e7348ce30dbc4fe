use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in the coordinate space of the
/// image handed to the detector (usually the downscaled frame).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    /// Map a box detected on a downscaled image back to source
    /// resolution (factor 4.0 for the default 0.25 downscale).
    pub fn scaled(&self, factor: f32) -> FaceBox {
        FaceBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
        }
    }
}

/// Fixed-length face embedding produced by the recognition capability.
/// Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityVector {
    pub values: Vec<f32>,
}

impl IdentityVector {
    /// Euclidean distance between two vectors. Lower = more similar,
    /// matching the compare semantics of the recognition capability.
    pub fn distance(&self, other: &IdentityVector) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found in a frame: where it is and what it encodes to.
/// Produced per frame, consumed within the same frame cycle.
#[derive(Debug, Clone)]
pub struct DetectionCandidate {
    pub vector: IdentityVector,
    pub face: FaceBox,
}

/// Canonical lookup key for a visitor, distinct from the display name.
///
/// Case-folded, punctuation and digits stripped, whitespace collapsed.
/// Two raw names that normalize identically share one cooldown timeline
/// and one priority lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitorKey(String);

impl VisitorKey {
    pub fn normalize(raw: &str) -> VisitorKey {
        let folded = raw.to_lowercase();
        let mut key = String::with_capacity(folded.len());
        let mut pending_space = false;
        for ch in folded.chars() {
            if ch.is_alphabetic() {
                if pending_space && !key.is_empty() {
                    key.push(' ');
                }
                pending_space = false;
                key.push(ch);
            } else if ch.is_whitespace() {
                pending_space = true;
            }
            // punctuation and digits are dropped outright
        }
        VisitorKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
