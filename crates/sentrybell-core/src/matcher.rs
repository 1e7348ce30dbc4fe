//! Nearest-entry identity matching against a gallery snapshot.
//!
//! Pure and deterministic: identical inputs yield identical outputs,
//! including the tie-break by first gallery position.

use crate::gallery::GallerySnapshot;
use crate::types::{DetectionCandidate, FaceBox};

/// Default acceptance threshold, matching the compare semantics of the
/// recognition capability (Euclidean distance on its embeddings).
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Match decision for one detection candidate.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Display name of the accepted gallery entry, or `None` when no
    /// entry is within the threshold (or the gallery is empty).
    pub name: Option<String>,
    /// Best distance seen, for logging. Meaningless when the gallery
    /// is empty.
    pub distance: f32,
    pub face: FaceBox,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        self.name.is_some()
    }
}

/// Match each candidate against the gallery: minimum distance wins,
/// accepted only if within `threshold`; equal distances resolve to the
/// earlier gallery entry (strict `<` scan).
pub fn match_candidates(
    candidates: &[DetectionCandidate],
    gallery: &GallerySnapshot,
    threshold: f32,
) -> Vec<MatchOutcome> {
    candidates
        .iter()
        .map(|candidate| match_one(candidate, gallery, threshold))
        .collect()
}

fn match_one(
    candidate: &DetectionCandidate,
    gallery: &GallerySnapshot,
    threshold: f32,
) -> MatchOutcome {
    let mut best_distance = f32::INFINITY;
    let mut best_idx: Option<usize> = None;

    for (i, entry) in gallery.entries.iter().enumerate() {
        let distance = candidate.vector.distance(&entry.vector);
        if distance < best_distance {
            best_distance = distance;
            best_idx = Some(i);
        }
    }

    let name = match best_idx {
        Some(idx) if best_distance <= threshold => Some(gallery.entries[idx].name.clone()),
        _ => None,
    };

    MatchOutcome {
        name,
        distance: if best_distance.is_finite() { best_distance } else { 0.0 },
        face: candidate.face,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::GalleryBuilder;
    use crate::types::IdentityVector;
    use chrono::Utc;

    fn candidate(values: Vec<f32>) -> DetectionCandidate {
        DetectionCandidate {
            vector: IdentityVector { values },
            face: FaceBox { x: 1.0, y: 2.0, width: 3.0, height: 4.0, confidence: 0.9 },
        }
    }

    fn gallery(entries: &[(&str, Vec<f32>)]) -> GallerySnapshot {
        let mut b = GalleryBuilder::new();
        for (name, values) in entries {
            b.push(name, IdentityVector { values: values.clone() });
        }
        b.build(Utc::now())
    }

    #[test]
    fn test_empty_gallery_never_matches() {
        let g = gallery(&[]);
        let out = match_candidates(&[candidate(vec![1.0, 0.0])], &g, 0.6);
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_match());
    }

    #[test]
    fn test_nearest_within_threshold_matches() {
        let g = gallery(&[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])]);
        let out = match_candidates(&[candidate(vec![0.9, 0.0])], &g, 0.6);
        assert_eq!(out[0].name.as_deref(), Some("alice"));
        assert!((out[0].distance - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_beyond_threshold_rejected() {
        let g = gallery(&[("alice", vec![1.0, 0.0])]);
        let out = match_candidates(&[candidate(vec![3.0, 0.0])], &g, 0.6);
        assert!(!out[0].is_match());
        assert!((out[0].distance - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_tie_breaks_to_first_entry() {
        // Both entries are equidistant from the probe.
        let g = gallery(&[("first", vec![1.0, 0.0]), ("second", vec![-1.0, 0.0])]);
        let out = match_candidates(&[candidate(vec![0.0, 0.0])], &g, 2.0);
        assert_eq!(out[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_deterministic_across_calls() {
        let g = gallery(&[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])]);
        let c = [candidate(vec![0.6, 0.6])];
        let a = match_candidates(&c, &g, 1.5);
        let b = match_candidates(&c, &g, 1.5);
        assert_eq!(a[0].name, b[0].name);
        assert_eq!(a[0].distance, b[0].distance);
    }

    #[test]
    fn test_one_outcome_per_candidate() {
        let g = gallery(&[("alice", vec![1.0, 0.0])]);
        let cs = [candidate(vec![1.0, 0.0]), candidate(vec![5.0, 5.0])];
        let out = match_candidates(&cs, &g, 0.6);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_match());
        assert!(!out[1].is_match());
    }
}
