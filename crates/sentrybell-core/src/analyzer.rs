//! Pluggable face detection/encoding capability.
//!
//! The pipeline treats pixel-level face work as a black box: an image
//! in, zero or more boxes and identity vectors out. Implementations may
//! be stateful (ONNX sessions), hence `&mut self`.

use crate::types::{DetectionCandidate, FaceBox, IdentityVector};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face detection and encoding, delegated to an external capability.
///
/// Boxes are in the coordinate space of the image passed in; callers
/// scale them back to source resolution themselves.
pub trait FaceAnalyzer: Send {
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError>;

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        faces: &[FaceBox],
    ) -> Result<Vec<IdentityVector>, AnalyzerError>;
}

/// Locate and encode every face in one image, pairing each box with its
/// vector.
pub fn candidates_in(
    analyzer: &mut dyn FaceAnalyzer,
    image: &RgbImage,
) -> Result<Vec<DetectionCandidate>, AnalyzerError> {
    let faces = analyzer.locate_faces(image)?;
    if faces.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = analyzer.encode_faces(image, &faces)?;
    Ok(faces
        .into_iter()
        .zip(vectors)
        .map(|(face, vector)| DetectionCandidate { vector, face })
        .collect())
}
