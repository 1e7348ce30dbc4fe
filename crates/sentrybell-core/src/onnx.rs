//! ONNX-backed face analyzer.
//!
//! Detection uses an UltraFace-style model (normalized corner boxes plus
//! per-anchor scores), encoding an ArcFace-style 512-dimensional
//! embedding model, both via ONNX Runtime on CPU.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::{FaceBox, IdentityVector};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const DETECT_INPUT_WIDTH: u32 = 320;
const DETECT_INPUT_HEIGHT: u32 = 240;
const DETECT_MEAN: f32 = 127.0;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DETECT_NMS_THRESHOLD: f32 = 0.4;

const ENCODE_INPUT_SIZE: u32 = 112;
const ENCODE_MEAN: f32 = 127.5;
const ENCODE_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;

pub struct OnnxAnalyzer {
    detector: Session,
    encoder: Session,
}

impl OnnxAnalyzer {
    /// Load both ONNX models from the given paths.
    pub fn load(detector_path: &str, encoder_path: &str) -> Result<Self, AnalyzerError> {
        for path in [detector_path, encoder_path] {
            if !Path::new(path).exists() {
                return Err(AnalyzerError::ModelNotFound(path.to_string()));
            }
        }

        let detector = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(detector_path)?;
        tracing::info!(path = detector_path, "face detection model loaded");

        let encoder = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(encoder_path)?;
        tracing::info!(path = encoder_path, "face encoding model loaded");

        Ok(Self { detector, encoder })
    }

    /// Resize and normalize an RGB image into a NCHW float tensor.
    fn to_tensor(image: &RgbImage, width: u32, height: u32, mean: f32, std: f32) -> Array4<f32> {
        let resized = image::imageops::resize(image, width, height, FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 - mean) / std;
            }
        }
        tensor
    }

    /// Crop a face box out of the image, clamped to image bounds.
    fn crop_face(image: &RgbImage, face: &FaceBox) -> RgbImage {
        let (w, h) = image.dimensions();
        let x0 = face.x.max(0.0) as u32;
        let y0 = face.y.max(0.0) as u32;
        let x1 = ((face.x + face.width).max(0.0) as u32).min(w);
        let y1 = ((face.y + face.height).max(0.0) as u32).min(h);
        let crop_w = x1.saturating_sub(x0).max(1);
        let crop_h = y1.saturating_sub(y0).max(1);
        image::imageops::crop_imm(image, x0.min(w - 1), y0.min(h - 1), crop_w, crop_h).to_image()
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn locate_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, AnalyzerError> {
        let input = Self::to_tensor(image, DETECT_INPUT_WIDTH, DETECT_INPUT_HEIGHT, DETECT_MEAN, DETECT_STD);

        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalyzerError::InferenceFailed(format!("detector scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| AnalyzerError::InferenceFailed(format!("detector boxes: {e}")))?;

        let (img_w, img_h) = image.dimensions();
        let anchors = scores.len() / 2;
        if boxes.len() < anchors * 4 {
            return Err(AnalyzerError::InferenceFailed(format!(
                "detector box tensor too short: {} boxes for {anchors} anchors",
                boxes.len() / 4
            )));
        }

        let mut detections = Vec::new();
        for i in 0..anchors {
            // Scores are [background, face] pairs per anchor.
            let confidence = scores[i * 2 + 1];
            if confidence < DETECT_CONFIDENCE_THRESHOLD {
                continue;
            }
            // Boxes are normalized corners [x1, y1, x2, y2].
            let x1 = boxes[i * 4] * img_w as f32;
            let y1 = boxes[i * 4 + 1] * img_h as f32;
            let x2 = boxes[i * 4 + 2] * img_w as f32;
            let y2 = boxes[i * 4 + 3] * img_h as f32;
            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            detections.push(FaceBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence,
            });
        }

        let mut kept = nms(detections, DETECT_NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        faces: &[FaceBox],
    ) -> Result<Vec<IdentityVector>, AnalyzerError> {
        let mut vectors = Vec::with_capacity(faces.len());

        for face in faces {
            let crop = Self::crop_face(image, face);
            let input = Self::to_tensor(&crop, ENCODE_INPUT_SIZE, ENCODE_INPUT_SIZE, ENCODE_MEAN, ENCODE_STD);

            let outputs = self
                .encoder
                .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
            let (_, raw) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| AnalyzerError::InferenceFailed(format!("embedding extraction: {e}")))?;

            if raw.len() != EMBEDDING_DIM {
                return Err(AnalyzerError::InferenceFailed(format!(
                    "expected {EMBEDDING_DIM}-dim embedding, got {}",
                    raw.len()
                )));
            }

            vectors.push(IdentityVector { values: l2_normalize(raw) });
        }

        Ok(vectors)
    }
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

/// Greedy non-maximum suppression on confidence-unsorted detections.
fn nms(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) < iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
