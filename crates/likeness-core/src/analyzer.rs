//! Face detection and embedding extraction via OpenCV.
//!
//! All vision work is a call into the library: YuNet (`FaceDetectorYN`) finds
//! faces, SFace (`FaceRecognizerSF`) aligns the crop and produces the
//! 128-dimensional embedding. Nothing here decodes model outputs by hand.

use crate::types::{Embedding, EMBEDDING_DIM};
use opencv::core::{Mat, Ptr, Size, Vector};
use opencv::imgcodecs;
use opencv::objdetect::{FaceDetectorYN, FaceRecognizerSF};
use opencv::prelude::*;
use std::path::Path;
use thiserror::Error;

/// Initial detector input size; reset per image before each detect call.
const DETECTOR_INPUT_SIZE: i32 = 320;
const DETECTOR_NMS_THRESHOLD: f32 = 0.3;
const DETECTOR_TOP_K: i32 = 5000;
/// A YuNet detection row is [x, y, w, h, 5×(lx, ly), score].
const DETECTION_SCORE_COL: i32 = 14;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("model file not found: {0} — download the YuNet/SFace ONNX models into the model directory")]
    ModelNotFound(String),
    #[error("image could not be decoded")]
    UndecodableImage,
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("expected {expected}-dim embedding, got {got}")]
    BadEmbedding { expected: usize, got: usize },
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Embedding extracted from the best face in one image.
#[derive(Debug, Clone)]
pub struct FaceSample {
    pub embedding: Embedding,
    /// Detection score of the chosen face [0, 1].
    pub confidence: f32,
    /// Total faces the detector reported for the image.
    pub faces_detected: usize,
}

/// YuNet + SFace analyzer. Holds the two OpenCV sessions.
pub struct FaceAnalyzer {
    detector: Ptr<FaceDetectorYN>,
    recognizer: Ptr<FaceRecognizerSF>,
}

impl FaceAnalyzer {
    /// Load both ONNX models. Fails fast if either file is missing.
    pub fn load(
        detector_model: &str,
        recognizer_model: &str,
        score_threshold: f32,
    ) -> Result<Self, AnalyzerError> {
        for path in [detector_model, recognizer_model] {
            if !Path::new(path).exists() {
                return Err(AnalyzerError::ModelNotFound(path.to_string()));
            }
        }

        let detector = FaceDetectorYN::create(
            detector_model,
            "",
            Size::new(DETECTOR_INPUT_SIZE, DETECTOR_INPUT_SIZE),
            score_threshold,
            DETECTOR_NMS_THRESHOLD,
            DETECTOR_TOP_K,
            0,
            0,
        )?;
        tracing::info!(path = detector_model, "YuNet detector loaded");

        let recognizer = FaceRecognizerSF::create(recognizer_model, "", 0, 0)?;
        tracing::info!(path = recognizer_model, "SFace recognizer loaded");

        Ok(Self {
            detector,
            recognizer,
        })
    }

    /// Decode an image, detect faces, and extract the embedding of the
    /// highest-scoring face.
    pub fn analyze(&mut self, image: &[u8]) -> Result<FaceSample, AnalyzerError> {
        let buf = Vector::<u8>::from_slice(image);
        let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            return Err(AnalyzerError::UndecodableImage);
        }

        self.detector.set_input_size(img.size()?)?;

        let mut faces = Mat::default();
        self.detector.detect(&img, &mut faces)?;

        let face_count = faces.rows();
        if face_count == 0 {
            return Err(AnalyzerError::NoFaceDetected);
        }

        // The detector does not promise any row ordering; pick the best score.
        let mut best_row = 0;
        let mut best_score = f32::NEG_INFINITY;
        for row in 0..face_count {
            let score = *faces.at_2d::<f32>(row, DETECTION_SCORE_COL)?;
            if score > best_score {
                best_score = score;
                best_row = row;
            }
        }

        if face_count > 1 {
            tracing::debug!(
                faces = face_count,
                score = best_score,
                "multiple faces detected, using highest-scoring one"
            );
        }

        let mut aligned = Mat::default();
        self.recognizer
            .align_crop(&img, &faces.row(best_row)?, &mut aligned)?;

        let mut feature = Mat::default();
        self.recognizer.feature(&aligned, &mut feature)?;

        // The feature Mat is reused by OpenCV across calls; copy out now.
        let raw: Vec<f32> = feature.data_typed::<f32>()?.to_vec();
        if raw.len() != EMBEDDING_DIM {
            return Err(AnalyzerError::BadEmbedding {
                expected: EMBEDDING_DIM,
                got: raw.len(),
            });
        }

        Ok(FaceSample {
            embedding: Embedding::new(l2_normalize(raw)),
            confidence: best_score,
            faces_detected: face_count as usize,
        })
    }
}

/// L2-normalize an embedding so cosine similarity reduces to a dot product.
/// A zero vector is returned unchanged.
fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reports_missing_model() {
        let err = FaceAnalyzer::load("/nonexistent/yunet.onnx", "/nonexistent/sface.onnx", 0.9)
            .err()
            .expect("load should fail for missing files");
        assert!(matches!(err, AnalyzerError::ModelNotFound(_)));
    }

    #[test]
    fn l2_normalize_unit_norm() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector_unchanged() {
        let normalized = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }
}
