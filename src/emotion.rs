// Face detection and expression classification

use crate::config::{ComputeBackend, ModelConfig};
use crate::error::{Result, VibeBeatsError};
use crate::models::{ExpressionLabel, ExpressionScores, Frame, StillImage};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Input edge length of the expression network
const MODEL_INPUT_SIZE: usize = 260;

/// Turns a still image into expression scores for at most one face
pub trait ExpressionDetector {
    /// Returns `Ok(None)` when no face is found
    fn detect(&mut self, image: &StillImage) -> Result<Option<ExpressionScores>>;
}

/// Face detector using an OpenCV Haar cascade
pub struct FaceDetector {
    classifier: CascadeClassifier,
}

impl FaceDetector {
    /// Loads the Haar cascade classifier
    pub fn new(cascade_path: &Path) -> Result<Self> {
        let path = cascade_path.to_string_lossy();
        let classifier = CascadeClassifier::new(&path).map_err(|e| {
            error!("Failed to load Haar Cascade: {}", e);
            VibeBeatsError::ModelLoad(format!("Haar Cascade load failed: {e}"))
        })?;

        if classifier.empty()? {
            return Err(VibeBeatsError::ModelLoad(format!(
                "Haar Cascade classifier is empty: {path}"
            )));
        }

        Ok(Self { classifier })
    }

    /// Finds the largest face and returns its grayscale pixels and height
    pub fn detect_largest_face(&mut self, frame: &Frame) -> Result<Option<(Vec<u8>, u32)>> {
        let mat = Mat::from_slice(&frame.data).map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to create Mat: {e}"))
        })?;

        let mat = mat.reshape(3, frame.height as i32).map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to reshape Mat: {e}"))
        })?;

        let mut gray = Mat::default();
        imgproc::cvt_color_def(&mat, &mut gray, imgproc::COLOR_RGB2GRAY).map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to convert to grayscale: {e}"))
        })?;

        let mut faces = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(
                &gray,
                &mut faces,
                1.1,               // scale factor
                5,                 // min neighbors
                0,                 // flags
                Size::new(40, 40), // min size
                Size::new(0, 0),   // no max size
            )
            .map_err(|e| VibeBeatsError::FaceDetection(format!("Face detection failed: {e}")))?;

        debug!("Cascade found {} face(s)", faces.len());

        let Some(largest) = faces.iter().max_by_key(|r| r.width * r.height) else {
            return Ok(None);
        };

        self.extract_face_region(&gray, largest).map(Some)
    }

    /// Crops a face region out of the grayscale image
    fn extract_face_region(&self, gray: &Mat, rect: Rect) -> Result<(Vec<u8>, u32)> {
        let face_roi = Mat::roi(gray, rect).map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to crop face region: {e}"))
        })?;

        // ROI views are not continuous in memory
        let face_continuous = face_roi.try_clone().map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to clone face ROI: {e}"))
        })?;

        let face_data = face_continuous.data_bytes().map_err(|e| {
            VibeBeatsError::FaceDetection(format!("Failed to get face data: {e}"))
        })?;

        Ok((face_data.to_vec(), rect.height as u32))
    }
}

/// Scales a grayscale face crop to the network input and returns it as
/// normalized RGB floats in HWC order
fn preprocess_face(face_data: &[u8], face_height: u32) -> Result<Vec<f32>> {
    let face_mat = Mat::from_slice(face_data).map_err(|e| {
        VibeBeatsError::FrameProcessing(format!("Failed to create face Mat: {e}"))
    })?;

    let face_mat = face_mat.reshape(1, face_height as i32).map_err(|e| {
        VibeBeatsError::FrameProcessing(format!("Failed to reshape face Mat: {e}"))
    })?;

    let mut rgb_mat = Mat::default();
    imgproc::cvt_color_def(&face_mat, &mut rgb_mat, imgproc::COLOR_GRAY2RGB).map_err(|e| {
        VibeBeatsError::FrameProcessing(format!("Failed to convert to RGB: {e}"))
    })?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb_mat,
        &mut resized,
        Size::new(MODEL_INPUT_SIZE as i32, MODEL_INPUT_SIZE as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(|e| VibeBeatsError::FrameProcessing(format!("Failed to resize face: {e}")))?;

    let data = resized.data_bytes().map_err(|e| {
        VibeBeatsError::FrameProcessing(format!("Failed to get resized data: {e}"))
    })?;

    Ok(data.iter().map(|&pixel| pixel as f32 / 255.0).collect())
}

/// Reorders an interleaved HWC buffer into planar CHW
fn hwc_to_chw(hwc: &[f32], height: usize, width: usize, channels: usize) -> Vec<f32> {
    let mut chw = vec![0.0f32; channels * height * width];
    for h in 0..height {
        for w in 0..width {
            for c in 0..channels {
                chw[c * height * width + h * width + w] = hwc[(h * width + w) * channels + c];
            }
        }
    }
    chw
}

/// Numerically stable softmax
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|x| x / sum).collect()
}

/// Folds HSEmotion class probabilities into the label set.
/// Model order: 0=Angry, 1=Disgust, 2=Fear, 3=Happy, 4=Sad, 5=Surprise, 6=Neutral, 7=Contempt
fn scores_from_probabilities(probabilities: &[f32]) -> ExpressionScores {
    let mut scores = ExpressionScores::default();
    for (index, &p) in probabilities.iter().enumerate() {
        let label = match index {
            0 => ExpressionLabel::Angry,
            1 => ExpressionLabel::Disgusted,
            2 => ExpressionLabel::Fearful,
            3 => ExpressionLabel::Happy,
            4 => ExpressionLabel::Sad,
            5 => ExpressionLabel::Surprised,
            6 => ExpressionLabel::Neutral,
            7 => ExpressionLabel::Disgusted, // contempt
            _ => {
                warn!("Unexpected expression index {}, ignoring", index);
                continue;
            }
        };
        scores.add(label, p);
    }
    scores
}

/// Expression classifier running on ONNX Runtime
pub struct ExpressionClassifier {
    session: Session,
}

impl ExpressionClassifier {
    /// Builds a session on the requested backend and loads the ONNX model
    pub fn new(model_path: &Path, backend: ComputeBackend) -> Result<Self> {
        let builder = Session::builder().map_err(|e| {
            VibeBeatsError::ModelLoad(format!("Failed to create session builder: {e}"))
        })?;

        let builder = match backend {
            ComputeBackend::Cpu => builder
                .with_execution_providers([CPUExecutionProvider::default().build()])
                .map_err(|e| {
                    VibeBeatsError::ModelLoad(format!("Failed to select CPU backend: {e}"))
                })?,
            // Unavailable providers are skipped by ort, leaving the CPU default
            ComputeBackend::Cuda => {
                if !cfg!(feature = "cuda") {
                    warn!("Built without CUDA support, inference falls back to CPU");
                }
                builder
                    .with_execution_providers([
                        CUDAExecutionProvider::default().build(),
                        CPUExecutionProvider::default().build(),
                    ])
                    .map_err(|e| {
                        VibeBeatsError::ModelLoad(format!("Failed to select CUDA backend: {e}"))
                    })?
            }
        };

        let session = builder.commit_from_file(model_path).map_err(|e| {
            error!("Failed to load ONNX model: {}", e);
            VibeBeatsError::ModelLoad(format!("ONNX model load failed: {e}"))
        })?;

        Ok(Self { session })
    }

    /// Classifies a preprocessed face into expression scores
    pub fn classify(&mut self, preprocessed_face: &[f32]) -> Result<ExpressionScores> {
        let chw = hwc_to_chw(preprocessed_face, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, 3);

        let input_array =
            ndarray::Array4::from_shape_vec((1, 3, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE), chw)
                .map_err(|e| {
                    VibeBeatsError::OnnxRuntime(format!("Failed to create input array: {e}"))
                })?;

        let input_tensor = Tensor::from_array(input_array).map_err(|e| {
            VibeBeatsError::OnnxRuntime(format!("Failed to create input tensor: {e}"))
        })?;

        let outputs = self.session.run(ort::inputs![input_tensor]).map_err(|e| {
            error!("ONNX inference failed: {}", e);
            VibeBeatsError::OnnxRuntime(format!("Inference failed: {e}"))
        })?;

        let (_, output_value) = outputs
            .iter()
            .next()
            .ok_or_else(|| VibeBeatsError::OnnxRuntime("No output from model".to_string()))?;

        let (_shape, logits) = output_value.try_extract_tensor::<f32>().map_err(|e| {
            VibeBeatsError::OnnxRuntime(format!("Failed to extract output tensor: {e}"))
        })?;

        if logits.is_empty() {
            return Err(VibeBeatsError::OnnxRuntime(
                "No probabilities in output".to_string(),
            ));
        }

        Ok(scores_from_probabilities(&softmax(logits)))
    }
}

/// The loaded models. Built once at startup and owned by the inference worker.
pub struct InferenceContext {
    face_detector: FaceDetector,
    classifier: ExpressionClassifier,
}

impl InferenceContext {
    /// Loads both model bundles on the configured backend
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let cascade_path = config.face_detector_path();
        let model_path = config.face_expression_path();

        for path in [&cascade_path, &model_path] {
            if !path.exists() {
                return Err(VibeBeatsError::ModelLoad(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let face_detector = FaceDetector::new(&cascade_path)?;
        let classifier = ExpressionClassifier::new(&model_path, config.backend)?;

        info!(
            "Loaded models from {} ({:?} backend)",
            config.models_dir.display(),
            config.backend
        );

        Ok(Self {
            face_detector,
            classifier,
        })
    }
}

impl ExpressionDetector for InferenceContext {
    fn detect(&mut self, image: &StillImage) -> Result<Option<ExpressionScores>> {
        let frame = image.decode()?;

        let Some((face_data, face_height)) = self.face_detector.detect_largest_face(&frame)? else {
            return Ok(None);
        };

        let preprocessed = preprocess_face(&face_data, face_height)?;
        let scores = self.classifier.classify(&preprocessed)?;
        debug!("Expression scores: {:?}", scores);

        Ok(Some(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn softmax_is_normalized_and_ordered() {
        let p = softmax(&[1.0, 3.0, 2.0]);
        let sum: f32 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(p[1] > p[2] && p[2] > p[0]);
    }

    #[test]
    fn contempt_folds_into_disgusted() {
        let scores =
            scores_from_probabilities(&[0.05, 0.1, 0.05, 0.2, 0.05, 0.05, 0.25, 0.25]);
        assert!((scores.get(ExpressionLabel::Disgusted) - 0.35).abs() < 1e-6);
        assert_eq!(scores.dominant(), ExpressionLabel::Disgusted);
        assert!((scores.get(ExpressionLabel::Happy) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn seven_class_output_covers_every_label_but_contempt() {
        let scores = scores_from_probabilities(&[0.0, 0.0, 0.0, 0.9, 0.05, 0.0, 0.05]);
        assert_eq!(scores.dominant(), ExpressionLabel::Happy);
        assert!((scores.get(ExpressionLabel::Neutral) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn hwc_to_chw_moves_channels_to_planes() {
        // 1x2 image, RGB
        let hwc = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(hwc_to_chw(&hwc, 1, 2, 3), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn missing_models_fail_to_load() {
        let config = ModelConfig {
            models_dir: PathBuf::from("/nonexistent/vibebeats-models"),
            backend: ComputeBackend::Cpu,
        };
        match InferenceContext::load(&config) {
            Err(VibeBeatsError::ModelLoad(msg)) => assert!(msg.contains("not found")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("models should not load"),
        }
    }
}
