// Error types for VibeBeats

use thiserror::Error;

/// Main error type for VibeBeats
#[derive(Debug, Error)]
pub enum VibeBeatsError {
    #[error("Camera initialization failed: {0}")]
    CameraInit(String),

    #[error("Frame processing failed: {0}")]
    FrameProcessing(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    FaceDetection(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(String),

    #[error("OpenCV error: {0}")]
    OpenCV(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Worker unavailable: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for VibeBeats operations
pub type Result<T> = std::result::Result<T, VibeBeatsError>;

// Conversion from nokhwa errors
impl From<nokhwa::NokhwaError> for VibeBeatsError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                VibeBeatsError::CameraInit(format!("Device {device}: {error}"))
            }
            nokhwa::NokhwaError::ReadFrameError(error) => {
                VibeBeatsError::FrameProcessing(format!("Read frame: {error}"))
            }
            nokhwa::NokhwaError::ProcessFrameError { src, destination, error } => {
                VibeBeatsError::FrameProcessing(format!("{src} -> {destination}: {error}"))
            }
            _ => VibeBeatsError::CameraInit(err.to_string()),
        }
    }
}

// Conversion from OpenCV errors
impl From<opencv::Error> for VibeBeatsError {
    fn from(err: opencv::Error) -> Self {
        VibeBeatsError::OpenCV(err.to_string())
    }
}

// Conversion from ONNX Runtime errors
impl From<ort::Error> for VibeBeatsError {
    fn from(err: ort::Error) -> Self {
        VibeBeatsError::OnnxRuntime(err.to_string())
    }
}

impl From<rodio::StreamError> for VibeBeatsError {
    fn from(err: rodio::StreamError) -> Self {
        VibeBeatsError::Playback(format!("Audio output: {err}"))
    }
}

impl From<rodio::PlayError> for VibeBeatsError {
    fn from(err: rodio::PlayError) -> Self {
        VibeBeatsError::Playback(err.to_string())
    }
}

impl From<rodio::decoder::DecoderError> for VibeBeatsError {
    fn from(err: rodio::decoder::DecoderError) -> Self {
        VibeBeatsError::Playback(format!("Decode: {err}"))
    }
}
