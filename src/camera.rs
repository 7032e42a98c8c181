// Camera module for webcam preview and still capture

use crate::config::CameraConfig;
use crate::error::{Result, VibeBeatsError};
use crate::models::{Frame, StillImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{error, info};

/// Anything that can hand out the current camera frame as a still image
pub trait FrameSource {
    /// Grabs the most recent frame
    fn current_frame(&mut self) -> Result<Frame>;

    /// Grabs the most recent frame and encodes it as a square JPEG of `size` pixels
    fn capture_still(&mut self, size: u32) -> Result<StillImage> {
        let frame = self.current_frame()?;
        StillImage::from_frame(&frame, size)
    }
}

/// Owns the webcam for the lifetime of the app
pub struct CameraManager {
    camera: Camera,
    is_streaming: bool,
}

impl CameraManager {
    /// Opens the configured camera, falling back to the next index
    pub fn new(config: &CameraConfig) -> Result<Self> {
        // Request 640x480 at 30 FPS
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            nokhwa::utils::CameraFormat::new(
                nokhwa::utils::Resolution::new(640, 480),
                nokhwa::utils::FrameFormat::YUYV,
                30,
            ),
        ));

        // Some systems expose the user-facing camera at the next index
        let camera = Self::try_open_camera(config.index, requested_format)
            .or_else(|_| Self::try_open_camera(config.index + 1, requested_format))
            .map_err(|e| {
                error!("Failed to initialize camera: {}", e);
                VibeBeatsError::CameraInit(format!(
                    "Could not open camera. Make sure:\n\
                    1. A camera is connected\n\
                    2. No other app is using it\n\
                    3. Camera permissions are granted\n\
                    Error: {e}"
                ))
            })?;

        info!("Opened camera: {}", camera.info().human_name());

        Ok(Self {
            camera,
            is_streaming: false,
        })
    }

    /// Helper to try opening a camera at a specific index
    fn try_open_camera(index: u32, requested_format: RequestedFormat) -> Result<Camera> {
        Camera::new(CameraIndex::Index(index), requested_format)
            .map_err(|e| VibeBeatsError::CameraInit(e.to_string()))
    }

    /// Opens the camera stream if not already open and checks a frame arrives
    pub fn ensure_stream_open(&mut self) -> Result<()> {
        if !self.is_streaming {
            self.camera.open_stream()?;
            self.is_streaming = true;

            // Wait a moment for the camera to initialize
            std::thread::sleep(std::time::Duration::from_millis(200));
        }

        match self.camera.frame() {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Camera stream not working: {}", e);
                Err(VibeBeatsError::CameraInit(format!(
                    "Camera stream not working: {e}. Make sure camera permissions are granted."
                )))
            }
        }
    }

    /// Stops the camera stream
    pub fn stop_stream(&mut self) {
        if !self.is_streaming {
            return;
        }

        self.is_streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            error!("Error stopping camera stream: {}", e);
        }
    }
}

impl FrameSource for CameraManager {
    /// Gets the most recent frame (blocking). The stream must already be open.
    fn current_frame(&mut self) -> Result<Frame> {
        let frame_data = self.camera.frame().map_err(|e| {
            VibeBeatsError::FrameProcessing(format!("Failed to capture frame: {e}"))
        })?;

        let buffer = frame_data.decode_image::<RgbFormat>().map_err(|e| {
            VibeBeatsError::FrameProcessing(format!("Failed to decode frame: {e}"))
        })?;

        let (width, height) = (buffer.width(), buffer.height());
        Ok(Frame::new(buffer.into_raw(), width, height))
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct GradientSource;

    impl FrameSource for GradientSource {
        fn current_frame(&mut self) -> Result<Frame> {
            let (width, height) = (80u32, 60u32);
            let data = (0..width * height)
                .flat_map(|i| {
                    let v = (i % 256) as u8;
                    [v, v / 2, 255 - v]
                })
                .collect();
            Ok(Frame::new(data, width, height))
        }
    }

    #[test]
    fn capture_still_uses_display_size() {
        let still = GradientSource.capture_still(260).unwrap();
        assert_eq!((still.width, still.height), (260, 260));
        assert!(!still.jpeg.is_empty());
    }
}
