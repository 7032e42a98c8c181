// Core data models for VibeBeats

use crate::error::{Result, VibeBeatsError};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbImage};

/// Represents a single video frame with RGB data
#[derive(Clone, Debug)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

const JPEG_QUALITY: u8 = 92;

/// A captured frame encoded as JPEG, the unit handed to the expression detector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StillImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl StillImage {
    /// Center-crops the frame to a square, scales it to `size` and encodes it as JPEG
    pub fn from_frame(frame: &Frame, size: u32) -> Result<Self> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(
            || {
                VibeBeatsError::FrameProcessing(format!(
                    "frame buffer does not match {}x{}",
                    frame.width, frame.height
                ))
            },
        )?;

        let side = frame.width.min(frame.height);
        let x = (frame.width - side) / 2;
        let y = (frame.height - side) / 2;
        let square = imageops::crop_imm(&rgb, x, y, side, side).to_image();
        let scaled = imageops::resize(&square, size, size, imageops::FilterType::Triangle);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(&scaled)?;

        Ok(Self {
            jpeg,
            width: size,
            height: size,
        })
    }

    /// Decodes the JPEG back into an RGB frame
    pub fn decode(&self) -> Result<Frame> {
        let rgb = image::load_from_memory(&self.jpeg)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Frame::new(rgb.into_raw(), width, height))
    }
}

/// Decoded RGBA pixels ready for display
#[derive(Clone, Debug)]
pub struct ImageData {
    /// RGBA pixel data
    pub rgba: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Creates ImageData from a DynamicImage
    pub fn from_dynamic_image(img: DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            rgba: rgba.into_raw(),
            width,
            height,
        }
    }

    /// Decodes an encoded image (JPEG, PNG, ...) held in memory
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_dynamic_image(image::load_from_memory(bytes)?))
    }
}

/// The fixed set of facial expressions the classifier distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpressionLabel {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl ExpressionLabel {
    pub const COUNT: usize = 7;

    /// All labels in enumeration order. Equal scores resolve to the earlier label.
    pub const ALL: [ExpressionLabel; Self::COUNT] = [
        ExpressionLabel::Neutral,
        ExpressionLabel::Happy,
        ExpressionLabel::Sad,
        ExpressionLabel::Angry,
        ExpressionLabel::Fearful,
        ExpressionLabel::Disgusted,
        ExpressionLabel::Surprised,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Lowercase token used in search queries
    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionLabel::Neutral => "neutral",
            ExpressionLabel::Happy => "happy",
            ExpressionLabel::Sad => "sad",
            ExpressionLabel::Angry => "angry",
            ExpressionLabel::Fearful => "fearful",
            ExpressionLabel::Disgusted => "disgusted",
            ExpressionLabel::Surprised => "surprised",
        }
    }
}

impl std::fmt::Display for ExpressionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionLabel::Neutral => write!(f, "Neutral"),
            ExpressionLabel::Happy => write!(f, "Happy"),
            ExpressionLabel::Sad => write!(f, "Sad"),
            ExpressionLabel::Angry => write!(f, "Angry"),
            ExpressionLabel::Fearful => write!(f, "Fearful"),
            ExpressionLabel::Disgusted => write!(f, "Disgusted"),
            ExpressionLabel::Surprised => write!(f, "Surprised"),
        }
    }
}

/// Probability per expression label for one detected face
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    scores: [f32; ExpressionLabel::COUNT],
}

impl ExpressionScores {
    /// Builds scores from `(label, probability)` pairs; unlisted labels score 0
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ExpressionLabel, f32)>,
    {
        let mut scores = Self::default();
        for (label, value) in pairs {
            scores.set(label, value);
        }
        scores
    }

    pub fn get(&self, label: ExpressionLabel) -> f32 {
        self.scores[label.index()]
    }

    pub fn set(&mut self, label: ExpressionLabel, value: f32) {
        self.scores[label.index()] = value;
    }

    pub fn add(&mut self, label: ExpressionLabel, value: f32) {
        self.scores[label.index()] += value;
    }

    /// Iterates `(label, score)` in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (ExpressionLabel, f32)> + '_ {
        ExpressionLabel::ALL
            .iter()
            .map(move |&label| (label, self.get(label)))
    }

    /// Labels sorted by descending score. The sort is stable, so ties keep enumeration order.
    pub fn ranked(&self) -> Vec<(ExpressionLabel, f32)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// The highest-scoring label
    pub fn dominant(&self) -> ExpressionLabel {
        self.ranked()
            .first()
            .map(|(label, _)| *label)
            .unwrap_or(ExpressionLabel::Neutral)
    }
}

/// A playable item from the music catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artist_name: String,
    pub cover_url: Option<String>,
    pub preview_url: String,
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.title, self.artist_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominant_picks_strict_maximum() {
        let scores = ExpressionScores::from_pairs([
            (ExpressionLabel::Happy, 0.9),
            (ExpressionLabel::Sad, 0.05),
            (ExpressionLabel::Neutral, 0.05),
        ]);
        assert_eq!(scores.dominant(), ExpressionLabel::Happy);

        for (i, label) in ExpressionLabel::ALL.iter().enumerate() {
            let pairs = ExpressionLabel::ALL
                .iter()
                .enumerate()
                .map(|(j, l)| (*l, if i == j { 0.6 } else { 0.01 * j as f32 }));
            assert_eq!(ExpressionScores::from_pairs(pairs).dominant(), *label);
        }
    }

    #[test]
    fn ties_resolve_in_enumeration_order() {
        let scores = ExpressionScores::from_pairs([
            (ExpressionLabel::Surprised, 0.4),
            (ExpressionLabel::Sad, 0.4),
            (ExpressionLabel::Angry, 0.2),
        ]);
        assert_eq!(scores.dominant(), ExpressionLabel::Sad);

        let ranked = scores.ranked();
        assert_eq!(ranked[0].0, ExpressionLabel::Sad);
        assert_eq!(ranked[1].0, ExpressionLabel::Surprised);
        assert_eq!(ranked[2].0, ExpressionLabel::Angry);
    }

    #[test]
    fn labels_render_for_queries_and_display() {
        assert_eq!(ExpressionLabel::Fearful.as_str(), "fearful");
        assert_eq!(ExpressionLabel::Fearful.to_string(), "Fearful");
    }

    #[test]
    fn still_image_is_square_jpeg() {
        let width = 64;
        let height = 48;
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        let frame = Frame::new(data, width, height);

        let still = StillImage::from_frame(&frame, 32).unwrap();
        assert_eq!((still.width, still.height), (32, 32));
        assert_eq!(&still.jpeg[..2], &[0xFF, 0xD8]);

        let decoded = still.decode().unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 32));
        assert_eq!(decoded.data.len(), 32 * 32 * 3);
    }

    #[test]
    fn mismatched_frame_buffer_is_rejected() {
        let frame = Frame::new(vec![0; 10], 64, 48);
        assert!(StillImage::from_frame(&frame, 32).is_err());
    }
}
