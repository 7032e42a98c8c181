// Command line and runtime configuration

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_SEARCH_URL: &str = "https://api.deezer.com/search";

/// Reads your mood from the webcam and plays matching music
#[derive(Parser, Debug, Clone)]
#[command(name = "vibebeats", version, about)]
pub struct Args {
    /// Directory holding the face_detector/ and face_expression/ model bundles
    #[arg(long, env = "VIBEBEATS_MODELS", default_value = "models")]
    pub models_dir: PathBuf,

    /// Compute backend for expression inference
    #[arg(long, value_enum, default_value_t = ComputeBackend::Cpu)]
    pub backend: ComputeBackend,

    /// Genre word put in front of every search query
    #[arg(long, default_value = "bollywood")]
    pub genre: String,

    /// Catalog search endpoint
    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,

    /// Optional relay prefix prepended to the search URL
    #[arg(long)]
    pub relay: Option<String>,

    /// Maximum number of tracks kept from a search
    #[arg(long, default_value_t = 10)]
    pub max_results: usize,

    /// Camera device index
    #[arg(long, default_value_t = 0)]
    pub camera_index: u32,

    /// Edge length in pixels of the captured still image
    #[arg(long, default_value_t = 260)]
    pub capture_size: u32,

    /// Log file path
    #[arg(long, default_value = "vibebeats.log")]
    pub log_file: PathBuf,
}

/// Where inference runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ComputeBackend {
    #[default]
    Cpu,
    Cuda,
}

/// Model bundle locations and inference backend
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    pub backend: ComputeBackend,
}

impl ModelConfig {
    pub fn face_detector_path(&self) -> PathBuf {
        self.models_dir
            .join("face_detector")
            .join("haarcascade_frontalface_default.xml")
    }

    pub fn face_expression_path(&self) -> PathBuf {
        self.models_dir.join("face_expression").join("emotion.onnx")
    }
}

/// Catalog search settings
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub genre: String,
    pub base_url: String,
    pub relay: Option<String>,
    pub max_results: usize,
}

impl SearchConfig {
    /// The URL requests are sent to, relay prefix included
    pub fn endpoint(&self) -> String {
        match &self.relay {
            Some(relay) => format!("{relay}{}", self.base_url),
            None => self.base_url.clone(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            genre: "bollywood".to_string(),
            base_url: DEFAULT_SEARCH_URL.to_string(),
            relay: None,
            max_results: 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub index: u32,
    pub capture_size: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            capture_size: 260,
        }
    }
}

/// Everything the app needs at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub models: ModelConfig,
    pub search: SearchConfig,
    pub camera: CameraConfig,
    pub log_file: PathBuf,
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        Self {
            models: ModelConfig {
                models_dir: args.models_dir,
                backend: args.backend,
            },
            search: SearchConfig {
                genre: args.genre.trim().to_lowercase(),
                base_url: args.search_url,
                relay: args.relay.filter(|r| !r.is_empty()),
                max_results: args.max_results.max(1),
            },
            camera: CameraConfig {
                index: args.camera_index,
                capture_size: args.capture_size.max(1),
            },
            log_file: args.log_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_catalog_and_display_size() {
        let args = Args::parse_from(["vibebeats"]);
        let config = AppConfig::from(args);

        assert_eq!(config.search.genre, "bollywood");
        assert_eq!(config.search.endpoint(), DEFAULT_SEARCH_URL);
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.camera.capture_size, 260);
        assert_eq!(config.models.backend, ComputeBackend::Cpu);
        assert!(config
            .models
            .face_expression_path()
            .ends_with("face_expression/emotion.onnx"));
    }

    #[test]
    fn relay_is_prepended() {
        let args = Args::parse_from([
            "vibebeats",
            "--relay",
            "https://relay.example/",
            "--genre",
            " Punjabi ",
            "--backend",
            "cuda",
        ]);
        let config = AppConfig::from(args);

        assert_eq!(
            config.search.endpoint(),
            "https://relay.example/https://api.deezer.com/search"
        );
        assert_eq!(config.search.genre, "punjabi");
        assert_eq!(config.models.backend, ComputeBackend::Cuda);
    }
}
