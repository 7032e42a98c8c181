// Detection cycle orchestration and session state

use crate::emotion::ExpressionDetector;
use crate::models::{ExpressionLabel, StillImage, Track};
use crate::player::select_initial;
use crate::search::{find_tracks, QueryPlan, TrackCatalog};
use rand::Rng;
use tracing::{error, info};

pub const MODEL_LOAD_FAILED: &str =
    "Failed to load face detection models. Please restart the app.";
pub const NO_FACE: &str = "No face detected. Please try again with your face clearly visible.";
pub const CYCLE_FAILED: &str = "An error occurred during face detection or song fetching.";

/// "No Bollywood songs found for this mood. Try again!"
pub fn no_songs_message(genre: &str) -> String {
    let mut chars = genre.chars();
    let genre = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("No {genre} songs found for this mood. Try again!")
}

/// Where a detection cycle currently stands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CyclePhase {
    #[default]
    Idle,
    Capturing,
    Detecting,
    Searching,
    NoFace,
    Empty,
    Ready,
}

impl CyclePhase {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            CyclePhase::Capturing | CyclePhase::Detecting | CyclePhase::Searching
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ModelStatus {
    #[default]
    Loading,
    Ready,
    Failed,
}

/// Result of the detect and search half of a cycle
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    NoFace,
    Found {
        mood: ExpressionLabel,
        tracks: Vec<Track>,
    },
    Failed(String),
}

/// Detects the mood in `image` and searches for matching tracks.
/// `on_phase` is told when detection finishes and searching starts.
pub async fn run_cycle<D, C, F>(
    image: &StillImage,
    detector: &mut D,
    catalog: &C,
    plan: &QueryPlan,
    mut on_phase: F,
) -> CycleOutcome
where
    D: ExpressionDetector,
    C: TrackCatalog,
    F: FnMut(CyclePhase, Option<ExpressionLabel>),
{
    let scores = match detector.detect(image) {
        Ok(Some(scores)) => scores,
        Ok(None) => {
            info!("No face in captured frame");
            return CycleOutcome::NoFace;
        }
        Err(e) => {
            error!("Expression detection failed: {}", e);
            return CycleOutcome::Failed(e.to_string());
        }
    };

    let mood = scores.dominant();
    info!("Detected mood: {} ({:.2})", mood, scores.get(mood));
    on_phase(CyclePhase::Searching, Some(mood));

    let tracks = find_tracks(catalog, plan, mood).await;
    CycleOutcome::Found { mood, tracks }
}

/// Everything the UI shows. Reset at the start of each cycle.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub models: ModelStatus,
    pub phase: CyclePhase,
    pub captured: Option<StillImage>,
    pub mood: Option<ExpressionLabel>,
    pub tracks: Vec<Track>,
    current: Option<usize>,
    pub error: Option<String>,
    pub show_toast: bool,
    genre: String,
}

impl SessionState {
    pub fn new(genre: impl Into<String>) -> Self {
        Self {
            genre: genre.into(),
            ..Self::default()
        }
    }

    pub fn models_ready(&mut self) {
        self.models = ModelStatus::Ready;
    }

    /// Model loading failed; the trigger stays disabled for good
    pub fn models_failed(&mut self) {
        self.models = ModelStatus::Failed;
        self.fail(MODEL_LOAD_FAILED.to_string());
    }

    /// The inference worker is gone. Any cycle in flight fails and the
    /// trigger stays disabled. A model-load message already shown is kept.
    pub fn worker_stopped(&mut self) {
        if self.models == ModelStatus::Failed {
            return;
        }
        self.models = ModelStatus::Failed;
        self.fail(CYCLE_FAILED.to_string());
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// The trigger is enabled iff models are loaded and no cycle is in flight
    pub fn can_trigger(&self) -> bool {
        self.models == ModelStatus::Ready && !self.is_busy()
    }

    /// Clears the previous cycle. Returns false when a cycle may not start.
    pub fn begin_cycle(&mut self) -> bool {
        if !self.can_trigger() {
            return false;
        }
        self.error = None;
        self.show_toast = false;
        self.tracks.clear();
        self.current = None;
        self.mood = None;
        self.captured = None;
        self.phase = CyclePhase::Capturing;
        true
    }

    /// The frame was captured and handed to the detector
    pub fn captured(&mut self, image: StillImage) {
        self.captured = Some(image);
        self.phase = CyclePhase::Detecting;
    }

    pub fn advance(&mut self, phase: CyclePhase, mood: Option<ExpressionLabel>) {
        if self.is_busy() {
            self.phase = phase;
            if mood.is_some() {
                self.mood = mood;
            }
        }
    }

    /// Aborts the cycle with the generic error
    pub fn abort(&mut self) {
        self.fail(CYCLE_FAILED.to_string());
    }

    /// Applies the cycle result. Returns the track to autoplay, if any.
    pub fn finish_cycle<R: Rng + ?Sized>(
        &mut self,
        outcome: CycleOutcome,
        rng: &mut R,
    ) -> Option<&Track> {
        match outcome {
            CycleOutcome::NoFace => {
                self.fail(NO_FACE.to_string());
                self.phase = CyclePhase::NoFace;
                None
            }
            CycleOutcome::Failed(_) => {
                self.abort();
                None
            }
            CycleOutcome::Found { mood, tracks } => {
                self.mood = Some(mood);
                if tracks.is_empty() {
                    self.fail(no_songs_message(&self.genre));
                    self.phase = CyclePhase::Empty;
                    return None;
                }
                self.current = select_initial(&tracks, rng);
                self.tracks = tracks;
                self.phase = CyclePhase::Ready;
                self.current_track()
            }
        }
    }

    /// Makes the track at `index` current. Returns it when the index is valid.
    pub fn select_track(&mut self, index: usize) -> Option<&Track> {
        if index < self.tracks.len() {
            self.current = Some(index);
        }
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// True when `track_id` is in the current result list
    pub fn lists_track(&self, track_id: u64) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Hides the banner; the error itself stays until the next cycle
    pub fn dismiss_toast(&mut self) {
        self.show_toast = false;
    }

    fn fail(&mut self, message: String) {
        if self.is_busy() {
            self.phase = CyclePhase::Idle;
        }
        self.error = Some(message);
        self.show_toast = true;
    }
}
