use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Mutex;
use vibebeats::emotion::ExpressionDetector;
use vibebeats::error::{Result, VibeBeatsError};
use vibebeats::models::{ExpressionLabel, ExpressionScores, StillImage, Track};
use vibebeats::search::{QueryPlan, TrackCatalog};
use vibebeats::session::{run_cycle, CycleOutcome, CyclePhase, SessionState};

/// Detector that returns a fixed answer
struct FakeDetector {
    answer: Option<ExpressionScores>,
    fail: bool,
    calls: usize,
}

impl FakeDetector {
    fn face(pairs: &[(ExpressionLabel, f32)]) -> Self {
        Self {
            answer: Some(ExpressionScores::from_pairs(pairs.iter().copied())),
            fail: false,
            calls: 0,
        }
    }

    fn no_face() -> Self {
        Self {
            answer: None,
            fail: false,
            calls: 0,
        }
    }

    fn broken() -> Self {
        Self {
            answer: None,
            fail: true,
            calls: 0,
        }
    }
}

impl ExpressionDetector for FakeDetector {
    fn detect(&mut self, _image: &StillImage) -> Result<Option<ExpressionScores>> {
        self.calls += 1;
        if self.fail {
            return Err(VibeBeatsError::OnnxRuntime("session crashed".to_string()));
        }
        Ok(self.answer.clone())
    }
}

/// Catalog returning queued result counts and recording queries
struct FakeCatalog {
    sizes: Mutex<VecDeque<usize>>,
    queries: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn new(sizes: &[usize]) -> Self {
        Self {
            sizes: Mutex::new(sizes.iter().copied().collect()),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl TrackCatalog for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        self.queries.lock().unwrap().push(query.to_string());
        let n = self.sizes.lock().unwrap().pop_front().unwrap_or(0);
        Ok((0..n as u64)
            .map(|id| Track {
                id,
                title: format!("{query} #{id}"),
                artist_name: "Various".to_string(),
                cover_url: Some(format!("https://cdn.example/{id}.jpg")),
                preview_url: format!("https://cdn.example/{id}.mp3"),
            })
            .collect())
    }
}

fn still() -> StillImage {
    StillImage {
        jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
        width: 260,
        height: 260,
    }
}

/// Runs one full cycle the way the UI and worker do
async fn full_cycle(
    detector: &mut FakeDetector,
    catalog: &FakeCatalog,
    session: &mut SessionState,
) -> Option<Track> {
    let mut rng = StdRng::seed_from_u64(99);
    let plan = QueryPlan::new("bollywood", 10);

    assert!(session.begin_cycle());
    session.captured(still());

    let mut phases = Vec::new();
    let outcome = run_cycle(&still(), detector, catalog, &plan, |phase, mood| {
        phases.push((phase, mood));
    })
    .await;
    for (phase, mood) in phases {
        session.advance(phase, mood);
    }

    session.finish_cycle(outcome, &mut rng).cloned()
}

fn ready_session() -> SessionState {
    let mut session = SessionState::new("bollywood");
    session.models_ready();
    session
}

#[tokio::test]
async fn happy_face_searches_mood_query_first() {
    let mut detector = FakeDetector::face(&[
        (ExpressionLabel::Happy, 0.9),
        (ExpressionLabel::Sad, 0.05),
        (ExpressionLabel::Neutral, 0.05),
    ]);
    let catalog = FakeCatalog::new(&[4]);
    let mut session = ready_session();

    let autoplay = full_cycle(&mut detector, &catalog, &mut session).await;

    assert_eq!(session.mood, Some(ExpressionLabel::Happy));
    assert_eq!(catalog.queries(), vec!["bollywood happy songs"]);
    assert_eq!(session.tracks.len(), 4);
    assert_eq!(session.phase, CyclePhase::Ready);
    assert_eq!(autoplay.as_ref(), session.current_track());
    assert!(!session.has_error());
}

#[tokio::test]
async fn fallback_query_fills_the_list() {
    let mut detector = FakeDetector::face(&[(ExpressionLabel::Angry, 0.7)]);
    let catalog = FakeCatalog::new(&[0, 3]);
    let mut session = ready_session();

    let autoplay = full_cycle(&mut detector, &catalog, &mut session).await;

    assert_eq!(
        catalog.queries(),
        vec!["bollywood angry songs", "bollywood songs"]
    );
    assert_eq!(session.tracks.len(), 3);
    assert!(!session.has_error());
    assert!(autoplay.is_some());
}

#[tokio::test]
async fn both_queries_empty_reports_no_songs() {
    let mut detector = FakeDetector::face(&[(ExpressionLabel::Sad, 0.8)]);
    let catalog = FakeCatalog::new(&[0, 0]);
    let mut session = ready_session();

    let autoplay = full_cycle(&mut detector, &catalog, &mut session).await;

    assert!(autoplay.is_none());
    assert_eq!(catalog.queries().len(), 2);
    assert!(session.has_error());
    assert!(session
        .error
        .as_deref()
        .unwrap()
        .to_lowercase()
        .contains("no bollywood songs found"));
    assert!(session.tracks.is_empty());
    assert_eq!(session.phase, CyclePhase::Empty);
}

#[tokio::test]
async fn no_face_never_searches() {
    let mut detector = FakeDetector::no_face();
    let catalog = FakeCatalog::new(&[5]);
    let mut session = ready_session();

    let autoplay = full_cycle(&mut detector, &catalog, &mut session).await;

    assert!(autoplay.is_none());
    assert_eq!(detector.calls, 1);
    assert!(catalog.queries().is_empty());
    assert!(session
        .error
        .as_deref()
        .unwrap()
        .to_lowercase()
        .contains("no face detected"));
    assert!(session.tracks.is_empty());
    assert_eq!(session.phase, CyclePhase::NoFace);
    assert!(session.can_trigger());
}

#[tokio::test]
async fn detector_error_aborts_with_generic_message() {
    let mut detector = FakeDetector::broken();
    let catalog = FakeCatalog::new(&[5]);
    let plan = QueryPlan::new("bollywood", 10);

    let outcome = run_cycle(&still(), &mut detector, &catalog, &plan, |_, _| {}).await;
    assert!(matches!(outcome, CycleOutcome::Failed(_)));
    assert!(catalog.queries().is_empty());

    let mut session = ready_session();
    session.begin_cycle();
    session.captured(still());
    session.finish_cycle(outcome, &mut StdRng::seed_from_u64(1));
    assert_eq!(
        session.error.as_deref(),
        Some("An error occurred during face detection or song fetching.")
    );
    assert!(session.can_trigger());
}

#[tokio::test]
async fn user_selection_replaces_random_pick() {
    let mut detector = FakeDetector::face(&[(ExpressionLabel::Surprised, 0.6)]);
    let catalog = FakeCatalog::new(&[6]);
    let mut session = ready_session();

    full_cycle(&mut detector, &catalog, &mut session).await;

    let wanted = session.tracks[4].clone();
    assert_eq!(session.select_track(4), Some(&wanted));
    assert_eq!(session.current_track(), Some(&wanted));
}

#[tokio::test]
async fn searching_phase_reports_mood_before_results() {
    let mut detector = FakeDetector::face(&[(ExpressionLabel::Fearful, 0.5)]);
    let catalog = FakeCatalog::new(&[1]);
    let plan = QueryPlan::new("bollywood", 10);

    let mut seen = Vec::new();
    run_cycle(&still(), &mut detector, &catalog, &plan, |phase, mood| {
        seen.push((phase, mood))
    })
    .await;

    assert_eq!(
        seen,
        vec![(CyclePhase::Searching, Some(ExpressionLabel::Fearful))]
    );
}
