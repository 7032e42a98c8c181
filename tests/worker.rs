use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use vibebeats::config::{AppConfig, CameraConfig, ComputeBackend, ModelConfig, SearchConfig};
use vibebeats::models::{StillImage, Track};
use vibebeats::session::CycleOutcome;
use vibebeats::worker::{spawn_worker, WorkerCommand, WorkerEvent, WorkerHandle};

fn config_without_models() -> AppConfig {
    AppConfig {
        models: ModelConfig {
            models_dir: PathBuf::from("/nonexistent/vibebeats-models"),
            backend: ComputeBackend::Cpu,
        },
        search: SearchConfig::default(),
        camera: CameraConfig::default(),
        log_file: PathBuf::from("vibebeats.log"),
    }
}

async fn next_event(handle: &mut WorkerHandle) -> WorkerEvent {
    timeout(Duration::from_secs(10), handle.events.recv())
        .await
        .expect("worker did not answer in time")
        .expect("worker exited")
}

fn still() -> StillImage {
    StillImage {
        jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
        width: 260,
        height: 260,
    }
}

#[tokio::test]
async fn missing_models_are_reported_first() {
    let mut handle = spawn_worker(config_without_models()).unwrap();

    match next_event(&mut handle).await {
        WorkerEvent::ModelLoadFailed(reason) => assert!(reason.contains("not found")),
        other => panic!("expected ModelLoadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn detect_without_models_fails_the_cycle() {
    let mut handle = spawn_worker(config_without_models()).unwrap();
    assert!(matches!(
        next_event(&mut handle).await,
        WorkerEvent::ModelLoadFailed(_)
    ));

    handle.send(WorkerCommand::Detect(still())).unwrap();

    assert!(matches!(
        next_event(&mut handle).await,
        WorkerEvent::CycleFinished(CycleOutcome::Failed(_))
    ));
}

#[tokio::test]
async fn track_without_preview_reports_fetch_failure() {
    let mut handle = spawn_worker(config_without_models()).unwrap();
    next_event(&mut handle).await;

    let track = Track {
        id: 42,
        title: "Silent".to_string(),
        artist_name: "Nobody".to_string(),
        cover_url: None,
        preview_url: String::new(),
    };
    handle.send(WorkerCommand::FetchPreview(track)).unwrap();

    match next_event(&mut handle).await {
        WorkerEvent::FetchFailed { track_id, reason } => {
            assert_eq!(track_id, 42);
            assert!(reason.contains("no preview"));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_keeps_serving_after_a_failed_cycle() {
    let mut handle = spawn_worker(config_without_models()).unwrap();
    next_event(&mut handle).await;

    for _ in 0..2 {
        handle.send(WorkerCommand::Detect(still())).unwrap();
        assert!(matches!(
            next_event(&mut handle).await,
            WorkerEvent::CycleFinished(CycleOutcome::Failed(_))
        ));
    }
    assert!(matches!(handle.poll(), Ok(None)));
}
