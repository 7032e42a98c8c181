// Inference worker: owns the models and the HTTP client off the UI thread

use crate::config::AppConfig;
use crate::emotion::InferenceContext;
use crate::error::{Result, VibeBeatsError};
use crate::models::{ExpressionLabel, ImageData, StillImage, Track};
use crate::search::{DeezerClient, QueryPlan};
use crate::session::{run_cycle, CycleOutcome, CyclePhase};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, info, warn};

/// Requests from the UI thread
#[derive(Debug)]
pub enum WorkerCommand {
    /// Detect the mood in a captured still and search for tracks
    Detect(StillImage),
    /// Download the preview clip of a track
    FetchPreview(Track),
    /// Download and decode an album cover
    FetchCover(Track),
}

/// Notifications back to the UI thread
#[derive(Debug)]
pub enum WorkerEvent {
    ModelsLoaded,
    ModelLoadFailed(String),
    Phase(CyclePhase, Option<ExpressionLabel>),
    CycleFinished(CycleOutcome),
    PreviewReady { track_id: u64, bytes: Vec<u8> },
    CoverReady { track_id: u64, image: ImageData },
    FetchFailed { track_id: u64, reason: String },
}

/// Handle the UI keeps to talk to the worker
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl WorkerHandle {
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| VibeBeatsError::Worker(format!("worker stopped: {e}")))
    }

    /// Next pending event without blocking. Errors once the worker thread is gone.
    pub fn poll(&mut self) -> Result<Option<WorkerEvent>> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(VibeBeatsError::Worker(
                "inference worker exited".to_string(),
            )),
        }
    }
}

/// Starts the worker thread. Models are loaded there once, before any command runs.
pub fn spawn_worker(config: AppConfig) -> Result<WorkerHandle> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("inference".to_string())
        .spawn(move || runtime.block_on(worker_loop(config, command_rx, event_tx)))?;

    Ok(WorkerHandle {
        commands: command_tx,
        events: event_rx,
    })
}

async fn worker_loop(
    config: AppConfig,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    // Detection is useless without search, so a client failure disables it too
    let catalog = match DeezerClient::new(&config.search) {
        Ok(client) => client,
        Err(e) => {
            error!("HTTP client setup failed: {}", e);
            let _ = events.send(WorkerEvent::ModelLoadFailed(format!(
                "HTTP client setup failed: {e}"
            )));
            return;
        }
    };

    let mut inference = match InferenceContext::load(&config.models) {
        Ok(ctx) => {
            let _ = events.send(WorkerEvent::ModelsLoaded);
            Some(ctx)
        }
        Err(e) => {
            error!("Model loading failed: {}", e);
            let _ = events.send(WorkerEvent::ModelLoadFailed(e.to_string()));
            None
        }
    };

    let plan = QueryPlan::from(&config.search);

    while let Some(command) = commands.recv().await {
        match command {
            WorkerCommand::Detect(image) => {
                let outcome = match inference.as_mut() {
                    Some(ctx) => {
                        run_cycle(&image, ctx, &catalog, &plan, |phase, mood| {
                            let _ = events.send(WorkerEvent::Phase(phase, mood));
                        })
                        .await
                    }
                    None => CycleOutcome::Failed("models not loaded".to_string()),
                };
                let _ = events.send(WorkerEvent::CycleFinished(outcome));
            }
            WorkerCommand::FetchPreview(track) => {
                let event = match fetch_preview(&catalog, &track).await {
                    Ok(bytes) => WorkerEvent::PreviewReady {
                        track_id: track.id,
                        bytes,
                    },
                    Err(e) => {
                        warn!("Preview download for {} failed: {}", track, e);
                        WorkerEvent::FetchFailed {
                            track_id: track.id,
                            reason: e.to_string(),
                        }
                    }
                };
                let _ = events.send(event);
            }
            WorkerCommand::FetchCover(track) => {
                let Some(url) = track.cover_url.as_deref() else {
                    continue;
                };
                match catalog.fetch_bytes(url).await.and_then(|b| ImageData::from_encoded(&b)) {
                    Ok(image) => {
                        let _ = events.send(WorkerEvent::CoverReady {
                            track_id: track.id,
                            image,
                        });
                    }
                    Err(e) => warn!("Cover for {} unavailable: {}", track, e),
                }
            }
        }
    }

    info!("Inference worker shutting down");
}

async fn fetch_preview(catalog: &DeezerClient, track: &Track) -> Result<Vec<u8>> {
    if track.preview_url.is_empty() {
        return Err(VibeBeatsError::Playback(
            "track has no preview clip".to_string(),
        ));
    }
    catalog.fetch_bytes(&track.preview_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_reports_exited_worker() {
        let (command_tx, _command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut handle = WorkerHandle {
            commands: command_tx,
            events: event_rx,
        };

        assert!(matches!(handle.poll(), Ok(None)));

        event_tx.send(WorkerEvent::ModelsLoaded).unwrap();
        drop(event_tx);

        // Queued events drain before the disconnect shows up
        assert!(matches!(handle.poll(), Ok(Some(WorkerEvent::ModelsLoaded))));
        assert!(matches!(handle.poll(), Err(VibeBeatsError::Worker(_))));
    }

    #[test]
    fn send_fails_once_worker_dropped_its_receiver() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = WorkerHandle {
            commands: command_tx,
            events: event_rx,
        };
        drop(command_rx);

        let still = StillImage {
            jpeg: vec![0xFF, 0xD8],
            width: 1,
            height: 1,
        };
        assert!(handle.send(WorkerCommand::Detect(still)).is_err());
    }
}
