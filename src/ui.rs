// UI module for VibeBeats

use crate::camera::{CameraManager, FrameSource};
use crate::error::VibeBeatsError;
use crate::models::{Frame, ImageData, Track};
use crate::player::AudioPlayer;
use crate::session::{CyclePhase, ModelStatus, SessionState};
use crate::worker::{WorkerCommand, WorkerEvent, WorkerHandle};
use egui::{Color32, RichText, TextureHandle, TextureOptions};
use std::collections::HashMap;
use tracing::{error, warn};

const PREVIEW_SIZE: f32 = 260.0;
const COVER_SIZE: f32 = 48.0;
const ACCENT: Color32 = Color32::from_rgb(147, 51, 234);
const WORKER_GONE: &str = "downloader stopped";

/// Button presses on the now-playing bar
enum Transport {
    TogglePause,
    Stop,
    Replay,
    Volume(f32),
}

/// Main application UI
pub struct VibeBeatsApp {
    camera: Option<CameraManager>,
    capture_size: u32,
    worker: WorkerHandle,
    audio: Option<AudioPlayer>,
    session: SessionState,
    relay_configured: bool,
    camera_texture: Option<TextureHandle>,
    captured_texture: Option<TextureHandle>,
    covers: HashMap<u64, TextureHandle>,
    /// Preview being downloaded for the current track
    pending_preview: Option<u64>,
    playback_error: Option<String>,
    worker_gone: bool,
}

impl VibeBeatsApp {
    pub fn new(
        camera: Option<CameraManager>,
        capture_size: u32,
        worker: WorkerHandle,
        audio: Option<AudioPlayer>,
        genre: &str,
        relay_configured: bool,
    ) -> Self {
        Self {
            camera,
            capture_size,
            worker,
            audio,
            session: SessionState::new(genre),
            relay_configured,
            camera_texture: None,
            captured_texture: None,
            covers: HashMap::new(),
            pending_preview: None,
            playback_error: None,
            worker_gone: false,
        }
    }

    /// Updates the live preview from the latest frame
    fn update_camera_texture(&mut self, ctx: &egui::Context) {
        if let Some(camera) = self.camera.as_mut() {
            if let Ok(frame) = camera.current_frame() {
                self.camera_texture = Some(frame_texture(ctx, "camera", &frame));
            }
        }
    }

    /// Drains worker events into session state
    fn poll_worker(&mut self, ctx: &egui::Context) {
        while !self.worker_gone {
            let event = match self.worker.poll() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    error!("{}", e);
                    self.worker_stopped();
                    break;
                }
            };
            match event {
                WorkerEvent::ModelsLoaded => self.session.models_ready(),
                WorkerEvent::ModelLoadFailed(reason) => {
                    error!("Detection disabled: {}", reason);
                    self.session.models_failed();
                }
                WorkerEvent::Phase(phase, mood) => self.session.advance(phase, mood),
                WorkerEvent::CycleFinished(outcome) => {
                    let autoplay = self
                        .session
                        .finish_cycle(outcome, &mut rand::thread_rng())
                        .cloned();
                    for track in self.session.tracks.clone() {
                        if track.cover_url.is_some() && !self.covers.contains_key(&track.id) {
                            self.send(WorkerCommand::FetchCover(track));
                        }
                    }
                    if let Some(track) = autoplay {
                        self.play(track);
                    }
                }
                WorkerEvent::PreviewReady { track_id, bytes } => {
                    if self.pending_preview != Some(track_id) {
                        continue;
                    }
                    self.pending_preview = None;
                    if let Some(audio) = self.audio.as_mut() {
                        if let Err(e) = audio.play(track_id, bytes) {
                            warn!("Could not play preview: {}", e);
                            self.playback_error = Some(e.to_string());
                        }
                    }
                }
                WorkerEvent::CoverReady { track_id, image } => {
                    if !self.session.lists_track(track_id) {
                        continue;
                    }
                    let texture = image_texture(ctx, &format!("cover-{track_id}"), &image);
                    self.covers.insert(track_id, texture);
                }
                WorkerEvent::FetchFailed { track_id, reason } => {
                    if self.pending_preview == Some(track_id) {
                        self.pending_preview = None;
                        self.playback_error = Some(reason);
                    }
                }
            }
        }
    }

    /// Returns false when the worker is gone
    fn send(&mut self, command: WorkerCommand) -> bool {
        match self.worker.send(command) {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                self.worker_stopped();
                false
            }
        }
    }

    fn worker_stopped(&mut self) {
        self.worker_gone = true;
        self.session.worker_stopped();
        if self.pending_preview.take().is_some() {
            self.playback_error = Some(WORKER_GONE.to_string());
        }
    }

    /// Starts a detection cycle from the current camera frame
    fn start_listening(&mut self, ctx: &egui::Context) {
        if !self.session.begin_cycle() {
            return;
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.stop();
        }
        self.pending_preview = None;
        self.playback_error = None;
        self.captured_texture = None;
        self.covers.clear();

        let capture = match self.camera.as_mut() {
            Some(camera) => camera.capture_still(self.capture_size),
            None => Err(VibeBeatsError::CameraInit("no camera available".to_string())),
        };

        match capture {
            Ok(image) => {
                if let Ok(frame) = image.decode() {
                    self.captured_texture = Some(frame_texture(ctx, "captured", &frame));
                }
                self.session.captured(image.clone());
                self.send(WorkerCommand::Detect(image));
            }
            Err(e) => {
                error!("Frame capture failed: {}", e);
                self.session.abort();
            }
        }
    }

    /// Makes `track` current and asks the worker for its preview
    fn play(&mut self, track: Track) {
        if let Some(audio) = self.audio.as_mut() {
            audio.stop();
        }
        self.playback_error = None;
        self.pending_preview = Some(track.id);
        if !self.send(WorkerCommand::FetchPreview(track)) {
            self.pending_preview = None;
            self.playback_error = Some(WORKER_GONE.to_string());
        }
    }

    fn render_header(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.label(RichText::new("🎵 VIBEBEATS").strong().size(18.0));
            ui.add_space(6.0);
        });
    }

    fn render_toast(&mut self, ctx: &egui::Context) {
        if !self.session.show_toast {
            return;
        }
        let Some(message) = self.session.error.clone() else {
            return;
        };

        egui::TopBottomPanel::top("toast")
            .frame(egui::Frame::default().fill(Color32::from_rgb(239, 68, 68)).inner_margin(8.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(message).color(Color32::WHITE));
                    if ui.button("×").clicked() {
                        self.session.dismiss_toast();
                    }
                });
            });
    }

    /// Now-playing bar with transport controls
    fn render_player_bar(&mut self, ctx: &egui::Context) {
        if self.session.has_error() {
            return;
        }
        let Some(track) = self.session.current_track().cloned() else {
            return;
        };

        let mut action = None;
        egui::TopBottomPanel::bottom("now_playing").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if let Some(cover) = self.covers.get(&track.id) {
                    ui.add(
                        egui::Image::new(cover)
                            .fit_to_exact_size(egui::vec2(COVER_SIZE, COVER_SIZE)),
                    );
                }
                ui.vertical(|ui| {
                    ui.label(RichText::new(&track.title).strong().color(ACCENT));
                    ui.label(RichText::new(&track.artist_name).weak());
                });
                ui.separator();

                if self.pending_preview == Some(track.id) {
                    ui.spinner();
                    ui.label("Loading preview...");
                } else if let Some(reason) = &self.playback_error {
                    ui.label(RichText::new(format!("Preview unavailable: {reason}")).weak());
                } else if let Some(audio) = &self.audio {
                    let finished = audio.is_finished();
                    let label = if finished || audio.is_paused() { "▶" } else { "⏸" };
                    if ui.button(label).clicked() {
                        action = Some(if finished {
                            Transport::Replay
                        } else {
                            Transport::TogglePause
                        });
                    }
                    if ui.button("⏹").clicked() {
                        action = Some(Transport::Stop);
                    }
                    let mut volume = audio.volume();
                    if ui
                        .add(egui::Slider::new(&mut volume, 0.0..=1.0).text("Volume"))
                        .changed()
                    {
                        action = Some(Transport::Volume(volume));
                    }
                } else {
                    ui.label(RichText::new("No audio output device").weak());
                }
            });
            ui.add_space(6.0);
        });

        match action {
            Some(Transport::Replay) => self.play(track),
            Some(other) => {
                if let Some(audio) = self.audio.as_mut() {
                    match other {
                        Transport::TogglePause => audio.toggle_pause(),
                        Transport::Stop => audio.stop(),
                        Transport::Volume(volume) => audio.set_volume(volume),
                        Transport::Replay => {}
                    }
                }
            }
            None => {}
        }
    }

    fn render_main(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.horizontal_top(|ui| {
                    self.render_camera_column(ui);
                    ui.add_space(24.0);
                    ui.vertical(|ui| self.render_controls(ui, ctx));
                });

                if self.session.is_busy() {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.spinner();
                        let status = match self.session.phase {
                            CyclePhase::Searching => "Finding songs...",
                            _ => "Detecting...",
                        };
                        ui.label(RichText::new(status).color(ACCENT).strong());
                    });
                }

                if !self.session.tracks.is_empty() && !self.session.has_error() {
                    ui.add_space(24.0);
                    self.render_track_list(ui);
                }

                if self.session.models == ModelStatus::Loading && !self.session.has_error() {
                    ui.add_space(12.0);
                    ui.label(RichText::new("Loading face detection models...").weak());
                }

                ui.add_space(24.0);
                self.render_note(ui);
            });
        });
    }

    fn render_camera_column(&self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            match &self.camera_texture {
                Some(texture) => {
                    ui.add(
                        egui::Image::new(texture)
                            .fit_to_exact_size(egui::vec2(PREVIEW_SIZE, PREVIEW_SIZE * 0.75)),
                    );
                }
                None => {
                    ui.label(RichText::new("Camera unavailable").weak());
                }
            }
            if let Some(captured) = &self.captured_texture {
                ui.add_space(8.0);
                ui.label(RichText::new("Captured").weak());
                ui.add(egui::Image::new(captured).fit_to_exact_size(egui::vec2(96.0, 96.0)));
            }
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Live Mood Detection");
        ui.label(
            "Your current mood is being analyzed in real-time. Enjoy music tailored to your feelings.",
        );
        ui.add_space(12.0);

        let label = if self.session.is_busy() {
            "Detecting..."
        } else {
            "Start Listening"
        };
        if ui
            .add_enabled(self.session.can_trigger(), egui::Button::new(label))
            .clicked()
        {
            self.start_listening(ctx);
        }

        if let (Some(mood), false) = (self.session.mood, self.session.has_error()) {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.label(RichText::new("Detected Mood:").strong());
                ui.label(mood.to_string());
            });
        }
    }

    fn render_track_list(&mut self, ui: &mut egui::Ui) {
        ui.heading("Recommended Tracks");
        ui.add_space(8.0);

        let mut chosen = None;
        for (index, track) in self.session.tracks.iter().enumerate() {
            let is_current = self.session.current_index() == Some(index);
            ui.horizontal(|ui| {
                match self.covers.get(&track.id) {
                    Some(cover) => {
                        ui.add(
                            egui::Image::new(cover)
                                .fit_to_exact_size(egui::vec2(COVER_SIZE, COVER_SIZE)),
                        );
                    }
                    None => {
                        ui.add_space(COVER_SIZE);
                    }
                }
                ui.vertical(|ui| {
                    let title = RichText::new(&track.title);
                    ui.label(if is_current { title.strong().color(ACCENT) } else { title });
                    ui.label(RichText::new(&track.artist_name).weak());
                });
                if ui
                    .button("▶")
                    .on_hover_text(format!("Play {}", track.title))
                    .clicked()
                {
                    chosen = Some(index);
                }
            });
            ui.separator();
        }

        if let Some(index) = chosen {
            if let Some(track) = self.session.select_track(index).cloned() {
                self.play(track);
            }
        }
    }

    fn render_note(&self, ui: &mut egui::Ui) {
        if self.relay_configured {
            ui.label(
                RichText::new(
                    "Note: searches go through the configured relay. If they fail, check that the relay grants access.",
                )
                .small()
                .weak(),
            );
        }
        ui.label(
            RichText::new(
                "For best results, ensure your face is well-lit and clearly visible to the webcam.",
            )
            .small()
            .weak(),
        );
    }
}

fn frame_texture(ctx: &egui::Context, name: &str, frame: &Frame) -> TextureHandle {
    let color_image =
        egui::ColorImage::from_rgb([frame.width as usize, frame.height as usize], &frame.data);
    ctx.load_texture(name, color_image, TextureOptions::LINEAR)
}

fn image_texture(ctx: &egui::Context, name: &str, image: &ImageData) -> TextureHandle {
    let color_image = egui::ColorImage::from_rgba_unmultiplied(
        [image.width as usize, image.height as usize],
        &image.rgba,
    );
    ctx.load_texture(name, color_image, TextureOptions::LINEAR)
}

impl eframe::App for VibeBeatsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.poll_worker(ctx);
        self.update_camera_texture(ctx);

        self.render_header(ctx);
        self.render_toast(ctx);
        self.render_player_bar(ctx);
        self.render_main(ctx);
    }
}
