// Preview playback and track selection

use crate::error::Result;
use crate::models::Track;
use rand::Rng;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use tracing::{info, warn};

/// Picks a uniformly random index into a non-empty track list
pub fn select_initial<R: Rng + ?Sized>(tracks: &[Track], rng: &mut R) -> Option<usize> {
    if tracks.is_empty() {
        None
    } else {
        Some(rng.gen_range(0..tracks.len()))
    }
}

/// Plays downloaded preview clips on the default output device
pub struct AudioPlayer {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
}

impl AudioPlayer {
    /// Opens the default audio output
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            volume: 1.0,
        })
    }

    /// Replaces whatever is playing with the given clip and starts it
    pub fn play(&mut self, track_id: u64, bytes: Vec<u8>) -> Result<()> {
        self.stop();

        let source = Decoder::new(Cursor::new(bytes))?;
        let sink = Sink::try_new(&self.stream_handle)?;
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();

        info!("Playing preview for track {}", track_id);
        self.sink = Some(sink);
        Ok(())
    }

    pub fn toggle_pause(&mut self) {
        if let Some(sink) = &self.sink {
            if sink.is_paused() {
                sink.play();
            } else {
                sink.pause();
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_paused(&self) -> bool {
        self.sink.as_ref().map(|s| s.is_paused()).unwrap_or(true)
    }

    /// True once the loaded clip has played to its end
    pub fn is_finished(&self) -> bool {
        self.sink.as_ref().map(|s| s.empty()).unwrap_or(true)
    }
}

/// Opens audio output, logging instead of failing when no device is present
pub fn try_open_audio() -> Option<AudioPlayer> {
    match AudioPlayer::new() {
        Ok(player) => Some(player),
        Err(e) => {
            warn!("Audio output unavailable, playback disabled: {}", e);
            None
        }
    }
}
