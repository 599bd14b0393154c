//! Looping alarm tone.
//!
//! [`Tone`] is a two-state capability (playing / stopped) over a
//! [`ToneBackend`]. Both transitions are idempotent. When no output device
//! or asset is available the tone is inert: it keeps tracking the logical
//! state but makes no sound.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use thiserror::Error;

use crate::alarm::model::AlarmSettings;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    Device(#[from] rodio::StreamError),
    #[error("unable to read tone asset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to decode tone asset: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
    #[error("unable to open playback sink: {0}")]
    Sink(#[from] rodio::PlayError),
}

pub trait ToneBackend {
    fn start(&mut self) -> Result<(), AudioError>;
    fn halt(&mut self);
}

pub struct Tone {
    backend: Option<Box<dyn ToneBackend>>,
    playing: bool,
    inert_reason: Option<String>,
}

impl Tone {
    pub fn new(backend: Box<dyn ToneBackend>) -> Self {
        Self {
            backend: Some(backend),
            playing: false,
            inert_reason: None,
        }
    }

    pub fn inert(reason: impl Into<String>) -> Self {
        Self {
            backend: None,
            playing: false,
            inert_reason: Some(reason.into()),
        }
    }

    /// Returns true when this call started playback.
    pub fn play(&mut self) -> bool {
        if self.playing {
            return false;
        }
        self.playing = true;
        if let Some(backend) = self.backend.as_mut()
            && let Err(err) = backend.start()
        {
            tracing::warn!(%err, "alarm tone failed to start, continuing silently");
            self.backend = None;
            self.inert_reason = Some(err.to_string());
        }
        true
    }

    /// Returns true when this call stopped playback.
    pub fn stop(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.playing = false;
        if let Some(backend) = self.backend.as_mut() {
            backend.halt();
        }
        true
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn inert_reason(&self) -> Option<&str> {
        self.inert_reason.as_deref()
    }
}

impl Drop for Tone {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone)]
enum ToneAsset {
    Sine { frequency_hz: f32 },
    Clip(Arc<[u8]>),
}

pub struct RodioBackend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    asset: ToneAsset,
    volume: f32,
}

impl RodioBackend {
    pub fn open(settings: &AlarmSettings) -> Result<Self, AudioError> {
        let asset = match settings.tone_path.as_deref() {
            Some(path) => ToneAsset::Clip(load_clip(path)?),
            None => ToneAsset::Sine {
                frequency_hz: settings.tone_frequency_hz,
            },
        };
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            asset,
            volume: settings.volume,
        })
    }
}

impl ToneBackend for RodioBackend {
    fn start(&mut self) -> Result<(), AudioError> {
        let sink = Sink::try_new(&self.handle)?;
        sink.set_volume(self.volume);
        match &self.asset {
            ToneAsset::Sine { frequency_hz } => sink.append(SineWave::new(*frequency_hz)),
            ToneAsset::Clip(bytes) => {
                let source = Decoder::new(Cursor::new(Arc::clone(bytes)))?;
                sink.append(source.repeat_infinite());
            }
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn halt(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

/// Reads and test-decodes the asset once so playback never touches the disk.
fn load_clip(path: &Path) -> Result<Arc<[u8]>, AudioError> {
    let bytes: Arc<[u8]> = fs::read(path)
        .map_err(|source| AudioError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .into();
    Decoder::new(Cursor::new(Arc::clone(&bytes)))?;
    Ok(bytes)
}

/// Builds the session tone. Failures are logged and yield an inert tone.
pub fn open_tone(settings: &AlarmSettings, enabled: bool) -> Tone {
    if !enabled {
        return Tone::inert("audio disabled");
    }
    match RodioBackend::open(settings) {
        Ok(backend) => {
            tracing::info!(
                asset = ?settings.tone_path,
                volume = settings.volume,
                "alarm tone ready"
            );
            Tone::new(Box::new(backend))
        }
        Err(err) => {
            tracing::warn!(%err, "alarm tone unavailable, alarms will be silent");
            Tone::inert(err.to_string())
        }
    }
}
