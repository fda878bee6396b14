//! Audio rendering.
//!
//! The engine hands the modulated parameters to a [`Renderer`], which turns text into an audio
//! file. [`SpeechRenderer`] implements it on top of any [`VoiceEngine`]: a speech driver with
//! engine-global rate, volume and pitch settings. Each render runs inside a [`VoiceSession`], which
//! applies the per-call parameters and restores the driver's defaults when it goes out of scope,
//! whether the render succeeded or not.

use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::voice::ModulatedParameters;

pub mod espeak;
#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub mod sapi;

/// Why an audio file could not be rendered.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The driver could not be started, or the output could not be written.
    #[error("failed to render audio: {0}")]
    Io(#[from] io::Error),
    /// The driver reported a failure.
    #[error("speech driver failed: {0}")]
    Failed(String),
    /// The driver does not support the requested setting.
    #[error("speech driver does not support {0}")]
    Unsupported(String),
    /// A SAPI call failed.
    #[cfg(windows)]
    #[error("SAPI call failed: {0}")]
    Sapi(#[from] windows::core::Error),
}

/// Turns text into an audio file, spoken with the given parameters.
pub trait Renderer {
    /// Renders the text to the destination and returns the location of the written file.
    fn render(
        &mut self,
        text: &str,
        params: &ModulatedParameters,
        destination: &Path,
    ) -> Result<PathBuf, RenderError>;
}

/// A speech driver whose rate, volume and pitch settings apply to everything it renders.
///
/// Pitch is expressed on a 0 to 99 scale, 50 being the voice's natural pitch. Drivers that have
/// no notion of pitch keep the default implementations of [`pitch`](VoiceEngine::pitch) and
/// [`set_pitch`](VoiceEngine::set_pitch).
pub trait VoiceEngine {
    /// Returns the current rate of speech, in words per minute.
    fn rate(&self) -> Result<i32, RenderError>;
    /// Returns the current volume, in the interval [0, 1].
    fn volume(&self) -> Result<f64, RenderError>;
    /// Returns the current pitch, or `None` if the driver does not expose one.
    fn pitch(&self) -> Result<Option<i32>, RenderError> {
        Ok(None)
    }
    /// Sets the rate of speech, in words per minute.
    fn set_rate(&mut self, rate: i32) -> Result<(), RenderError>;
    /// Sets the volume, in the interval [0, 1].
    fn set_volume(&mut self, volume: f64) -> Result<(), RenderError>;
    /// Sets the pitch.
    fn set_pitch(&mut self, _pitch: i32) -> Result<(), RenderError> {
        Err(RenderError::Unsupported("pitch".to_string()))
    }
    /// Renders the text with the current settings and writes it to the destination.
    fn save_to_file(&mut self, text: &str, destination: &Path) -> Result<(), RenderError>;
}

/// Exclusive access to a [`VoiceEngine`] for the duration of one render.
///
/// The engine's settings are captured when the session is acquired and put back when it is
/// dropped.
pub struct VoiceSession<'e, E: VoiceEngine> {
    engine: &'e mut E,
    rate: i32,
    volume: f64,
    pitch: Option<i32>,
}

impl<'e, E: VoiceEngine> VoiceSession<'e, E> {
    /// Captures the engine's current settings.
    pub fn acquire(engine: &'e mut E) -> Result<Self, RenderError> {
        let rate = engine.rate()?;
        let volume = engine.volume()?;
        let pitch = engine.pitch()?;
        Ok(Self {
            engine,
            rate,
            volume,
            pitch,
        })
    }

    /// Applies the per-call parameters. A pitch the driver cannot apply is skipped.
    pub fn apply(&mut self, params: &ModulatedParameters) -> Result<(), RenderError> {
        self.engine.set_rate(params.rate)?;
        self.engine.set_volume(params.volume.clamp(0.0, 1.0))?;
        if let Some(pitch) = params.pitch {
            if let Err(err) = self.engine.set_pitch(pitch) {
                warn!(pitch, error = %err, "pitch not applied");
            }
        }
        Ok(())
    }
}

impl<'e, E: VoiceEngine> Deref for VoiceSession<'e, E> {
    type Target = E;
    fn deref(&self) -> &Self::Target {
        self.engine
    }
}

impl<'e, E: VoiceEngine> DerefMut for VoiceSession<'e, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
    }
}

impl<'e, E: VoiceEngine> Drop for VoiceSession<'e, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.set_rate(self.rate) {
            warn!(rate = self.rate, error = %err, "failed to restore default rate");
        }
        if let Err(err) = self.engine.set_volume(self.volume) {
            warn!(volume = self.volume, error = %err, "failed to restore default volume");
        }
        if let Some(pitch) = self.pitch {
            if let Err(err) = self.engine.set_pitch(pitch) {
                warn!(pitch, error = %err, "failed to restore default pitch");
            }
        }
    }
}

/// A [`Renderer`] that drives a [`VoiceEngine`].
pub struct SpeechRenderer<E> {
    engine: E,
}

impl<E: VoiceEngine> SpeechRenderer<E> {
    /// Creates a renderer that owns the given engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
        }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: VoiceEngine> Renderer for SpeechRenderer<E> {
    fn render(
        &mut self,
        text: &str,
        params: &ModulatedParameters,
        destination: &Path,
    ) -> Result<PathBuf, RenderError> {
        let destination = std::path::absolute(destination)?;
        debug!(destination = %destination.display(), "rendering speech");

        let mut session = VoiceSession::acquire(&mut self.engine)?;
        session.apply(params)?;
        session.save_to_file(text, &destination)?;
        Ok(destination)
    }
}

/// The speech driver native to the current platform.
#[cfg(windows)]
pub type SystemVoice = sapi::SapiEngine;

/// The speech driver native to the current platform.
#[cfg(not(windows))]
pub type SystemVoice = espeak::EspeakEngine;

/// Creates a renderer for the platform's speech driver. On Windows, SAPI must have been
/// initialized on the current thread.
pub fn system_renderer() -> Result<SpeechRenderer<SystemVoice>, RenderError> {
    #[cfg(windows)]
    let engine = sapi::SapiEngine::new()?;
    #[cfg(not(windows))]
    let engine = espeak::EspeakEngine::new();
    Ok(SpeechRenderer::new(engine))
}
