//! Rendering through the `espeak-ng` command-line synthesizer.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, error};

use super::{RenderError, VoiceEngine};

const DEFAULT_PROGRAM: &str = "espeak-ng";
const DEFAULT_RATE: i32 = 175;
const DEFAULT_VOLUME: f64 = 1.0;
const DEFAULT_PITCH: i32 = 50;
const MAX_PITCH: i32 = 99;

/// Speech driver that runs `espeak-ng` once per render and writes a WAV file.
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    program: PathBuf,
    voice: Option<String>,
    rate: i32,
    volume: f64,
    pitch: i32,
}

impl EspeakEngine {
    /// Creates a driver that runs `espeak-ng` from the search path, with its default voice.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            voice: None,
            rate: DEFAULT_RATE,
            volume: DEFAULT_VOLUME,
            pitch: DEFAULT_PITCH,
        }
    }

    /// Runs the given executable instead of `espeak-ng`.
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// Speaks with the named voice, e.g. `en-us`.
    pub fn with_voice<S: Into<String>>(mut self, voice: S) -> Self {
        self.voice = Some(voice.into());
        self
    }

    fn args(&self, destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--stdin".into(),
            "-w".into(),
            destination.as_os_str().to_owned(),
            "-s".into(),
            self.rate.to_string().into(),
            "-a".into(),
            ((self.volume * 100.0).round() as i32).to_string().into(),
            "-p".into(),
            self.pitch.to_string().into(),
        ];
        if let Some(voice) = self.voice.as_ref() {
            args.push("-v".into());
            args.push(voice.into());
        }
        args
    }
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceEngine for EspeakEngine {
    fn rate(&self) -> Result<i32, RenderError> {
        Ok(self.rate)
    }

    fn volume(&self) -> Result<f64, RenderError> {
        Ok(self.volume)
    }

    fn pitch(&self) -> Result<Option<i32>, RenderError> {
        Ok(Some(self.pitch))
    }

    fn set_rate(&mut self, rate: i32) -> Result<(), RenderError> {
        if rate <= 0 {
            return Err(RenderError::Unsupported(format!("a rate of {} words per minute", rate)));
        }
        self.rate = rate;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), RenderError> {
        self.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_pitch(&mut self, pitch: i32) -> Result<(), RenderError> {
        if !(0..=MAX_PITCH).contains(&pitch) {
            return Err(RenderError::Unsupported(format!("pitch {} outside 0..={}", pitch, MAX_PITCH)));
        }
        self.pitch = pitch;
        Ok(())
    }

    fn save_to_file(&mut self, text: &str, destination: &Path) -> Result<(), RenderError> {
        let args = self.args(destination);
        debug!(program = %self.program.display(), ?args, "running speech synthesizer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                error!(program = %self.program.display(), error = %err, "failed to start speech synthesizer");
                RenderError::Io(err)
            })?;

        // The child is reaped even when it stops reading early. Its exit status explains the
        // failure better than the broken pipe does.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = %output.status, %stderr, "speech synthesizer failed");
            return Err(RenderError::Failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr
            )));
        }
        if let Err(err) = written {
            error!(error = %err, "failed to pass text to speech synthesizer");
            return Err(RenderError::Io(err));
        }
        Ok(())
    }
}
