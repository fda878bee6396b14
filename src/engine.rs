//! Orchestration of a synthesis request.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::emotion::{Classifier, EmotionDetector, EmotionLabel, EmotionResult, HuggingFaceClassifier};
use crate::render::{self, Renderer, SpeechRenderer, SystemVoice};
use crate::ssml::SsmlComposer;
use crate::voice::{modulate, EmotionMapping, ModulatedParameters, VoiceProfile};
use crate::{Error, Result};

/// Everything produced for one utterance. The audio file and the SSML document were derived from
/// the same parameters.
#[derive(Debug, Clone, Serialize)]
pub struct EmpathyResponse {
    /// Absolute location of the rendered audio file.
    pub audio_path: PathBuf,
    /// The detected emotion.
    pub emotion: EmotionResult,
    /// The profile the parameters were derived from.
    pub voice_profile: VoiceProfile,
    /// The parameters handed to the audio driver.
    pub parameters: ModulatedParameters,
    /// SSML description of the utterance.
    pub ssml: String,
}

/// A synthesis request as received from a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Text to speak. Must not be blank.
    pub text: String,
    /// Name of the audio file to write in the output directory.
    #[serde(default)]
    pub filename: Option<String>,
    /// Whether to return the SSML document.
    #[serde(default = "default_include_ssml")]
    pub include_ssml: bool,
}

impl SynthesisRequest {
    /// Creates a request for the given text, with the default file name.
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            filename: None,
            include_ssml: default_include_ssml(),
        }
    }
}

/// The flattened outcome of a [`SynthesisRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResponse {
    /// The detected emotion.
    pub emotion: EmotionLabel,
    /// Intensity of the detected emotion.
    pub intensity: f64,
    /// Applied rate, in words per minute.
    pub rate: i32,
    /// Applied volume.
    pub volume: f64,
    /// Applied pitch, absent when the driver default was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<i32>,
    /// Location of the rendered audio file.
    pub audio_path: PathBuf,
    /// SSML description of the utterance, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
}

/// Turns text into emotionally modulated speech.
///
/// The engine is stateless between requests and can be shared between threads. Renders are
/// serialized, since the audio driver's settings apply to everything it renders.
pub struct EmpathyEngine<C, R> {
    mapping: EmotionMapping,
    detector: EmotionDetector<C>,
    renderer: Mutex<R>,
    composer: SsmlComposer,
    output_dir: PathBuf,
    write_ssml_sidecar: bool,
}

impl<C: Classifier, R: Renderer> EmpathyEngine<C, R> {
    /// Creates an engine with the given backends. Fails if the voice profile table does not cover
    /// every emotion, or if the output directory cannot be created.
    pub fn new(config: &EngineConfig, classifier: C, renderer: R) -> Result<Self> {
        let mapping = config.mapping();
        mapping.ensure_complete()?;
        fs::create_dir_all(&config.output_dir)?;
        debug!(output_dir = %config.output_dir.display(), "engine ready");

        Ok(Self {
            mapping,
            detector: EmotionDetector::new(classifier),
            renderer: Mutex::new(renderer),
            composer: SsmlComposer::default(),
            output_dir: config.output_dir.clone(),
            write_ssml_sidecar: config.write_ssml_sidecar,
        })
    }

    /// Returns the voice profile table.
    pub fn mapping(&self) -> &EmotionMapping {
        &self.mapping
    }

    /// Returns the directory audio files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Speaks the text with a voice matching its emotion.
    ///
    /// The audio file is named `filename` when given, reduced to its final path component, and
    /// `empathy_<emotion>.wav` otherwise.
    pub fn speak(&self, text: &str, filename: Option<&str>) -> Result<EmpathyResponse> {
        let emotion = self.detector.detect(text)?;
        let profile = self.mapping.profile(emotion.label)?;
        let parameters = modulate(profile, &emotion);

        let filename = match filename {
            Some(filename) => sanitize_filename(filename)?,
            None => format!("empathy_{}.wav", emotion.label),
        };
        let ssml = self.composer.build(text, &emotion, profile, &parameters)?;

        let audio_path = {
            let mut renderer = self.renderer.lock().unwrap_or_else(PoisonError::into_inner);
            renderer.render(text, &parameters, &self.output_dir.join(&filename))?
        };

        if self.write_ssml_sidecar {
            let ssml_path = sidecar_path(&audio_path);
            fs::write(&ssml_path, &ssml)?;
            debug!(path = %ssml_path.display(), "wrote SSML");
        }

        info!(
            emotion = %emotion.label,
            intensity = emotion.intensity,
            rate = parameters.rate,
            volume = parameters.volume,
            pitch = ?parameters.pitch,
            path = %audio_path.display(),
            "synthesized speech"
        );

        Ok(EmpathyResponse {
            audio_path,
            emotion,
            voice_profile: profile.clone(),
            parameters,
            ssml,
        })
    }

    /// Handles a caller request. Blank text is rejected before anything else happens.
    pub fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let response = self.speak(text, request.filename.as_deref())?;
        Ok(SynthesisResponse {
            emotion: response.emotion.label,
            intensity: response.emotion.intensity,
            rate: response.parameters.rate,
            volume: response.parameters.volume,
            pitch: response.parameters.pitch,
            audio_path: response.audio_path,
            ssml: request.include_ssml.then_some(response.ssml),
        })
    }
}

impl EmpathyEngine<HuggingFaceClassifier, SpeechRenderer<SystemVoice>> {
    /// Creates an engine that classifies with the Hugging Face inference API and speaks with the
    /// platform's speech driver.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let classifier = HuggingFaceClassifier::new(&config.classifier)?;
        let renderer = render::system_renderer()?;
        Self::new(config, classifier, renderer)
    }
}

fn sanitize_filename(filename: &str) -> Result<String> {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidFilename(filename.to_string()))
}

// Appends to the whole file name so the sidecar never replaces the audio file.
fn sidecar_path(audio_path: &Path) -> PathBuf {
    let mut path = audio_path.as_os_str().to_owned();
    path.push(".ssml");
    PathBuf::from(path)
}

fn default_include_ssml() -> bool {
    true
}
