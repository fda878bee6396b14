//! SSML generation.
//!
//! The [`SsmlComposer`] describes a synthesized utterance as a Speech Synthesis Markup Language
//! document. The document is derived from the same parameters that were handed to the audio
//! driver, so the markup and the audio agree on rate, volume and pitch.

use crate::emotion::EmotionResult;
use crate::voice::{ModulatedParameters, VoiceProfile};
use crate::Result;

mod builder;
mod types;

pub use builder::SsmlBuilder;
pub use types::{BreakStrength, EmphasisLevel, Pause, RatePercent, SemitoneStep, VolumeLevel};

/// The namespace of SSML 1.0 documents.
pub const SSML_NAMESPACE: &str = "http://www.w3.org/2001/10/synthesis";

/// Builds SSML documents for emotionally modulated speech.
#[derive(Debug, Clone)]
pub struct SsmlComposer {
    namespace: String,
}

impl SsmlComposer {
    /// Creates a composer that declares the given namespace on the root element.
    pub fn new<S: Into<String>>(namespace: S) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Describes the given text, spoken with the applied parameters, as an SSML document.
    ///
    /// Rate is expressed relative to the profile's baseline, volume as a loudness bucket and pitch
    /// as a semitone offset from the profile's baseline pitch. The text is emphasized according to
    /// the emotion's intensity and may be followed by a pause.
    pub fn build(
        &self,
        text: &str,
        emotion: &EmotionResult,
        profile: &VoiceProfile,
        applied: &ModulatedParameters,
    ) -> Result<String> {
        let rate = RatePercent::relative(profile.rate, applied.rate);
        let volume = VolumeLevel::from_volume(applied.volume);
        let pitch = SemitoneStep::between(profile.pitch, applied.pitch);

        let mut builder = SsmlBuilder::new(&self.namespace);
        builder.start_prosody(rate, volume, pitch);

        match EmphasisLevel::from_intensity(emotion.intensity) {
            Some(level) => builder.start_emphasis(level).say(text.trim()).end_emphasis(),
            None => builder.say(text.trim()),
        };

        match Pause::for_emotion(emotion) {
            Some(Pause::Time(duration)) => builder.silence(duration),
            Some(Pause::Strength(strength)) => builder.pause(strength),
            None => &mut builder,
        };

        builder.end_prosody();
        Ok(builder.build()?)
    }
}

impl Default for SsmlComposer {
    fn default() -> Self {
        Self::new(SSML_NAMESPACE)
    }
}
