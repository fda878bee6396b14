//! Voice profiles.
//!
//! A [`VoiceProfile`] describes the baseline voice used for one emotion, along with how far the
//! emotion's intensity may push each parameter away from that baseline. The profiles are collected
//! in an [`EmotionMapping`], built once and shared read-only by every request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::emotion::EmotionLabel;
use crate::{Error, Result};

mod modulate;

pub use modulate::{
    interpolate, modulate, ModulatedParameters, MAX_VOLUME, MIN_PITCH, MIN_RATE, MIN_VOLUME,
};

/// The range a parameter delta moves through as intensity goes from 0 to 1. The end of the range
/// may be lower than its start.
#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeltaRange(pub f64, pub f64);

impl DeltaRange {
    /// The delta applied at intensity 0.
    pub fn start(&self) -> f64 {
        self.0
    }

    /// The delta applied at intensity 1.
    pub fn end(&self) -> f64 {
        self.1
    }
}

/// Baseline synthesis parameters for an emotion, and their modulation ranges.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Name of the emotion this profile applies to.
    pub label: String,
    /// Speech rate, in words per minute.
    pub rate: i32,
    /// Speech volume, in the interval [0, 1].
    pub volume: f64,
    /// Driver-specific pitch. When absent, the driver's default pitch is used.
    #[serde(default)]
    pub pitch: Option<i32>,
    /// How far intensity moves the rate, in words per minute.
    #[serde(default)]
    pub rate_delta_range: DeltaRange,
    /// How far intensity moves the volume.
    #[serde(default)]
    pub volume_delta_range: DeltaRange,
    /// How far intensity moves the pitch. Pitch is left to the driver when absent.
    #[serde(default)]
    pub pitch_delta_range: Option<DeltaRange>,
}

/// Maps emotion labels to voice profiles. Lookups are case-insensitive.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(from = "HashMap<String, VoiceProfile>", into = "HashMap<String, VoiceProfile>")]
pub struct EmotionMapping {
    profiles: HashMap<String, VoiceProfile>,
}

impl EmotionMapping {
    /// Builds a mapping keyed by each profile's label.
    pub fn new<I: IntoIterator<Item = VoiceProfile>>(profiles: I) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.label.to_lowercase(), profile))
                .collect(),
        }
    }

    /// Returns the profile configured for the given emotion.
    pub fn get(&self, emotion: &str) -> Result<&VoiceProfile> {
        self.profiles
            .get(&emotion.to_lowercase())
            .ok_or_else(|| Error::UnknownEmotion(emotion.to_string()))
    }

    /// Returns the profile configured for the given label.
    pub fn profile(&self, label: EmotionLabel) -> Result<&VoiceProfile> {
        self.get(label.as_str())
    }

    /// Fails with the first detectable label that has no profile.
    pub fn ensure_complete(&self) -> Result<()> {
        [EmotionLabel::Positive, EmotionLabel::Neutral, EmotionLabel::Negative]
            .into_iter()
            .try_for_each(|label| self.profile(label).map(|_| ()))
    }

    /// Iterates over the configured profiles, in no particular order.
    pub fn profiles(&self) -> impl Iterator<Item = &VoiceProfile> {
        self.profiles.values()
    }
}

impl Default for EmotionMapping {
    fn default() -> Self {
        Self::new([
            VoiceProfile {
                label: "positive".to_string(),
                rate: 186,
                volume: 0.95,
                pitch: Some(70),
                rate_delta_range: DeltaRange(0.0, 45.0),
                volume_delta_range: DeltaRange(0.0, 0.12),
                pitch_delta_range: Some(DeltaRange(0.0, 12.0)),
            },
            VoiceProfile {
                label: "neutral".to_string(),
                rate: 175,
                volume: 0.88,
                pitch: Some(64),
                rate_delta_range: DeltaRange(-5.0, 5.0),
                volume_delta_range: DeltaRange(-0.04, 0.04),
                pitch_delta_range: Some(DeltaRange(-3.0, 4.0)),
            },
            VoiceProfile {
                label: "negative".to_string(),
                rate: 160,
                volume: 0.8,
                pitch: Some(58),
                rate_delta_range: DeltaRange(0.0, -40.0),
                volume_delta_range: DeltaRange(0.0, -0.15),
                pitch_delta_range: Some(DeltaRange(0.0, -12.0)),
            },
        ])
    }
}

impl From<HashMap<String, VoiceProfile>> for EmotionMapping {
    fn from(profiles: HashMap<String, VoiceProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|(label, profile)| (label.to_lowercase(), profile)).collect(),
        }
    }
}

impl From<EmotionMapping> for HashMap<String, VoiceProfile> {
    fn from(mapping: EmotionMapping) -> Self {
        mapping.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let mapping = EmotionMapping::default();
        mapping.ensure_complete().unwrap();

        let positive = mapping.get("positive").unwrap();
        assert_eq!(186, positive.rate);
        assert_eq!(0.95, positive.volume);
        assert_eq!(Some(70), positive.pitch);
        assert_eq!(DeltaRange(0.0, 45.0), positive.rate_delta_range);

        let negative = mapping.profile(EmotionLabel::Negative).unwrap();
        assert_eq!(160, negative.rate);
        assert_eq!(DeltaRange(0.0, -0.15), negative.volume_delta_range);
        assert_eq!(Some(DeltaRange(0.0, -12.0)), negative.pitch_delta_range);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mapping = EmotionMapping::default();
        assert_eq!("neutral", mapping.get("NeUtRaL").unwrap().label);
    }

    #[test]
    fn test_unknown_emotion() {
        let mapping = EmotionMapping::default();
        assert!(matches!(mapping.get("furious"), Err(Error::UnknownEmotion(label)) if label == "furious"));
    }

    #[test]
    fn test_incomplete_mapping() {
        let mapping = EmotionMapping::new(
            EmotionMapping::default().profiles().filter(|profile| profile.label != "neutral").cloned(),
        );
        assert!(matches!(mapping.ensure_complete(), Err(Error::UnknownEmotion(label)) if label == "neutral"));
    }

    #[test]
    fn test_deserialize_from_json() {
        let mapping: EmotionMapping = serde_json::from_str(
            r#"{
                "Positive": {"label": "positive", "rate": 200, "volume": 1.0},
                "neutral": {"label": "neutral", "rate": 170, "volume": 0.9, "pitch": 50,
                            "pitch_delta_range": [-2, 2]},
                "negative": {"label": "negative", "rate": 150, "volume": 0.7,
                             "rate_delta_range": [0, -30]}
            }"#,
        )
        .unwrap();
        mapping.ensure_complete().unwrap();

        let positive = mapping.profile(EmotionLabel::Positive).unwrap();
        assert_eq!(None, positive.pitch);
        assert_eq!(DeltaRange(0.0, 0.0), positive.rate_delta_range);
        assert_eq!(Some(DeltaRange(-2.0, 2.0)), mapping.get("neutral").unwrap().pitch_delta_range);
        assert_eq!(DeltaRange(0.0, -30.0), mapping.get("negative").unwrap().rate_delta_range);
    }
}
