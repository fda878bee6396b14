use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::emotion::EmotionResult;

use super::{DeltaRange, VoiceProfile};

/// The slowest rate a modulated voice may speak at, in words per minute.
pub const MIN_RATE: i32 = 120;
/// The quietest volume a modulated voice may speak at.
pub const MIN_VOLUME: f64 = 0.3;
/// The loudest volume a modulated voice may speak at.
pub const MAX_VOLUME: f64 = 1.0;
/// The lowest pitch a modulated voice may speak at.
pub const MIN_PITCH: i32 = 30;

/// The synthesis parameters applied to a single request.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct ModulatedParameters {
    /// Speech rate, in words per minute. Never below [`MIN_RATE`].
    pub rate: i32,
    /// Speech volume, in the interval [[`MIN_VOLUME`], [`MAX_VOLUME`]].
    pub volume: f64,
    /// Driver-specific pitch, never below [`MIN_PITCH`]. When absent, the driver's default pitch
    /// is used.
    pub pitch: Option<i32>,
}

/// Linearly interpolates between the start and end of the range.
pub fn interpolate(range: DeltaRange, intensity: f64) -> f64 {
    range.start() + (range.end() - range.start()) * intensity
}

/// Pushes the profile's baseline parameters through their delta ranges by the emotion's intensity.
///
/// Pitch is only produced when the profile defines both a baseline pitch and a pitch range.
pub fn modulate(profile: &VoiceProfile, emotion: &EmotionResult) -> ModulatedParameters {
    let intensity = emotion.intensity;

    let rate_delta = interpolate(profile.rate_delta_range, intensity);
    let volume_delta = interpolate(profile.volume_delta_range, intensity);

    let rate = round(profile.rate as f64 + rate_delta).max(MIN_RATE);
    let volume = (profile.volume + volume_delta).clamp(MIN_VOLUME, MAX_VOLUME);
    let pitch = match (profile.pitch, profile.pitch_delta_range) {
        (Some(pitch), Some(range)) => {
            Some(round(pitch as f64 + interpolate(range, intensity)).max(MIN_PITCH))
        }
        _ => None,
    };

    debug!(profile = %profile.label, intensity, rate, volume, ?pitch, "modulated voice parameters");

    ModulatedParameters {
        rate,
        volume,
        pitch,
    }
}

// Halves round to even.
fn round(value: f64) -> i32 {
    value.round_ties_even() as i32
}

#[cfg(test)]
mod tests {
    use crate::emotion::EmotionLabel;
    use crate::voice::EmotionMapping;

    use super::*;

    fn emotion(label: EmotionLabel, intensity: f64) -> EmotionResult {
        EmotionResult {
            label,
            intensity,
        }
    }

    fn modulate_default(label: EmotionLabel, intensity: f64) -> ModulatedParameters {
        let mapping = EmotionMapping::default();
        modulate(mapping.profile(label).unwrap(), &emotion(label, intensity))
    }

    #[test]
    fn test_interpolate_endpoints() {
        let ranges = [DeltaRange(0.0, 45.0), DeltaRange(-5.0, 5.0), DeltaRange(0.0, -0.15)];
        for range in ranges {
            assert_eq!(range.start(), interpolate(range, 0.0));
            assert_eq!(range.end(), interpolate(range, 1.0));
        }
    }

    #[test]
    fn test_interpolate_is_monotonic() {
        let rising = DeltaRange(-3.0, 4.0);
        let falling = DeltaRange(0.0, -40.0);
        let steps: Vec<f64> = (0..=20).map(|step| step as f64 / 20.0).collect();
        for pair in steps.windows(2) {
            assert!(interpolate(rising, pair[0]) <= interpolate(rising, pair[1]));
            assert!(interpolate(falling, pair[0]) >= interpolate(falling, pair[1]));
        }
    }

    #[test]
    fn test_positive_full_intensity() {
        assert_eq!(
            ModulatedParameters {
                rate: 231,
                volume: 1.0,
                pitch: Some(82),
            },
            modulate_default(EmotionLabel::Positive, 1.0)
        );
    }

    #[test]
    fn test_negative_zero_intensity_is_baseline() {
        assert_eq!(
            ModulatedParameters {
                rate: 160,
                volume: 0.8,
                pitch: Some(58),
            },
            modulate_default(EmotionLabel::Negative, 0.0)
        );
    }

    #[test]
    fn test_negative_full_intensity() {
        let params = modulate_default(EmotionLabel::Negative, 1.0);
        assert_eq!(120, params.rate);
        assert!((params.volume - 0.65).abs() < 1e-9);
        assert_eq!(Some(46), params.pitch);
    }

    #[test]
    fn test_neutral_midpoint() {
        let params = modulate_default(EmotionLabel::Neutral, 0.5);
        assert_eq!(175, params.rate);
        assert!((params.volume - 0.88).abs() < 1e-9);
        // 64 + 0.5 rounds to even
        assert_eq!(Some(64), params.pitch);
    }

    #[test]
    fn test_bounds_hold_for_extreme_profiles() {
        let profile = VoiceProfile {
            label: "whisper".to_string(),
            rate: 90,
            volume: 0.1,
            pitch: Some(20),
            rate_delta_range: DeltaRange(-50.0, 0.0),
            volume_delta_range: DeltaRange(0.0, 2.0),
            pitch_delta_range: Some(DeltaRange(-10.0, 0.0)),
        };
        for step in 0..=10 {
            let params = modulate(&profile, &emotion(EmotionLabel::Neutral, step as f64 / 10.0));
            assert!(params.rate >= MIN_RATE);
            assert!((MIN_VOLUME..=MAX_VOLUME).contains(&params.volume));
            assert!(params.pitch.unwrap() >= MIN_PITCH);
        }
    }

    #[test]
    fn test_pitch_requires_baseline_and_range() {
        let mut profile = EmotionMapping::default().get("positive").unwrap().clone();
        profile.pitch_delta_range = None;
        let params = modulate(&profile, &emotion(EmotionLabel::Positive, 1.0));
        assert_eq!(None, params.pitch);
        assert_eq!(231, params.rate);

        profile.pitch = None;
        profile.pitch_delta_range = Some(DeltaRange(0.0, 12.0));
        let params = modulate(&profile, &emotion(EmotionLabel::Positive, 1.0));
        assert_eq!(None, params.pitch);
    }

    #[test]
    fn test_modulation_is_pure() {
        let mapping = EmotionMapping::default();
        let profile = mapping.get("neutral").unwrap();
        let emotion = emotion(EmotionLabel::Neutral, 0.37);
        assert_eq!(modulate(profile, &emotion), modulate(profile, &emotion));
    }
}
