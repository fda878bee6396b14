use std::fmt::Display;
use std::time::Duration;

use strum_macros::IntoStaticStr;

use crate::emotion::{EmotionLabel, EmotionResult};

macro_rules! decl_clamped_int {
    {$(#[$meta:meta])* $name:ident($base:ty) in $min:literal..$max:literal} => {
        $(#[$meta])*
        #[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
        pub struct $name($base);

        impl $name {
            /// Clamps the given value to the interval
            #[doc = concat!("[", stringify!($min), ", ", stringify!($max), "]")]
            /// and constructs a new instance from it.
            pub fn new(value: $base) -> Self {
                Self(value.clamp($min, $max))
            }

            /// Returns the value encapsulated by this instance.
            pub fn value(&self) -> $base {
                self.0
            }
        }

        impl From<$base> for $name {
            fn from(source: $base) -> Self {
                Self::new(source)
            }
        }

        impl From<$name> for $base {
            fn from(source: $name) -> Self {
                source.0
            }
        }
    };
}

decl_clamped_int! {
    /// Speech rate as a percentage of the voice's baseline rate, in the interval [50, 200].
    RatePercent(i32) in 50..200
}

decl_clamped_int! {
    /// Pitch offset from the voice's baseline, in semitones, in the interval [-20, 20].
    SemitoneStep(i32) in -20..20
}

impl RatePercent {
    /// Expresses the applied rate relative to the baseline. A non-positive baseline yields 100%.
    pub fn relative(baseline: i32, applied: i32) -> Self {
        if baseline <= 0 {
            return Self(100);
        }
        let percent = (applied as f64 / baseline as f64 * 100.0).round_ties_even();
        Self::new(percent as i32)
    }
}

impl Display for RatePercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl SemitoneStep {
    /// Returns the offset of the applied pitch from the baseline, or `None` when either pitch is
    /// undefined or they are equal.
    pub fn between(baseline: Option<i32>, applied: Option<i32>) -> Option<Self> {
        match (baseline, applied) {
            (Some(baseline), Some(applied)) if applied != baseline => {
                Some(Self::new(applied - baseline))
            }
            _ => None,
        }
    }
}

impl Display for SemitoneStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+}st", self.0)
    }
}

/// Qualitative loudness of speech.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, IntoStaticStr)]
#[allow(missing_docs)]
pub enum VolumeLevel {
    #[strum(serialize = "x-soft")]
    XSoft,
    #[strum(serialize = "soft")]
    Soft,
    #[strum(serialize = "medium")]
    Medium,
    #[strum(serialize = "loud")]
    Loud,
    #[strum(serialize = "x-loud")]
    XLoud,
}

impl VolumeLevel {
    /// Buckets a volume in the interval [0, 1].
    pub fn from_volume(volume: f64) -> Self {
        if volume >= 0.95 {
            Self::XLoud
        } else if volume >= 0.85 {
            Self::Loud
        } else if volume >= 0.7 {
            Self::Medium
        } else if volume >= 0.5 {
            Self::Soft
        } else {
            Self::XSoft
        }
    }

    pub(super) fn ssml_value(&self) -> &'static str {
        self.into()
    }
}

/// How strongly a span of text is stressed.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum EmphasisLevel {
    Moderate,
    Strong,
}

impl EmphasisLevel {
    /// Picks the emphasis for an emotion intensity. Intensities below 0.35 get none.
    pub fn from_intensity(intensity: f64) -> Option<Self> {
        if intensity >= 0.65 {
            Some(Self::Strong)
        } else if intensity >= 0.35 {
            Some(Self::Moderate)
        } else {
            None
        }
    }

    pub(super) fn ssml_value(&self) -> &'static str {
        self.into()
    }
}

/// Relative strength of a prosodic break. Only the medium strength is ever emitted.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, IntoStaticStr)]
#[allow(missing_docs)]
pub enum BreakStrength {
    #[strum(serialize = "medium")]
    Medium,
}

impl BreakStrength {
    pub(super) fn ssml_value(&self) -> &'static str {
        self.into()
    }
}

/// A pause appended after the spoken text.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Pause {
    /// A silence of the given duration.
    Time(Duration),
    /// A break of the given strength, with the duration left to the synthesizer.
    Strength(BreakStrength),
}

impl Pause {
    /// Negative speech always trails off with a 250ms silence. Positive speech gets a medium break
    /// once its intensity reaches 0.5. Everything else flows on without a pause.
    pub fn for_emotion(emotion: &EmotionResult) -> Option<Self> {
        match emotion.label {
            EmotionLabel::Negative => Some(Self::Time(Duration::from_millis(250))),
            EmotionLabel::Positive if emotion.intensity >= 0.5 => {
                Some(Self::Strength(BreakStrength::Medium))
            }
            _ => None,
        }
    }
}
