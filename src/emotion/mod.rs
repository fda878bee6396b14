//! Emotion detection.
//!
//! The [`EmotionDetector`] delegates the actual sentiment classification to a [`Classifier`] and
//! folds the resulting three-way score distribution, together with a few textual cues, into a
//! single [`EmotionResult`]: a coarse label and an intensity in the interval [0, 1].

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use tracing::debug;

mod classifier;

pub use classifier::{ClassificationError, Classifier, HuggingFaceClassifier, SentimentScores};

/// Words that make the detected emotion more intense, matched as case-insensitive substrings.
pub const EMPHASIS_WORDS: [&str; 5] = ["really", "very", "so", "extremely", "incredibly"];

const MAX_BONUS: f64 = 0.3;
const EXCLAMATION_BONUS: f64 = 0.06;
const EMPHASIS_BONUS: f64 = 0.05;
const QUESTION_BONUS: f64 = 0.03;
const PREVIEW_CHARS: usize = 160;

/// The coarse sentiment of a piece of text.
#[derive(
    Debug,
    Hash,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum EmotionLabel {
    Positive,
    Neutral,
    Negative,
}

impl EmotionLabel {
    /// Returns the canonical lowercase name of the label.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The emotion detected in a piece of text.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct EmotionResult {
    /// Which emotion was detected.
    pub label: EmotionLabel,
    /// How strongly the emotion should be expressed, in the interval [0, 1].
    pub intensity: f64,
}

impl EmotionResult {
    /// The result for text that carries no sentiment at all.
    pub const NEUTRAL: Self = Self {
        label: EmotionLabel::Neutral,
        intensity: 0.0,
    };
}

/// Turns text into an [`EmotionResult`] using a sentiment [`Classifier`].
pub struct EmotionDetector<C> {
    classifier: C,
}

impl<C: Classifier> EmotionDetector<C> {
    /// Creates a detector that classifies text with the given classifier.
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
        }
    }

    /// Returns the classifier used by this detector.
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Detects the emotion of the given text.
    ///
    /// Blank text is neutral and never reaches the classifier. Otherwise the classifier is called
    /// exactly once, and its failure is returned as-is.
    pub fn detect(&self, text: &str) -> Result<EmotionResult, ClassificationError> {
        let cleaned = collapse_whitespace(text);
        if cleaned.is_empty() {
            return Ok(EmotionResult::NEUTRAL);
        }

        debug!(
            chars = cleaned.chars().count(),
            preview = %preview(&cleaned),
            "submitting text for sentiment"
        );

        let scores = self.classifier.classify(&cleaned)?;
        let (label, base) = scores.winner();
        let bonus = intensity_bonus(&cleaned);
        let intensity = (base + bonus).clamp(0.0, 1.0);

        debug!(%label, intensity, base, bonus, "detected emotion");

        Ok(EmotionResult {
            label,
            intensity,
        })
    }
}

/// Computes how much punctuation and emphasis words raise the intensity of the given text.
///
/// Each exclamation mark adds 0.06, each occurrence of an [emphasis word](EMPHASIS_WORDS) 0.05,
/// and the presence of a question mark 0.03. The total never exceeds 0.3.
pub fn intensity_bonus(text: &str) -> f64 {
    let exclamations = text.matches('!').count();
    let question = text.contains('?');
    let lowered = text.to_lowercase();
    let emphasis: usize = EMPHASIS_WORDS.iter().map(|word| lowered.matches(word).count()).sum();

    let bonus = EXCLAMATION_BONUS * exclamations as f64
        + EMPHASIS_BONUS * emphasis as f64
        + if question { QUESTION_BONUS } else { 0.0 };
    bonus.min(MAX_BONUS)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let mut preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push('…');
    }
    preview
}
