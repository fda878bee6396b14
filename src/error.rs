use thiserror::Error;

use crate::emotion::ClassificationError;
use crate::render::RenderError;

/// The error type returned by the engine and its components.
#[derive(Debug, Error)]
pub enum Error {
    /// The text to synthesize was empty or contained only whitespace.
    #[error("input text is empty")]
    EmptyInput,

    /// The caller-supplied output filename has no usable file name component.
    #[error("invalid output filename '{0}'")]
    InvalidFilename(String),

    /// The remote sentiment classifier could not produce scores.
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// No voice profile is configured for the emotion label.
    #[error("no voice profile configured for emotion '{0}'")]
    UnknownEmotion(String),

    /// The engine or one of its backends is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The audio-rendering driver failed to produce the output file.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The SSML document could not be serialized.
    #[error("failed to serialize SSML: {0}")]
    Markup(#[from] xml::writer::Error),

    /// Reading or writing a file outside of the rendering driver failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A blocking synthesis task did not run to completion.
    #[error("synthesis task interrupted: {0}")]
    Interrupted(String),
}

/// The type returned by engine functions and methods.
pub type Result<T> = std::result::Result<T, Error>;
