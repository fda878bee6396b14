#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Turns text into emotionally inflected speech.
//!
//! # Overview
//!
//! Every request goes through the same pipeline:
//!
//! 1. The [emotion] module asks a sentiment [`Classifier`](emotion::Classifier) to score the text,
//!    and folds the scores and a few textual cues (exclamation marks, emphasis words) into a
//!    label and an intensity.
//! 2. The [voice] module looks up the [`VoiceProfile`](voice::VoiceProfile) configured for the
//!    label and moves its rate, volume and pitch through their ranges according to the intensity.
//! 3. The [render] module speaks the text with those parameters and writes an audio file.
//! 4. The [ssml] module describes the same utterance as an SSML document.
//!
//! [`EmpathyEngine`] sequences these steps and returns everything that was used and produced.
//!
//! # Backends
//!
//! Classification is delegated to the Hugging Face inference API by default. Audio is rendered
//! with SAPI on Windows and with `espeak-ng` elsewhere. Both backends sit behind traits, so other
//! services and drivers can be plugged in.
//!
//! The audio drivers have engine-global settings. The engine serializes renders and restores the
//! driver's defaults after each one, so concurrent requests never hear each other's parameters.
//!
//! # Async
//!
//! With the `tokio-rt` feature, [`tokio::AsyncEngine`] runs requests on Tokio's blocking pool.

pub mod config;
pub mod emotion;
mod engine;
mod error;
pub mod render;
pub mod ssml;
pub mod voice;

#[cfg(feature = "tokio-rt")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-rt")))]
pub mod tokio;

pub use config::{ClassifierConfig, EngineConfig};
pub use engine::{EmpathyEngine, EmpathyResponse, SynthesisRequest, SynthesisResponse};
pub use error::{Error, Result};
