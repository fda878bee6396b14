use std::ops::Deref;
use std::sync::Arc;

use tokio::task::spawn_blocking;

use crate::emotion::Classifier;
use crate::engine::{EmpathyEngine, EmpathyResponse, SynthesisRequest, SynthesisResponse};
use crate::render::Renderer;
use crate::{Error, Result};

/// An [`EmpathyEngine`] whose requests can be awaited.
///
/// Each request runs on Tokio's blocking thread pool, since classification and rendering both
/// block. Cloning the engine is cheap; all clones share the same backends.
///
/// NOTE: [`HuggingFaceClassifier`](crate::emotion::HuggingFaceClassifier) uses a blocking HTTP
/// client, which must be neither created nor dropped on a runtime worker thread. Build the engine
/// before entering the runtime, and drop the last clone outside of it.
pub struct AsyncEngine<C, R> {
    inner: Arc<EmpathyEngine<C, R>>,
}

impl<C, R> AsyncEngine<C, R>
where
    C: Classifier + Send + Sync + 'static,
    R: Renderer + Send + 'static,
{
    /// Wraps the given engine.
    pub fn new(engine: EmpathyEngine<C, R>) -> Self {
        Self {
            inner: Arc::new(engine),
        }
    }

    /// Asynchronous version of [`EmpathyEngine::speak`].
    pub async fn speak(&self, text: String, filename: Option<String>) -> Result<EmpathyResponse> {
        let engine = Arc::clone(&self.inner);
        spawn_blocking(move || engine.speak(&text, filename.as_deref()))
            .await
            .map_err(|err| Error::Interrupted(err.to_string()))?
    }

    /// Asynchronous version of [`EmpathyEngine::synthesize`].
    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse> {
        let engine = Arc::clone(&self.inner);
        spawn_blocking(move || engine.synthesize(&request))
            .await
            .map_err(|err| Error::Interrupted(err.to_string()))?
    }
}

impl<C, R> Clone for AsyncEngine<C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, R> Deref for AsyncEngine<C, R> {
    type Target = EmpathyEngine<C, R>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
