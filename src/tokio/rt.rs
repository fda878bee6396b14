/// An extension for [`tokio::runtime::Builder`] to enable the SAPI speech driver.
///
/// This trait is [sealed](https://rust-lang.github.io/api-guidelines/future-proofing.html).
pub trait BuilderExt: private::Sealed {
    /// Ensures that every thread spawned by the runtime, including its blocking pool, initializes
    /// SAPI when started and deinitializes it when stopped.
    fn enable_sapi(&mut self) -> &mut Self;
}

impl BuilderExt for tokio::runtime::Builder {
    fn enable_sapi(&mut self) -> &mut Self {
        self.on_thread_start(|| {
            if let Err(err) = crate::render::sapi::initialize() {
                tracing::warn!(error = %err, "failed to initialize SAPI on runtime thread");
            }
        })
        .on_thread_stop(crate::render::sapi::finalize)
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for tokio::runtime::Builder {}
}
