//! Support for async operations running on Tokio.

mod engine;
#[cfg(windows)]
mod rt;

pub use engine::AsyncEngine;
#[cfg(windows)]
#[cfg_attr(docsrs, doc(cfg(windows)))]
pub use rt::BuilderExt;
