//! Turn a pushed commit into a released container image.
//!
//! This is the facade crate: it owns the build [`pipeline`] and re-exports
//! the keel sub-crates it is assembled from.
//!
//! | Module | Crate | Description |
//! |--------|-------|-------------|
//! | (root) | `keel-core` | Configuration, push events, process types |
//! | [`build`] | `keel-build` | Staging, build-mode detection, slug handling |
//! | [`cloud`] | `keel-cloud` | git / docker commands and controller hooks |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use keel::cloud::{HostClient, HttpController};
//! use keel::{ConfigProvider, FileConfigProvider, Pipeline, PushEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FileConfigProvider::default().resolve()?;
//! let controller = HttpController::new(
//!     config.controller.base_url(),
//!     config.controller.require_builder_key()?,
//! );
//! let pipeline = Pipeline::new(&config, HostClient::new(), controller);
//!
//! let push = PushEvent::new("alice", "myapp.git", "4f2a9c1d7e3b5a60")?;
//! let outcome = pipeline.run(&push).await;
//! std::process::exit(outcome.exit_code().into());
//! # }
//! ```

pub mod error;
pub mod pipeline;

// Core types flattened into root namespace for convenience.
pub use keel_core::*;

pub use error::{BuildError, PipelineError, Stage, StagingError};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineState, ReleaseSummary};

/// Staging, build-mode detection, Dockerfile synthesis, and process types.
pub mod build {
    pub use keel_build::*;
}

/// git, docker, and controller operations.
pub mod cloud {
    pub use keel_cloud::*;
}
