//! Core types and configuration for keel.
//!
//! This crate defines the builder configuration ([`BuilderConfig`]) and the
//! provider seam that resolves it, the push being built ([`PushEvent`]) with
//! its on-disk [`RepoLayout`], the process-type map ([`ProcessTypes`]), and
//! shared error types.

pub mod config;
pub mod error;
pub mod procfile;
pub mod push;

pub use config::{
    BuildConfig, BuilderConfig, ConfigProvider, ControllerConfig, FileConfigProvider, PathsConfig,
    RegistryConfig,
};
pub use error::{Error, Result};
pub use procfile::{ProcessTypes, ProcfileError};
pub use push::{PushEvent, RepoLayout};
