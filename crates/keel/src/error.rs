use std::fmt;
use std::path::PathBuf;

use keel_build::dockerfile::DockerfileError;
use keel_build::stage::StageError;
use keel_cloud::{ControllerError, HostError};

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Staging,
    ConfigFetch,
    Build,
    Registry,
    Release,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staging => "staging",
            Self::ConfigFetch => "config fetch",
            Self::Build => "build",
            Self::Registry => "registry push",
            Self::Release => "release",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one push. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to stage commit")]
    Staging(#[from] StagingError),

    #[error("failed to fetch build config")]
    ConfigFetch(#[source] ControllerError),

    #[error("build failed")]
    Build(#[from] BuildError),

    #[error("failed to push image to registry")]
    Registry(#[source] HostError),

    #[error("controller rejected the release")]
    Release(#[source] ControllerError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Staging(_) => Stage::Staging,
            Self::ConfigFetch(_) => Stage::ConfigFetch,
            Self::Build(_) => Stage::Build,
            Self::Registry(_) => Stage::Registry,
            Self::Release(_) => Stage::Release,
        }
    }

    /// Controller response body, for failures the controller explained.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::ConfigFetch(e) | Self::Release(e) => e.response_body(),
            _ => None,
        }
    }

    /// The error and its whole `source()` chain on one line.
    pub fn message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to lock {path}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Archive(#[from] HostError),

    #[error(transparent)]
    Tree(#[from] StageError),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Dockerfile(#[from] DockerfileError),

    #[error("failed to create cache directory {path}")]
    CreateCache {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("builder container exited with status {code}")]
    BuilderExit { code: i64 },

    #[error("builder container did not finish within {secs}s")]
    TimedOut { secs: u64 },
}
