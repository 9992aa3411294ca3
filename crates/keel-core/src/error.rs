use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidOverride {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid {key}: {value:?} ({reason})")]
    InvalidConfig {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("builder key not configured; set [controller].builder_key or KEEL_BUILDER_KEY")]
    MissingBuilderKey,

    // ── Push arguments ──
    #[error("{field} must not be empty")]
    EmptyPushField { field: &'static str },

    #[error("repository name {0:?} must be a single path component")]
    InvalidRepository(String),
}
