use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Default location of the builder configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/keel/keel.toml";

/// keel.toml configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuilderConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory holding one bare repository per application
    #[serde(default = "default_repository_root")]
    pub repository_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Private registry host
    #[serde(default = "default_registry_host")]
    pub host: String,
    /// Private registry port
    #[serde(default = "default_registry_port")]
    pub port: u16,
}

#[derive(Clone, Deserialize)]
pub struct ControllerConfig {
    /// `http` or `https`
    #[serde(default = "default_controller_protocol")]
    pub protocol: String,
    #[serde(default = "default_controller_host")]
    pub host: String,
    #[serde(default = "default_controller_port")]
    pub port: u16,
    /// Shared key authenticating the builder against the controller hooks.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub builder_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Image that compiles source trees into slugs
    #[serde(default = "default_slugbuilder_image")]
    pub slugbuilder_image: String,
    /// Base image the synthesized Dockerfile wraps slugs in
    #[serde(default = "default_slugrunner_image")]
    pub slugrunner_image: String,
    /// Group shared between the hook user and the builder container user
    #[serde(default = "default_build_group")]
    pub group: String,
    /// Upper bound on a builder container run. Unbounded when omitted.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Hold an exclusive per-application lock for the whole pipeline.
    #[serde(default)]
    pub serialize: bool,
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "builder_key",
                &self.builder_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repository_root: default_repository_root(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: default_registry_host(),
            port: default_registry_port(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            protocol: default_controller_protocol(),
            host: default_controller_host(),
            port: default_controller_port(),
            builder_key: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            slugbuilder_image: default_slugbuilder_image(),
            slugrunner_image: default_slugrunner_image(),
            group: default_build_group(),
            timeout_secs: None,
            serialize: false,
        }
    }
}

impl RegistryConfig {
    /// `host:port` prefix images are pushed under.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn require_builder_key(&self) -> crate::Result<SecretString> {
        self.builder_key.clone().ok_or(crate::Error::MissingBuilderKey)
    }
}

impl BuilderConfig {
    /// Load from the TOML file at `path`, or return defaults if it does not exist.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply `KEEL_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("KEEL_REPOSITORY_ROOT") {
            self.paths.repository_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("KEEL_REGISTRY_HOST") {
            self.registry.host = v;
        }
        if let Some(v) = lookup("KEEL_REGISTRY_PORT") {
            self.registry.port = parse_port("KEEL_REGISTRY_PORT", v)?;
        }
        if let Some(v) = lookup("KEEL_CONTROLLER_PROTOCOL") {
            if !is_supported_protocol(&v) {
                return Err(crate::Error::InvalidOverride {
                    key: "KEEL_CONTROLLER_PROTOCOL",
                    value: v,
                    reason: PROTOCOL_REASON.to_owned(),
                });
            }
            self.controller.protocol = v;
        }
        if let Some(v) = lookup("KEEL_CONTROLLER_HOST") {
            self.controller.host = v;
        }
        if let Some(v) = lookup("KEEL_CONTROLLER_PORT") {
            self.controller.port = parse_port("KEEL_CONTROLLER_PORT", v)?;
        }
        if let Some(v) = lookup("KEEL_BUILDER_KEY").filter(|k| !k.trim().is_empty()) {
            self.controller.builder_key = Some(SecretString::from(v));
        }
        Ok(())
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> crate::Result<()> {
        if !is_supported_protocol(&self.controller.protocol) {
            return Err(crate::Error::InvalidConfig {
                key: "controller.protocol",
                value: self.controller.protocol.clone(),
                reason: PROTOCOL_REASON.to_owned(),
            });
        }
        Ok(())
    }
}

/// Source of the builder configuration, resolved once at process start and
/// handed to the pipeline.
pub trait ConfigProvider {
    fn resolve(&self) -> crate::Result<BuilderConfig>;
}

/// Reads `keel.toml`, then layers `KEEL_*` environment variables on top.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigProvider {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigProvider for FileConfigProvider {
    fn resolve(&self) -> crate::Result<BuilderConfig> {
        let mut config = BuilderConfig::load(&self.path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(?config, "builder config resolved");
        Ok(config)
    }
}

const PROTOCOL_REASON: &str = "expected http or https";

fn is_supported_protocol(protocol: &str) -> bool {
    matches!(protocol, "http" | "https")
}

fn parse_port(key: &'static str, value: String) -> crate::Result<u16> {
    value
        .parse()
        .map_err(|e: std::num::ParseIntError| crate::Error::InvalidOverride {
            key,
            value,
            reason: e.to_string(),
        })
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::from))
}

fn default_repository_root() -> PathBuf {
    PathBuf::from("/home/git")
}

fn default_registry_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_registry_port() -> u16 {
    5000
}

fn default_controller_protocol() -> String {
    "http".to_owned()
}

fn default_controller_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_controller_port() -> u16 {
    8000
}

fn default_slugbuilder_image() -> String {
    "keel/slugbuilder:latest".to_owned()
}

fn default_slugrunner_image() -> String {
    "keel/slugrunner:latest".to_owned()
}

fn default_build_group() -> String {
    "slug".to_owned()
}
