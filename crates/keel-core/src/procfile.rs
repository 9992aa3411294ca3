use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Process name → start command, as declared by a `Procfile` or a buildpack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessTypes(BTreeMap<String, String>);

impl ProcessTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Procfile` content: one `name: command` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn parse_procfile(content: &str) -> Result<Self, ProcfileError> {
        let mut map = BTreeMap::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_no = idx + 1;
            let (name, command) = line
                .split_once(':')
                .ok_or(ProcfileError::MissingSeparator { line: line_no })?;
            let name = name.trim();
            let command = command.trim();

            if !is_valid_name(name) {
                return Err(ProcfileError::InvalidName {
                    line: line_no,
                    name: name.to_owned(),
                });
            }
            if command.is_empty() {
                return Err(ProcfileError::EmptyCommand {
                    line: line_no,
                    name: name.to_owned(),
                });
            }
            if map.insert(name.to_owned(), command.to_owned()).is_some() {
                return Err(ProcfileError::Duplicate {
                    line: line_no,
                    name: name.to_owned(),
                });
            }
        }

        Ok(Self(map))
    }

    /// Extract `default_process_types` from a buildpack `.release` document.
    pub fn parse_release(content: &str) -> Result<Self, ProcfileError> {
        #[derive(Deserialize)]
        struct Release {
            #[serde(default)]
            default_process_types: Option<BTreeMap<String, String>>,
        }

        let release: Release =
            serde_yaml::from_str(content).map_err(|e| ProcfileError::Release { source: e })?;
        Ok(Self(release.default_process_types.unwrap_or_default()))
    }

    pub fn insert(&mut self, name: impl Into<String>, command: impl Into<String>) {
        self.0.insert(name.into(), command.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Renders back to `Procfile` syntax, one entry per line sorted by name.
impl fmt::Display for ProcessTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, command) in &self.0 {
            writeln!(f, "{name}: {command}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for ProcessTypes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Debug, thiserror::Error)]
pub enum ProcfileError {
    #[error("line {line}: expected `name: command`")]
    MissingSeparator { line: usize },

    #[error("line {line}: invalid process name {name:?}")]
    InvalidName { line: usize, name: String },

    #[error("line {line}: process {name:?} has no command")]
    EmptyCommand { line: usize, name: String },

    #[error("line {line}: process {name:?} declared twice")]
    Duplicate { line: usize, name: String },

    #[error("failed to parse release metadata")]
    Release { source: serde_yaml::Error },
}
