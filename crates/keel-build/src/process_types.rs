use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use keel_core::ProcessTypes;

use crate::detect::is_regular_file;

/// User-authored or buildpack-generated process declaration.
pub const PROCFILE: &str = "Procfile";
/// Compiled application archive left in the staging directory by the builder.
pub const SLUG_ARCHIVE: &str = "slug.tgz";
/// Buildpack release metadata carrying `default_process_types`.
pub const RELEASE_METADATA: &str = ".release";

/// Where an application's process types come from, highest precedence first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessTypeSource {
    /// `Procfile` at the staged root.
    Procfile(PathBuf),
    /// `Procfile` inside the slug.
    SlugProcfile(String),
    /// `.release` inside the slug.
    SlugRelease(String),
    /// Nothing declares process types.
    None,
}

impl ProcessTypeSource {
    /// Pick the highest-precedence source present in `staged_dir`.
    ///
    /// Symlinks are never followed; a linked `Procfile` or slug is ignored.
    pub fn locate(staged_dir: &Path) -> Self {
        let procfile = staged_dir.join(PROCFILE);
        if is_regular_file(&procfile) {
            return Self::Procfile(procfile);
        }
        warn_if_symlink(&procfile);

        let slug = staged_dir.join(SLUG_ARCHIVE);
        if !is_regular_file(&slug) {
            warn_if_symlink(&slug);
            return Self::None;
        }

        match read_slug_metadata(&slug) {
            Ok(SlugMetadata {
                procfile: Some(content),
                ..
            }) => Self::SlugProcfile(content),
            Ok(SlugMetadata {
                release: Some(content),
                ..
            }) => Self::SlugRelease(content),
            Ok(_) => Self::None,
            Err(e) => {
                tracing::warn!(path = %slug.display(), error = %e, "could not read slug archive");
                Self::None
            }
        }
    }

    /// Parse the source. Failures degrade to an empty map.
    pub fn into_process_types(self) -> ProcessTypes {
        let parsed = match &self {
            Self::Procfile(path) => match std::fs::read_to_string(path) {
                Ok(content) => ProcessTypes::parse_procfile(&content).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Self::SlugProcfile(content) => {
                ProcessTypes::parse_procfile(content).map_err(|e| e.to_string())
            }
            Self::SlugRelease(content) => {
                ProcessTypes::parse_release(content).map_err(|e| e.to_string())
            }
            Self::None => Ok(ProcessTypes::new()),
        };

        parsed.unwrap_or_else(|error| {
            tracing::warn!(source = self.label(), %error, "ignoring unparsable process types");
            ProcessTypes::new()
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Procfile(_) => "Procfile",
            Self::SlugProcfile(_) => "slug Procfile",
            Self::SlugRelease(_) => "slug release metadata",
            Self::None => "none",
        }
    }
}

/// Resolve the process types for a staged (and possibly compiled) tree.
pub fn resolve(staged_dir: &Path) -> ProcessTypes {
    let source = ProcessTypeSource::locate(staged_dir);
    tracing::debug!(source = source.label(), "process type source located");
    source.into_process_types()
}

fn warn_if_symlink(path: &Path) {
    if std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink()) {
        tracing::warn!(path = %path.display(), "ignoring symlink in staged tree");
    }
}

#[derive(Debug, Default)]
struct SlugMetadata {
    procfile: Option<String>,
    release: Option<String>,
}

fn read_slug_metadata(slug: &Path) -> std::io::Result<SlugMetadata> {
    let file = File::open(slug)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut metadata = SlugMetadata::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.into_owned();
        let relative = path.strip_prefix(".").unwrap_or(&path);
        let slot = if relative == Path::new(PROCFILE) {
            &mut metadata.procfile
        } else if relative == Path::new(RELEASE_METADATA) {
            &mut metadata.release
        } else {
            continue;
        };

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        *slot = Some(content);

        if metadata.procfile.is_some() && metadata.release.is_some() {
            break;
        }
    }

    Ok(metadata)
}
