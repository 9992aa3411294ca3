use std::fmt;
use std::path::Path;

/// User-supplied container definition at the root of a pushed tree.
pub const DOCKERFILE: &str = "Dockerfile";

/// How a staged tree becomes an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// The tree carries its own Dockerfile and is built as-is.
    Dockerfile,
    /// The tree is compiled into a slug by the buildpack builder.
    Buildpack,
}

impl BuildMode {
    /// Only a regular file counts; a symlinked `Dockerfile` selects buildpack mode.
    pub fn detect(staged_dir: &Path) -> Self {
        if is_regular_file(&staged_dir.join(DOCKERFILE)) {
            Self::Dockerfile
        } else {
            Self::Buildpack
        }
    }

    pub fn uses_dockerfile(self) -> bool {
        matches!(self, Self::Dockerfile)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dockerfile => f.write_str("dockerfile"),
            Self::Buildpack => f.write_str("buildpack"),
        }
    }
}

/// `true` for a regular file, without following a symlink at `path`.
pub(crate) fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file())
}
