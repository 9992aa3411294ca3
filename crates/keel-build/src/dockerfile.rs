use std::io::Write;
use std::path::{Path, PathBuf};

use crate::detect::{DOCKERFILE, is_regular_file};
use crate::process_types::SLUG_ARCHIVE;

/// Generates the Dockerfile that wraps a compiled slug in the runner image.
pub struct SlugDockerfile<'a> {
    runner_image: &'a str,
}

impl<'a> SlugDockerfile<'a> {
    pub fn new(runner_image: &'a str) -> Self {
        Self { runner_image }
    }

    pub fn render(&self) -> String {
        format!(
            r#"FROM {runner}
RUN mkdir -p /app
WORKDIR /app
ENTRYPOINT ["/runner/init"]
ADD {slug} /app
"#,
            runner = self.runner_image,
            slug = SLUG_ARCHIVE,
        )
    }

    /// Write the rendered Dockerfile at the root of `staged_dir`.
    ///
    /// Any existing entry at that path, a symlink included, is replaced.
    pub fn write(&self, staged_dir: &Path) -> Result<PathBuf, DockerfileError> {
        let path = staged_dir.join(DOCKERFILE);
        let write_error = |e| DockerfileError::Write {
            path: path.clone(),
            source: e,
        };

        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "replaced pushed Dockerfile entry"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(write_error(e)),
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_error)?;
        file.write_all(self.render().as_bytes())
            .map_err(write_error)?;
        Ok(path)
    }
}

/// Append `ENV GIT_SHA <commit>` so the image records the commit it was built from.
pub fn pin_commit(staged_dir: &Path, commit: &str) -> Result<(), DockerfileError> {
    let path = staged_dir.join(DOCKERFILE);
    if !is_regular_file(&path) {
        return Err(DockerfileError::NotRegular { path });
    }

    let existing = std::fs::read(&path).map_err(|e| DockerfileError::Read {
        path: path.clone(),
        source: e,
    })?;

    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with(b"\n") {
        line.push('\n');
    }
    line.push_str(&format!("ENV GIT_SHA {commit}\n"));

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .map_err(|e| DockerfileError::Write {
            path: path.clone(),
            source: e,
        })?;
    file.write_all(line.as_bytes())
        .map_err(|e| DockerfileError::Write { path, source: e })
}

#[derive(Debug, thiserror::Error)]
pub enum DockerfileError {
    #[error("failed to read Dockerfile at {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write Dockerfile at {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is missing or not a regular file")]
    NotRegular { path: PathBuf },
}
