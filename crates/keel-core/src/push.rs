use std::path::{Path, PathBuf};

/// Length of the abbreviated commit id used in image tags and release hooks.
pub const SHORT_COMMIT_LEN: usize = 8;

const REPO_SUFFIX: &str = ".git";

/// A single `git push` handed to the builder by the receive hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    user: String,
    repository: String,
    commit: String,
}

impl PushEvent {
    pub fn new(
        user: impl Into<String>,
        repository: impl Into<String>,
        commit: impl Into<String>,
    ) -> crate::Result<Self> {
        let event = Self {
            user: user.into(),
            repository: repository.into(),
            commit: commit.into(),
        };

        for (field, value) in [
            ("user", &event.user),
            ("repository", &event.repository),
            ("commit", &event.commit),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::EmptyPushField { field });
            }
        }

        if event.repository.contains(['/', '\\']) || event.repository.starts_with('.') {
            return Err(crate::Error::InvalidRepository(event.repository));
        }

        if event.app_name().is_empty() {
            return Err(crate::Error::EmptyPushField {
                field: "application name",
            });
        }

        Ok(event)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// First [`SHORT_COMMIT_LEN`] characters of the commit id.
    pub fn short_commit(&self) -> &str {
        self.commit
            .char_indices()
            .nth(SHORT_COMMIT_LEN)
            .map_or(self.commit.as_str(), |(idx, _)| &self.commit[..idx])
    }

    /// Repository name without its `.git` suffix.
    pub fn app_name(&self) -> &str {
        self.repository
            .strip_suffix(REPO_SUFFIX)
            .unwrap_or(&self.repository)
    }

    /// Local image tag: `<app>:git-<short commit>`.
    pub fn image_name(&self) -> String {
        format!("{}:git-{}", self.app_name(), self.short_commit())
    }
}

/// On-disk layout for one application's repository.
///
/// ```text
/// <root>/<repository>/          bare repository
/// <root>/<repository>/build/    one staging directory per push
/// <root>/<repository>/cache/    buildpack cache shared across pushes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    pub repo_dir: PathBuf,
    pub build_root: PathBuf,
    pub cache_dir: PathBuf,
}

impl RepoLayout {
    pub fn new(repository_root: &Path, push: &PushEvent) -> Self {
        let repo_dir = repository_root.join(push.repository());
        Self {
            build_root: repo_dir.join("build"),
            cache_dir: repo_dir.join("cache"),
            repo_dir,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.repo_dir.join("build.lock")
    }
}
