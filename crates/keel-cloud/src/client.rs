use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::command::CommandError;
use crate::executor::{CommandExecutor, RealExecutor};

/// Where the staging directory is mounted inside the builder container.
pub const BUILDER_APP_MOUNT: &str = "/tmp/app";
/// Where the application's cache directory is mounted inside the builder container.
pub const BUILDER_CACHE_MOUNT: &str = "/tmp/cache";
/// Artifact the builder container leaves behind on success.
pub const BUILDER_SLUG_PATH: &str = "/tmp/slug.tgz";

/// Host operations (git, docker, filesystem) used by the pipeline,
/// parameterized over the executor for testability.
pub struct HostClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl HostClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for HostClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for one buildpack compilation container.
#[derive(Debug, Clone)]
pub struct BuilderContainer<'a> {
    pub image: &'a str,
    pub app_dir: &'a Path,
    pub cache_dir: &'a Path,
    pub env: &'a BTreeMap<String, String>,
}

impl<E: CommandExecutor> HostClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Git ──

    /// `git archive` of `commit` as an uncompressed tar written to `output`.
    pub async fn archive(
        &self,
        repo_dir: &Path,
        commit: &str,
        output: &Path,
    ) -> Result<(), HostError> {
        let git_dir = path_str(repo_dir)?;
        self.executor
            .exec_to_file(
                "git",
                &args(["--git-dir", git_dir, "archive", "--format=tar", commit]),
                output,
            )
            .await
            .map_err(|e| HostError::Archive {
                commit: commit.to_owned(),
                source: e,
            })
    }

    pub async fn gc(&self, repo_dir: &Path) -> Result<(), HostError> {
        let git_dir = path_str(repo_dir)?;
        self.executor
            .exec("git", &args(["--git-dir", git_dir, "gc", "--quiet"]))
            .await
            .map(|_| ())
            .map_err(|e| HostError::Gc { source: e })
    }

    // ── Filesystem ──

    /// Hand `dir` to `group` with group read/write, recursively.
    ///
    /// The builder container runs as a different user that shares this group.
    pub async fn share_with_group(&self, dir: &Path, group: &str) -> Result<(), HostError> {
        let dir_str = path_str(dir)?;
        let permission_error = |e| HostError::Permissions {
            path: dir.to_path_buf(),
            source: e,
        };

        self.executor
            .exec("chgrp", &args(["-R", group, dir_str]))
            .await
            .map_err(permission_error)?;
        self.executor
            .exec("chmod", &args(["-R", "g+rwX", dir_str]))
            .await
            .map_err(permission_error)?;

        Ok(())
    }

    // ── Docker images ──

    /// `docker build`, streaming build output to the operator.
    pub async fn build_image(&self, context_dir: &Path, tag: &str) -> Result<(), HostError> {
        let context = path_str(context_dir)?;
        self.executor
            .exec_streaming("docker", &args(["build", "-t", tag, context]))
            .await
            .map_err(|e| HostError::Build { source: e })
    }

    /// Tag `image` under `registry` and push it. Returns the remote reference.
    pub async fn push_image(&self, image: &str, registry: &str) -> Result<String, HostError> {
        let remote = format!("{registry}/{image}");

        self.executor
            .exec("docker", &args(["tag", image, &remote]))
            .await
            .map_err(|e| HostError::Tag { source: e })?;
        self.executor
            .exec_streaming("docker", &args(["push", &remote]))
            .await
            .map_err(|e| HostError::Push { source: e })?;

        Ok(remote)
    }

    // ── Docker containers ──

    /// Start the buildpack container detached. Returns its container id.
    pub async fn run_builder(&self, container: &BuilderContainer<'_>) -> Result<String, HostError> {
        let app_mount = format!("{}:{BUILDER_APP_MOUNT}", path_str(container.app_dir)?);
        let cache_mount = format!("{}:{BUILDER_CACHE_MOUNT}:rw", path_str(container.cache_dir)?);

        let mut cmd = args(["run", "-d", "-v", &app_mount, "-v", &cache_mount]);
        for (key, value) in container.env {
            cmd.push("-e".to_owned());
            cmd.push(format!("{key}={value}"));
        }
        cmd.push(container.image.to_owned());

        let output = self
            .executor
            .exec("docker", &cmd)
            .await
            .map_err(|e| HostError::Launch { source: e })?;

        let container_id = output.trim();
        if container_id.is_empty() {
            return Err(HostError::EmptyContainerId);
        }
        Ok(container_id.to_owned())
    }

    /// Stream a running container's output until it exits.
    pub async fn attach(&self, container_id: &str) -> Result<(), HostError> {
        self.executor
            .exec_streaming("docker", &args(["attach", container_id]))
            .await
            .map_err(|e| HostError::Attach { source: e })
    }

    /// Block until the container exits and return its exit code.
    pub async fn wait(&self, container_id: &str) -> Result<i64, HostError> {
        let output = self
            .executor
            .exec("docker", &args(["wait", container_id]))
            .await
            .map_err(|e| HostError::Wait { source: e })?;

        let trimmed = output.trim();
        trimmed
            .parse()
            .map_err(|_| HostError::UnexpectedWaitOutput(trimmed.to_owned()))
    }

    /// `docker cp <container>:<source> <dest_dir>`
    pub async fn copy_from_container(
        &self,
        container_id: &str,
        source: &str,
        dest_dir: &Path,
    ) -> Result<(), HostError> {
        let from = format!("{container_id}:{source}");
        let dest = path_str(dest_dir)?;
        self.executor
            .exec("docker", &args(["cp", &from, dest]))
            .await
            .map(|_| ())
            .map_err(|e| HostError::Copy { source: e })
    }

    /// Force-remove a container, running or not.
    pub async fn remove_container(&self, container_id: &str) -> Result<(), HostError> {
        self.executor
            .exec("docker", &args(["rm", "-f", container_id]))
            .await
            .map(|_| ())
            .map_err(|e| HostError::Remove { source: e })
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn path_str(path: &Path) -> Result<&str, HostError> {
    path.to_str()
        .ok_or_else(|| HostError::InvalidPath(path.to_path_buf()))
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("git archive of {commit} failed")]
    Archive {
        commit: String,
        source: CommandError,
    },

    #[error("git gc failed")]
    Gc { source: CommandError },

    #[error("failed to grant build group access to {path}")]
    Permissions {
        path: PathBuf,
        source: CommandError,
    },

    #[error("docker build failed")]
    Build { source: CommandError },

    #[error("docker tag failed")]
    Tag { source: CommandError },

    #[error("docker push failed")]
    Push { source: CommandError },

    #[error("failed to launch builder container")]
    Launch { source: CommandError },

    #[error("docker run returned no container id")]
    EmptyContainerId,

    #[error("failed to attach to builder container")]
    Attach { source: CommandError },

    #[error("failed to wait for builder container")]
    Wait { source: CommandError },

    #[error("docker wait returned unexpected output: {0:?}")]
    UnexpectedWaitOutput(String),

    #[error("failed to copy from builder container")]
    Copy { source: CommandError },

    #[error("failed to remove container")]
    Remove { source: CommandError },
}
