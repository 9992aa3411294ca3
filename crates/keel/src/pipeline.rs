use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use keel_build::detect::BuildMode;
use keel_build::dockerfile::{self, SlugDockerfile};
use keel_build::{process_types, stage};
use keel_cloud::client::{BUILDER_SLUG_PATH, BuilderContainer};
use keel_cloud::{
    BuildHook, CommandExecutor, ConfigRequest, ControllerApi, HostClient, ReleaseRecord,
};
use keel_core::{BuilderConfig, ProcessTypes, PushEvent, RepoLayout};

use crate::error::{BuildError, PipelineError, StagingError};

/// Progress of one push through the pipeline.
///
/// ```text
/// Received → Staged → ModeDetected → Built → Pushed → ProcessTypesResolved → Published
/// ```
///
/// Cleanup follows whichever state the pipeline stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Staged,
    ModeDetected,
    Built,
    Pushed,
    ProcessTypesResolved,
    Published,
}

/// Everything the operator is told about a successful release.
#[derive(Debug, Clone)]
pub struct ReleaseSummary {
    pub release: ReleaseRecord,
    pub app: String,
    /// Registry reference the image was pushed as.
    pub image: String,
    pub mode: BuildMode,
    pub process_types: ProcessTypes,
    pub staging_dir: PathBuf,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Success(ReleaseSummary),
    Failure(PipelineError),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Success(_) => 0,
            Self::Failure(_) => 1,
        }
    }
}

impl From<Result<ReleaseSummary, PipelineError>> for PipelineOutcome {
    fn from(result: Result<ReleaseSummary, PipelineError>) -> Self {
        match result {
            Ok(summary) => Self::Success(summary),
            Err(e) => Self::Failure(e),
        }
    }
}

/// Resources a run acquires that cleanup must release.
#[derive(Debug, Default)]
struct Acquired {
    builder_container: Option<String>,
}

/// Per-push working state shared by the build steps.
struct BuildContext<'p> {
    push: &'p PushEvent,
    layout: RepoLayout,
    staging_dir: PathBuf,
    image: String,
}

/// The build-trigger pipeline for one push.
pub struct Pipeline<'a, E: CommandExecutor, C: ControllerApi> {
    config: &'a BuilderConfig,
    host: HostClient<E>,
    controller: C,
}

impl<'a, E: CommandExecutor, C: ControllerApi> Pipeline<'a, E, C> {
    pub fn new(config: &'a BuilderConfig, host: HostClient<E>, controller: C) -> Self {
        Self {
            config,
            host,
            controller,
        }
    }

    /// Run every stage for `push`, then clean up regardless of the result.
    pub async fn run(&self, push: &PushEvent) -> PipelineOutcome {
        let layout = RepoLayout::new(&self.config.paths.repository_root, push);
        let mut acquired = Acquired::default();

        tracing::info!(
            user = push.user(),
            app = push.app_name(),
            commit = push.short_commit(),
            "build triggered"
        );
        advance(PipelineState::Received);

        let result = self.execute(push, layout.clone(), &mut acquired).await;
        if let Err(e) = &result {
            tracing::warn!(stage = %e.stage(), error = %e.message(), "pipeline failed");
        }

        self.cleanup(&layout, acquired).await;
        result.into()
    }

    async fn execute(
        &self,
        push: &PushEvent,
        layout: RepoLayout,
        acquired: &mut Acquired,
    ) -> Result<ReleaseSummary, PipelineError> {
        // Held until the run returns; closing the file releases the lock.
        let _app_lock = self.lock_application(&layout).await?;

        let staging_dir = self.stage(push, &layout).await?;
        advance(PipelineState::Staged);

        let ctx = BuildContext {
            push,
            layout,
            staging_dir,
            image: push.image_name(),
        };

        let mode = BuildMode::detect(&ctx.staging_dir);
        tracing::info!(%mode, "build mode detected");
        advance(PipelineState::ModeDetected);

        self.build(&ctx, mode, acquired).await?;
        advance(PipelineState::Built);

        println!("-----> Pushing image to private registry");
        let remote = self
            .host
            .push_image(&ctx.image, &self.config.registry.address())
            .await
            .map_err(PipelineError::Registry)?;
        advance(PipelineState::Pushed);

        let process_types = process_types::resolve(&ctx.staging_dir);
        tracing::info!(
            count = process_types.len(),
            names = ?process_types.names().collect::<Vec<_>>(),
            "process types resolved"
        );
        advance(PipelineState::ProcessTypesResolved);

        println!("-----> Launching...");
        let hook = BuildHook {
            receive_user: push.user().to_owned(),
            receive_repo: push.app_name().to_owned(),
            image: push.app_name().to_owned(),
            sha: push.short_commit().to_owned(),
            procfile: process_types.clone(),
            dockerfile: mode.uses_dockerfile(),
        };
        let release = self
            .controller
            .publish_build(&hook)
            .await
            .map_err(PipelineError::Release)?;
        advance(PipelineState::Published);

        Ok(ReleaseSummary {
            release,
            app: push.app_name().to_owned(),
            image: remote,
            mode,
            process_types,
            staging_dir: ctx.staging_dir,
        })
    }

    // ── Staging ──

    async fn lock_application(&self, layout: &RepoLayout) -> Result<Option<File>, StagingError> {
        if !self.config.build.serialize {
            return Ok(None);
        }

        let path = layout.lock_path();
        tracing::info!(path = %path.display(), "waiting for application build lock");

        let lock_path = path.clone();
        let locked = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            use fs2::FileExt;

            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|locked| locked);

        locked
            .map(Some)
            .map_err(|e| StagingError::Lock { path, source: e })
    }

    async fn stage(&self, push: &PushEvent, layout: &RepoLayout) -> Result<PathBuf, StagingError> {
        let staging_dir = stage::create_staging_dir(&layout.build_root)?;
        let archive = stage::archive_path(&staging_dir);

        let unpacked = match self
            .host
            .archive(&layout.repo_dir, push.commit(), &archive)
            .await
        {
            Ok(()) => stage::unpack_archive_file(&archive, &staging_dir).map_err(StagingError::from),
            Err(e) => Err(StagingError::from(e)),
        };
        if let Err(e) = std::fs::remove_file(&archive) {
            tracing::debug!(path = %archive.display(), error = %e, "failed to remove source archive");
        }
        let entries = unpacked?;

        tracing::info!(
            path = %staging_dir.display(),
            entries,
            "commit staged"
        );
        Ok(staging_dir)
    }

    // ── Build ──

    async fn build(
        &self,
        ctx: &BuildContext<'_>,
        mode: BuildMode,
        acquired: &mut Acquired,
    ) -> Result<(), PipelineError> {
        match mode {
            BuildMode::Dockerfile => {}
            BuildMode::Buildpack => self.compile_slug(ctx, acquired).await?,
        }

        dockerfile::pin_commit(&ctx.staging_dir, ctx.push.commit()).map_err(BuildError::from)?;

        println!("-----> Building Docker image");
        self.host
            .build_image(&ctx.staging_dir, &ctx.image)
            .await
            .map_err(BuildError::from)?;
        tracing::info!(image = %ctx.image, "image built");
        Ok(())
    }

    /// Run the buildpack builder over the staged tree and wrap its slug in a
    /// synthesized Dockerfile.
    async fn compile_slug(
        &self,
        ctx: &BuildContext<'_>,
        acquired: &mut Acquired,
    ) -> Result<(), PipelineError> {
        let env = self
            .controller
            .fetch_config(&ConfigRequest {
                receive_user: ctx.push.user().to_owned(),
                receive_repo: ctx.push.app_name().to_owned(),
            })
            .await
            .map_err(PipelineError::ConfigFetch)?;

        let cache_dir = &ctx.layout.cache_dir;
        std::fs::create_dir_all(cache_dir).map_err(|e| BuildError::CreateCache {
            path: cache_dir.clone(),
            source: e,
        })?;

        let group = &self.config.build.group;
        self.host
            .share_with_group(&ctx.staging_dir, group)
            .await
            .map_err(BuildError::from)?;
        self.host
            .share_with_group(cache_dir, group)
            .await
            .map_err(BuildError::from)?;

        println!("-----> Compiling with buildpack");
        let container_id = self
            .host
            .run_builder(&BuilderContainer {
                image: &self.config.build.slugbuilder_image,
                app_dir: &ctx.staging_dir,
                cache_dir,
                env: &env,
            })
            .await
            .map_err(BuildError::from)?;
        acquired.builder_container = Some(container_id.clone());
        tracing::info!(container = %container_id, "builder container started");

        self.await_builder(&container_id).await?;

        self.host
            .copy_from_container(&container_id, BUILDER_SLUG_PATH, &ctx.staging_dir)
            .await
            .map_err(BuildError::from)?;
        SlugDockerfile::new(&self.config.build.slugrunner_image)
            .write(&ctx.staging_dir)
            .map_err(BuildError::from)?;

        Ok(())
    }

    /// Stream the builder's output until it exits, bounded by the configured timeout.
    async fn await_builder(&self, container_id: &str) -> Result<(), BuildError> {
        let finished = async {
            if let Err(e) = self.host.attach(container_id).await {
                tracing::warn!(error = %e, "lost builder output, waiting for exit");
            }
            self.host.wait(container_id).await
        };

        let code = match self.config.build.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), finished)
                .await
                .map_err(|_| BuildError::TimedOut { secs })??,
            None => finished.await?,
        };

        if code != 0 {
            return Err(BuildError::BuilderExit { code });
        }
        Ok(())
    }

    // ── Cleanup ──

    /// Best-effort release of everything the run acquired. Never fails.
    async fn cleanup(&self, layout: &RepoLayout, acquired: Acquired) {
        if let Err(e) = self.host.gc(&layout.repo_dir).await {
            tracing::debug!(error = %e, "git gc failed during cleanup");
        }

        if let Some(container_id) = acquired.builder_container {
            match self.host.remove_container(&container_id).await {
                Ok(()) => tracing::debug!(container = %container_id, "builder container removed"),
                Err(e) => tracing::debug!(
                    container = %container_id,
                    error = %e,
                    "failed to remove builder container during cleanup"
                ),
            }
        }
    }
}

fn advance(state: PipelineState) {
    tracing::debug!(?state, "pipeline state");
}

