use std::path::Path;

use anyhow::Context;
use keel::cloud::{HostClient, HttpController};
use keel::{ConfigProvider, FileConfigProvider, Pipeline, PipelineOutcome, PushEvent};

/// Run the build pipeline for one pushed commit and report the result.
///
/// Startup problems (bad arguments, unreadable config, missing builder key)
/// are returned as errors. Pipeline failures are reported and returned as a
/// failed outcome.
pub async fn build(
    config_path: &Path,
    user: &str,
    repository: &str,
    commit: &str,
) -> anyhow::Result<PipelineOutcome> {
    let push = PushEvent::new(user, repository, commit)?;

    let config = FileConfigProvider::new(config_path)
        .resolve()
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let builder_key = config.controller.require_builder_key()?;
    let controller = HttpController::new(config.controller.base_url(), builder_key);

    let pipeline = Pipeline::new(&config, HostClient::new(), controller);
    let outcome = pipeline.run(&push).await;

    report(&outcome);
    Ok(outcome)
}

fn report(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Success(summary) => {
            println!(
                "       done, {}:v{} deployed to keel",
                summary.app, summary.release.version
            );
            println!();
            if let Some(domain) = &summary.release.domain {
                println!("       http://{domain}");
                println!();
            }
        }
        PipelineOutcome::Failure(e) => {
            if let Some(body) = e.response_body() {
                eprintln!("warning: {body}");
            }
            eprintln!("error: {} failed: {}", e.stage(), e.message());
        }
    }
}
