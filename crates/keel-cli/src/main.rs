mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use keel::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "keel-builder",
    about = "Build, push, and release a commit pushed to a keel application"
)]
#[command(version)]
struct Cli {
    /// Builder configuration file
    #[arg(long, env = "KEEL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Account that pushed the commit
    user: String,
    /// Repository directory under the repository root (e.g. myapp.git)
    repository: String,
    /// Full commit id that was pushed
    commit: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // before the subscriber, so RUST_LOG from .env applies
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if dotenv_loaded {
        tracing::debug!("loaded .env");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here too
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    match commands::build(&cli.config, &cli.user, &cli.repository, &cli.commit).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
