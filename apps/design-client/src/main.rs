//! Design client.
//!
//! Run with: cargo run -p design-client
//!
//! Configuration comes from the environment:
//! - `DESIGN_SERVER_URL` - design server address (required)
//! - `DESIGN_RUNNER` - runner command line (required)
//! - `DESIGN_ASSEMBLY` - target assembly (required)
//! - `DESIGN_STARTUP_ASSEMBLY` - startup assembly, defaults to the target
//! - `DESIGN_PROJECT_DIR` - project directory, defaults to the current one
//! - `DESIGN_ENVIRONMENT` - environment name passed to the runner
//! - `DESIGN_RETRY_MS` - delay between empty polls (default 3000)
//!
//! Ctrl-C cancels the session.

use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use design_client_core::ExecutionSetup;
use design_client_executor::{CommandBuilder, DesignOperationExecutor, StrategyFactory, TargetKind};
use design_client_transport::DesignClientBuilder;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Config {
    server: String,
    runner: String,
    setup: ExecutionSetup,
    retry_interval: Option<Duration>,
}

impl Config {
    fn from_env() -> Result<Self> {
        let required = |key: &str| env::var(key).with_context(|| format!("{key} is not set"));
        let optional = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        let project_dir = match optional("DESIGN_PROJECT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir().context("Failed to read the current directory")?,
        };

        let mut setup = ExecutionSetup::new(required("DESIGN_ASSEMBLY")?, project_dir);
        if let Some(startup) = optional("DESIGN_STARTUP_ASSEMBLY") {
            setup = setup.with_startup_assembly(startup);
        }
        if let Some(environment) = optional("DESIGN_ENVIRONMENT") {
            setup = setup.with_environment(environment);
        }

        let retry_interval = optional("DESIGN_RETRY_MS")
            .map(|ms| {
                ms.parse::<u64>()
                    .map(Duration::from_millis)
                    .with_context(|| format!("DESIGN_RETRY_MS is not a number: {ms}"))
            })
            .transpose()?;

        Ok(Self {
            server: required("DESIGN_SERVER_URL")?,
            runner: required("DESIGN_RUNNER")?,
            setup,
            retry_interval,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        server = %config.server,
        project = %config.setup.project_dir.display(),
        assembly = config.setup.assembly_name(),
        "Starting design client"
    );

    let factory =
        StrategyFactory::new(config.setup).with_runner(CommandBuilder::new(config.runner));
    let executor = DesignOperationExecutor::new(factory, TargetKind::Application);

    let mut builder = DesignClientBuilder::new().with_design_server(&config.server)?;
    if let Some(retry_interval) = config.retry_interval {
        builder = builder.with_retry_interval(retry_interval);
    }
    let mut client = builder.build(executor)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping session");
                cancel.cancel();
            }
        }
    });

    client.start(cancel).wait().await;

    match client.error() {
        None => {
            tracing::info!("Session finished");
            Ok(())
        }
        Some(e) if e.is_cancelled() => Ok(()),
        Some(e) => bail!("Design session failed: {e}"),
    }
}
