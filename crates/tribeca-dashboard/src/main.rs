/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals, stdin commands
[OUTPUT]: Running dashboard client with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tribeca_dashboard::{App, DashboardConfig};

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "tribeca-dashboard", version, about = "Tribeca trading dashboard client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    /// Override `server_url` from the config file
    #[arg(long = "url", value_name = "URL")]
    url: Option<String>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    // Everything UI-side is !Send and lives on this thread's LocalSet.
    let local = LocalSet::new();
    let result = runtime.block_on(local.run_until(run(args)));
    drop(local);

    // Stdin reads cannot be interrupted; don't wait for them.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run(args: Cli) -> Result<()> {
    info!(
        config_path = ?args.config_path,
        dry_run = args.dry_run,
        "starting tribeca-dashboard"
    );

    let mut config = load_config(args.config_path.as_deref())?;
    if let Some(url) = args.url {
        config.server_url = url;
        config.validate().context("validate --url override")?;
    }
    info!(server_url = %config.server_url, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let mut app = App::start(&config, shutdown).context("start dashboard")?;
    app.run().await.context("run dashboard")?;
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    match path {
        Some(path) => DashboardConfig::from_file(path).context("load config"),
        None => Ok(DashboardConfig::default()),
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
