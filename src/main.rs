//! hookrelay command-line entry point.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use hookrelay::{
    cli::{Cli, ClientArgs, Command, SendArgs, USAGE_EXIT_CODE},
    logging, run_relay, ConfigOverrides, RelayConfig, RelaySettings,
};
use hookrelay_delivery::{replay_file, ForwardClient};
use hookrelay_stream::SseSource;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_or_exit();
    logging::init(cli.verbose)?;

    match cli.command {
        Command::Show(args) => relay(cli.config.as_deref(), args.source, None, args.client).await,
        Command::Forward(args) => {
            relay(cli.config.as_deref(), args.source, Some(args.target), args.client).await
        },
        Command::Send(args) => send(cli.config.as_deref(), args).await,
    }
}

/// Loads configuration; invalid settings are a usage error.
fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> RelayConfig {
    match RelayConfig::load(path, overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(USAGE_EXIT_CODE);
        },
    }
}

async fn relay(
    config_path: Option<&Path>,
    source: String,
    target: Option<String>,
    client: ClientArgs,
) -> Result<()> {
    let config = load_config(config_path, &client.overrides());
    let event_source = Arc::new(
        SseSource::new(source.as_str(), &config.sse_config())
            .context("Failed to create stream client")?,
    );

    let settings = RelaySettings { source, target, save: client.save, config };
    run_relay(settings, event_source, shutdown_signal()).await?;
    Ok(())
}

async fn send(config_path: Option<&Path>, args: SendArgs) -> Result<()> {
    let config = load_config(config_path, &ConfigOverrides::default());
    let client =
        ForwardClient::new(config.client_config()).context("Failed to build forwarding client")?;

    replay_file(&client, &args.source, &args.filename)
        .await
        .with_context(|| format!("Failed to read {}", args.filename.display()))?;
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        () = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
