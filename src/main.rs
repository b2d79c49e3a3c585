use anyhow::{Context, Result};
use clap::Parser;
use stitchshot::{setup_logging, validate_config, Cli, CliRunner, Config};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting stitchshot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config, &args)?;

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx);

    // Dropping the command future on a signal also drops the browser, which
    // kills the Chromium child process.
    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = shutdown_rx.recv() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("cannot read config {}", config_path.display()))?;
        serde_json::from_str(&config_content)
            .with_context(|| format!("cannot parse config {}", config_path.display()))?
    } else {
        Config::default()
    };

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    if let Some(interval) = args.min_interval_ms {
        config.rate_limit.min_interval = Duration::from_millis(interval);
    }

    validate_config(&config)?;

    info!(
        "Output {} at quality {}, capture interval {:?}",
        config.settings.output_format.extension(),
        config.settings.quality(),
        config.rate_limit.min_interval
    );

    Ok(config)
}

fn setup_shutdown_handler(
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        let _ = shutdown_tx.send(());
    })
}
