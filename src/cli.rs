use crate::{
    format_bytes, format_duration, validate_config, BrowserSession, CaptureReport,
    CaptureService, CdpPage, Config, FileDelivery, OutputFormat, PrometheusExporter, TilePlan,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "stitchshot")]
#[command(about = "Full-page screenshots stitched from viewport captures")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, global = true, help = "Minimum milliseconds between captures")]
    pub min_interval_ms: Option<u64>,

    #[arg(long, global = true, help = "Print Prometheus metrics when done")]
    pub metrics: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a full-page screenshot of a URL
    Capture {
        #[arg(short, long, help = "URL to capture")]
        url: String,

        #[arg(short, long, help = "Output directory")]
        output: PathBuf,

        #[arg(long, help = "Output format (webp, jpeg, png)")]
        format: Option<String>,

        #[arg(long, help = "Output quality between 0 and 1")]
        quality: Option<f32>,

        #[arg(long, help = "Viewport width")]
        width: Option<u32>,

        #[arg(long, help = "Viewport height")]
        height: Option<u32>,

        #[arg(long, help = "Device scale factor")]
        scale: Option<f64>,

        #[arg(long, help = "Wait time in milliseconds after the page loads")]
        wait: Option<u64>,

        #[arg(long, help = "Print the capture report as JSON")]
        json: bool,
    },

    /// Print the scroll offsets for a page height
    Plan {
        #[arg(long, help = "Scrollable content height, CSS px")]
        total_height: u32,

        #[arg(long, help = "Visible height, CSS px")]
        viewport_height: u32,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub url: String,
    pub output: PathBuf,
    pub format: Option<String>,
    pub quality: Option<f32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
    pub wait: Option<u64>,
    pub json: bool,
}

impl CaptureOptions {
    /// Layer the per-command flags over `config`.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(format) = &self.format {
            config.settings.output_format = format
                .parse::<OutputFormat>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(quality) = self.quality {
            config.settings.output_quality = quality;
        }
        if let Some(width) = self.width {
            config.viewport.width = width;
        }
        if let Some(height) = self.height {
            config.viewport.height = height;
        }
        if let Some(scale) = self.scale {
            config.viewport.device_scale_factor = scale;
        }
        if let Some(wait) = self.wait {
            config.page_load_wait = Duration::from_millis(wait);
        }
        Ok(())
    }
}

pub struct CliRunner {
    pub config: Config,
    exporter: Option<PrometheusExporter>,
}

impl CliRunner {
    pub fn new(config: Config, args: &Cli) -> Result<Self> {
        let exporter = if args.metrics {
            Some(
                PrometheusExporter::install()
                    .map_err(|e| anyhow!("failed to install metrics recorder: {e}"))?,
            )
        } else {
            None
        };

        Ok(Self { config, exporter })
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        let result = match command {
            Commands::Capture {
                url,
                output,
                format,
                quality,
                width,
                height,
                scale,
                wait,
                json,
            } => {
                self.run_capture(CaptureOptions {
                    url,
                    output,
                    format,
                    quality,
                    width,
                    height,
                    scale,
                    wait,
                    json,
                })
                .await
            }
            Commands::Plan {
                total_height,
                viewport_height,
            } => self.run_plan(total_height, viewport_height),
            Commands::Validate { config } => self.validate_config(config).await,
        };

        if let Some(exporter) = &self.exporter {
            println!("{}", exporter.render());
        }

        result
    }

    pub async fn run_capture(&self, options: CaptureOptions) -> Result<()> {
        let mut config = self.config.clone();
        options.apply(&mut config)?;
        validate_config(&config)?;

        info!("Capturing {}", options.url);

        let browser = BrowserSession::launch(&config).await?;
        let result = self.capture_with(&browser, &config, &options).await;
        browser.shutdown().await;
        let report = result?;

        if options.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, &options);
        }

        Ok(())
    }

    async fn capture_with(
        &self,
        browser: &BrowserSession,
        config: &Config,
        options: &CaptureOptions,
    ) -> Result<CaptureReport> {
        let page = Arc::new(CdpPage::new(browser.open_page(&options.url).await?));
        let title = page.page_title().await;

        let service = CaptureService::new(
            page.clone(),
            page.clone(),
            Arc::new(FileDelivery::new(options.output.clone())),
            config.clone(),
        );
        let report = service
            .capture(&title)
            .await
            .with_context(|| format!("capture of {} failed", options.url))?;

        if report.gap_count() > 0 {
            warn!(
                "{} of {} tiles could not be captured",
                report.gap_count(),
                report.tiles.len()
            );
        }

        if let Err(e) = page.page().clone().close().await {
            warn!("Failed to close page: {}", e);
        }

        Ok(report)
    }

    pub fn run_plan(&self, total_height: u32, viewport_height: u32) -> Result<()> {
        let plan = TilePlan::new(total_height, viewport_height);

        println!("{} tiles:", plan.len());
        for tile in plan.tiles() {
            println!(
                "  #{:<3} offset {:>6}  rows {}",
                tile.index, tile.offset, tile.content_height
            );
        }

        Ok(())
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("cannot read {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("cannot parse {}", config_path.display()))?;
        validate_config(&config)?;

        println!("Configuration is valid:");
        println!(
            "  Output: {} at quality {}",
            config.settings.output_format.extension(),
            config.settings.quality()
        );
        println!("  Capture interval: {:?}", config.rate_limit.min_interval);
        println!(
            "  Viewport: {}x{} @ {}x",
            config.viewport.width, config.viewport.height, config.viewport.device_scale_factor
        );

        Ok(())
    }
}

fn print_report(report: &CaptureReport, options: &CaptureOptions) {
    println!("Screenshot captured successfully:");
    println!("  URL: {}", options.url);
    println!("  Output: {}", options.output.join(&report.filename).display());
    println!("  Size: {}x{}", report.width, report.height);
    println!("  Encoded: {}", format_bytes(report.encoded_size));
    println!(
        "  Tiles: {} ({} gaps)",
        report.tiles.len(),
        report.gap_count()
    );
    println!(
        "  Overlays hidden/restored: {}/{}",
        report.overlays_hidden, report.overlays_restored
    );
    println!("  Duration: {}", format_duration(report.duration));
}

pub fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))?;

    Ok(())
}
