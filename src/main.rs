use std::sync::Arc;
use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use nina_panel::{
    config::{apply_feed_filter, load_config, AppConfig},
    core::{error::NinaError, session::Session, types::GeoPoint},
    ui::{
        headless::{StdoutHost, ViewFormat},
        terminal::run_tui,
    },
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Mainz, the default region of the dashboard feeds.
const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: 49.9929,
    lon: 8.2473,
};

#[derive(Parser, Debug)]
#[command(
    name = "nina-panel",
    version,
    about = "NINA emergency warnings ranked by severity and distance"
)]
struct Cli {
    /// Path to config file (TOML). Default: config/nina.toml
    #[arg(long)]
    config: Option<String>,
    /// Comma-separated feed names to enable (case-insensitive)
    #[arg(long, value_delimiter = ',')]
    feeds: Option<Vec<String>>,
    /// Comma-separated region codes for the dashboard feed
    #[arg(long, value_delimiter = ',')]
    region: Option<Vec<String>>,
    /// Viewport center as "lat,lon"
    #[arg(long, value_parser = parse_center)]
    center: Option<GeoPoint>,
    /// Use first-release settings: stop at the first answering feed, 15 warnings
    #[arg(long)]
    first_revision: bool,
    /// Run one refresh cycle and exit
    #[arg(long)]
    once: bool,
    /// Output format for headless runs
    #[arg(long, default_value = "html", value_enum)]
    format: FormatArg,
    /// Show the panel in the terminal
    #[arg(long)]
    tui: bool,
    /// Increase verbosity (info, debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Optional log file path
    #[arg(long, default_value = "data/nina.log")]
    log_file: String,
}

#[derive(ValueEnum, Clone, Debug)]
enum FormatArg {
    Html,
    Json,
}

impl From<FormatArg> for ViewFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Html => ViewFormat::Html,
            FormatArg::Json => ViewFormat::Json,
        }
    }
}

fn parse_center(value: &str) -> anyhow::Result<GeoPoint> {
    GeoPoint::parse(value)
        .ok_or_else(|| anyhow!("expected \"lat,lon\" in degrees"))
        .with_context(|| format!("invalid center {:?}", value))
}

#[tokio::main]
async fn main() -> Result<(), NinaError> {
    let cli = Cli::parse();

    init_tracing(&cli)?;

    let cfg = build_config(&cli)?;
    tracing::info!(
        "config: {:?} mode, radius {} km, max {} warnings",
        cfg.fetch_mode,
        cfg.radius_km,
        cfg.max_alerts
    );

    if cli.tui {
        let center = cli.center.unwrap_or(DEFAULT_CENTER);
        return run_tui(cfg, center).await;
    }

    let host = Arc::new(StdoutHost::new(cli.format.clone().into(), cli.center));
    let session = Session::mount(host, &cfg).await?;
    if !cli.once {
        tracing::info!(
            "refreshing every {}s, Ctrl-C to stop",
            cfg.refresh_interval_secs
        );
        tokio::signal::ctrl_c().await?;
    }
    session.teardown();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<AppConfig, NinaError> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if cli.first_revision {
        cfg = cfg.into_first_revision();
    }
    if let Some(codes) = &cli.region {
        cfg.region_codes = codes.clone();
    }
    cfg = apply_feed_filter(cfg, cli.feeds.as_deref());
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli) -> Result<(), NinaError> {
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_path = Path::new(&cli.log_file);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| NinaError::Config(e.to_string()))?;
    }
    if log_path.exists() {
        if let Ok(meta) = fs::metadata(log_path) {
            if meta.len() > 1_000_000 {
                let rotated = log_path.with_extension("log.1");
                let _ = fs::rename(log_path, rotated);
            }
        }
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| NinaError::Config(e.to_string()))?;

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false);

    // The terminal UI owns stdout; headless runs print views there, logs go to stderr.
    let console_layer = (!cli.tui).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| NinaError::Config(e.to_string()))
}
