use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;

use fftscope::audio::AudioSource;
use fftscope::cli::Args;
use fftscope::config::Config;
use fftscope::display::{self, DisplayMode};

/// How long to wait for the capture thread before leaving it behind
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fftscope=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Config written to {}", path.display());
        return Ok(());
    }

    if args.list_sources {
        return list_sources();
    }

    // Load config: explicit path > default path > defaults
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);
    config.validate()?;

    info!(
        "Starting fftscope: {:?} source, {:?} display",
        config.audio.source, config.display.mode
    );

    let source = fftscope::open_source(&config.audio)?;
    info!("Capturing from {}", source.describe());

    let (capture, reader) =
        fftscope::create_pipeline(config.audio.sample_rate, &config.analysis, source)?;

    let result = match config.display.mode {
        DisplayMode::Terminal => display::terminal::run(&config, reader, &capture).await,
        DisplayMode::Monitor => display::monitor::run(&config, reader, &capture).await,
    };

    // Stats are logged by the capture thread as it exits
    let _ = capture.shutdown(SHUTDOWN_TIMEOUT);

    result
}

#[cfg(feature = "pulse")]
fn list_sources() -> Result<()> {
    for (name, description) in fftscope::audio::list_sources()? {
        println!("{}\t{}", name, description);
    }
    Ok(())
}

#[cfg(not(feature = "pulse"))]
fn list_sources() -> Result<()> {
    anyhow::bail!("built without PulseAudio support (enable the `pulse` feature)")
}
