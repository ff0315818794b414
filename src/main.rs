use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::error;
use sensormon::RunOptions;
use std::path::PathBuf;

/// Periodically checks remote sensors and mails their owners about faults.
#[derive(Parser, Debug)]
#[command(name = "sensormon", version)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE", default_value = sensormon::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the file holding the mailer secret; alerts are only logged without one.
    #[arg(short = 'm', long, value_name = "FILE")]
    mailer_secret: Option<PathBuf>,

    /// Run a single check and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let options = RunOptions {
        config_path: args.config,
        mailer_secret: args.mailer_secret,
        once: args.once,
    };

    // Load configuration first (without logging), a broken file at startup is fatal
    let config = sensormon::load_config(&options).map_err(|e| {
        eprintln!("Failed to load configuration: {:#}", e);
        e
    })?;

    // Initialise logger with a configured log level
    Builder::new()
        .filter_level(config.get_log_level())
        .write_style(WriteStyle::Always)
        .format_timestamp_secs()
        .init();

    if let Err(e) = sensormon::run(config, options).await {
        error!("Application error: {}", e);
        return Err(e);
    }
    Ok(())
}
