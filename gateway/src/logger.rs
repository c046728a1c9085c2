//! Logger initialization from the `log` config section

use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Initializes the global tracing subscriber
///
/// # Errors
///
/// Returns an error on an invalid filter directive, an unopenable log
/// file, or double initialization; startup treats that as fatal.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log level {:?}", config.level))?;
    let json = config.format == "json";

    let result = if config.output == "file" {
        let path = config
            .file_path
            .as_deref()
            .context("log.output is \"file\" but log.file_path is not set")?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {path}"))?;
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false);
        if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        }
    } else {
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        }
    };

    result.map_err(|err| anyhow::anyhow!("failed to initialize logger: {err}"))
}
