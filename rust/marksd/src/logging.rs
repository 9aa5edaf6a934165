use crate::config::DaemonConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "marksd=info";

/// Installs the global subscriber. Everything goes to stderr; stdout is the
/// IPC channel.
pub fn init(cfg: &DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match cfg.log_filter.as_deref() {
        Some(level) => EnvFilter::try_new(expand_level(level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cfg.log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }
    Ok(())
}

/// A bare level such as `debug` applies to this crate only.
fn expand_level(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("marksd={level}")
    }
}
