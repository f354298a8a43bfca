use tracing_subscriber::{fmt, EnvFilter};

use crate::{Error, Result};

/// Initialize logging/tracing for the bot.
///
/// Reads `RUST_LOG` at call time, so `.env` must already be loaded
/// (`config::load_env_file`).
pub fn init(service_name: &str) -> Result<()> {
    fmt()
        .with_env_filter(build_filter(service_name))
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}

/// `RUST_LOG` if set, else info for our crates and warn for everything else.
fn build_filter(service_name: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,blob_core=info,blob_telegram=info,{service_name}=info"
        ))
    })
}
