use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = select_filter(config, env_directive.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
}

/// Environment directive if it is usable, otherwise the configured one
fn select_filter(config: &LoggingConfig, env_directive: Option<&str>) -> Result<EnvFilter> {
    if let Some(directive) = env_directive.filter(|d| !d.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(directive)
    {
        return Ok(filter);
    }

    let directive = config.directive();
    EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid logging filter '{}'", directive))
}
