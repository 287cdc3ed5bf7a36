//! Logging initialization for the layerscan binary.
//!
//! Configures `tracing-subscriber` from the `[log]` section of [`Config`](crate::Config)
//! and the command line verbosity. Logs always go to stderr so they never mix
//! with table or JSON output on stdout.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Resolves the level filter: `--quiet` wins, then `-v`/`-vv`, then the config level.
pub fn effective_level(config: &LogConfig, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => config.level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called once, before any tracing macros are used. `RUST_LOG`
/// overrides the computed level when set.
pub fn init_tracing(config: &LogConfig, verbose: u8, quiet: bool) -> Result<()> {
    let level = effective_level(config, verbose, quiet);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    if config.structured {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level() {
        let config = LogConfig::default();

        assert_eq!(effective_level(&config, 0, false), "warn");
        assert_eq!(effective_level(&config, 1, false), "info");
        assert_eq!(effective_level(&config, 2, false), "debug");
        assert_eq!(effective_level(&config, 5, false), "trace");
        assert_eq!(effective_level(&config, 2, true), "error");
    }
}
