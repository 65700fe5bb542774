//! Diagnostic logging via `tracing`.
//!
//! `RUST_LOG` wins over `[logging] level`. Everything goes to stderr so that
//! stdout stays reserved for command output.

use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Safe to call once per process.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let builder = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

/// Our crates at `level`, dependencies capped at `warn` so HTTP internals
/// stay quiet unless asked for.
fn default_directive(level: &str) -> String {
    format!(
        "warn,arxiv_harvest={level},arxiv_harvest_core={level},harvest={level}",
        level = level
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_our_crates() {
        let d = default_directive("debug");
        assert!(d.starts_with("warn,"));
        assert!(d.contains("arxiv_harvest=debug"));
        assert!(EnvFilter::try_new(&d).is_ok());
    }
}
