use std::str::FromStr;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Log line format, selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{}', expected 'text' or 'json'", other),
        }
    }
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. `RUST_LOG` controls filtering (default `info`).
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry();
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_filter(build_env_filter()),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .json()
                    .with_filter(build_env_filter()),
            )
            .try_init()?,
    }
    Ok(())
}
