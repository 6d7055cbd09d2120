//! Shared start-up code of the job queue binaries.

use queue_core::JobOptions;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load `.env` and install the tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init(default_filter: &str) {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parse a `-o` option: `key=value` gives a string, a bare `key` gives `true`.
pub fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = match raw.split_once('=') {
        Some((name, value)) => (name, Value::String(value.to_string())),
        None => (raw, Value::Bool(true)),
    };

    let name = name.trim().trim_start_matches("--");
    if name.is_empty() {
        return Err(format!("option `{}` has no name", raw));
    }

    Ok((name.to_string(), value))
}

/// Collect parsed `-o` options.
pub fn job_options(options: Vec<(String, Value)>) -> JobOptions {
    options.into_iter().collect()
}
