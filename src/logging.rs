use tracing_subscriber::{fmt::time::UtcTime, prelude::*};

use crate::config::Environment;

/// Initialize logging: human-readable text in development, JSON in
/// production. `RUST_LOG` overrides the default "info" filter.
pub fn init(env: Environment) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match env {
        Environment::Production => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(std::io::stdout),
                )
                .try_init();
        }
        Environment::Development => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(true)
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(std::io::stdout),
                )
                .try_init();
        }
    }
}
