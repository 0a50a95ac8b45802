// Logging setup for the CLI

use enterprise_repo_config::{LogFormat, LoggingConfig};

/// Logs always go to stderr so stdout stays clean for command output
/// (`outputs --json` is meant to be piped)
fn log_writer() -> std::io::Stderr {
    std::io::stderr()
}

/// Initialize tracing/logging from the stack configuration
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RUST_LOG wins over the configured level when set
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed (idempotent)
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(log_writer)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(log_writer)),
        ),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_both_formats_share_the_stderr_writer() {
        // The same writer function backs the json and text layers
        let _: std::io::Stderr = log_writer.make_writer();
    }

    #[test]
    fn test_init_is_idempotent_across_formats() {
        let json = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        };
        init_tracing(&json);
        init_tracing(&LoggingConfig::default());
        tracing::info!("still logging after a second init");
    }
}
