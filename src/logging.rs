//! Logging setup for hosts embedding rapid-media

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging system
///
/// Reads the filter from `RUST_LOG`, falling back to `info`. Fails if a global
/// subscriber has already been installed.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
