use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize tracing for the CLI.
///
/// Filter comes from `STARLET_LOG` (default `info`). Setting
/// `STARLET_LOG_FILE` adds a debug-level file layer for offline inspection.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("STARLET_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Ok(log_path) = std::env::var("STARLET_LOG_FILE") {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        registry.with(file_layer).init();
        eprintln!("File logging enabled: {log_path}");
    } else {
        registry.init();
    }
    Ok(())
}
