//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber at the configured level.
///
/// A parsable `RUST_LOG` takes precedence over `level`. Calling this twice is
/// harmless; the second subscriber is discarded.
pub fn init_tracing(level: &str) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let _ = tracing_subscriber::registry()
        .with(log_filter(level, rust_log.as_deref()))
        .with(fmt::layer().with_target(false))
        .try_init();
}

fn log_filter(level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

pub fn shutdown_tracing() {
    tracing::info!("functions server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn configured_level_applies_without_rust_log() {
        assert_eq!(
            log_filter("debug", None).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn rust_log_wins_when_valid() {
        assert_eq!(
            log_filter("debug", Some("warn")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            log_filter("error", Some("qbuilder=notalevel")).max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }
}
