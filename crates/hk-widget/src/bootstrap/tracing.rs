//! Tracing configuration for the Heka widget
//!
//! ## Behavior / 行为
//!
//! - **Development**: debug level, outputs to stdout
//! - **Production**: info level, outputs to stdout
//! - **Environment filter**: respects `RUST_LOG`, with sensible defaults

use std::io;

use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, registry};

/// Check if running in development environment
fn is_development() -> bool {
    cfg!(debug_assertions)
}

/// Build the default filter directives for tracing
fn build_filter_directives(is_dev: bool) -> Vec<String> {
    let level = if is_dev { "debug" } else { "info" };
    vec![
        level.to_string(),
        format!("hk_core={level}"),
        format!("hk_app={level}"),
        format!("hk_infra={level}"),
        format!("hk_widget={level}"),
    ]
}

/// Initialize the tracing subscriber.
///
/// Call once, before the first widget is created:
///
/// ```ignore
/// hk_widget::bootstrap::tracing::init_tracing_subscriber()?;
/// ```
///
/// ## Errors / 错误
///
/// Returns `Err` if a global subscriber is already registered.
pub fn init_tracing_subscriber() -> anyhow::Result<()> {
    let filter_directives = build_filter_directives(is_development());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directives.join(",")));

    // "2025-01-15 10:30:45.123 INFO [file.rs:42] [target] message"
    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(cfg!(not(test)))
        .with_writer(BoxMakeWriter::new(io::stdout));

    registry().with(env_filter).with(stdout_layer).try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_build_profile() {
        let dev = build_filter_directives(true);
        assert_eq!(dev[0], "debug");
        assert!(dev.contains(&"hk_app=debug".to_string()));

        let prod = build_filter_directives(false);
        assert_eq!(prod[0], "info");
        assert!(prod.contains(&"hk_widget=info".to_string()));
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let _ = init_tracing_subscriber();
        assert!(init_tracing_subscriber().is_err());
    }

    #[test]
    fn directives_parse() {
        for is_dev in [true, false] {
            let joined = build_filter_directives(is_dev).join(",");
            assert!(tracing_subscriber::EnvFilter::try_new(joined).is_ok());
        }
    }
}
