//! Telemetry and Observability
//!
//! Structured logging and request tracing setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,storefront=debug,sqlx=warn,tower_http=debug";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT` wins; otherwise production logs JSON.
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("LOG_FORMAT").ok().as_deref(),
            std::env::var("RUN_ENV").ok().as_deref(),
        )
    }

    fn resolve(log_format: Option<&str>, run_env: Option<&str>) -> Self {
        match log_format.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") | Some("text") => Self::Pretty,
            _ if run_env == Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
    }

    tracing::info!("Tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_resolution() {
        assert_eq!(LogFormat::resolve(None, None), LogFormat::Pretty);
        assert_eq!(LogFormat::resolve(None, Some("production")), LogFormat::Json);
        assert_eq!(
            LogFormat::resolve(Some("pretty"), Some("production")),
            LogFormat::Pretty
        );
        assert_eq!(LogFormat::resolve(Some("JSON"), None), LogFormat::Json);
    }
}
