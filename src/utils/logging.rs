use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// default level; the `json` format is meant for container deployments.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    match format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .json()
                .with_current_span(false)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(false).init();
        }
    }
}
