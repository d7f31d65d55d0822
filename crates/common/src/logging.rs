use crate::config::Environment;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// `RUST_LOG` filter, `info` when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Formatting layer for `environment`: JSON lines in production, pretty
/// coloured output in development.
pub fn fmt_layer<S>(environment: Environment) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match environment {
        Environment::Production => tracing_subscriber::fmt::layer()
            .json()
            .with_level(true)
            .boxed(),
        Environment::Development => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(true)
            .boxed(),
    }
}

/// Initialize the global tracing subscriber without an exporter.
///
/// The OpenTelemetry layer is still installed so spans reach a tracer
/// provider registered later; use [`crate::TelemetryGuard::init`] instead when
/// an OTLP endpoint is configured.
pub fn setup_logging(environment: Environment) {
    let result = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer())
        .with(fmt_layer(environment))
        .try_init();

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {e}");
    }
}
