//! Subscriber setup.

use super::exporter;
use opentelemetry::trace::TracerProvider as _;
use std::path::Path;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// File name of the span log inside the data directory.
pub const SPAN_FILE: &str = "arcanvas-spans.jsonl";

/// Installs the global subscriber: human-readable events on stderr plus
/// every finished span exported to `<data_dir>/arcanvas-spans.jsonl`.
///
/// # Parameters
///
/// * `trace_level` - Filter directive used when `RUST_LOG` is unset
/// * `data_dir` - Directory for the span file
///
/// # Level Resolution
///
/// 1. `RUST_LOG`
/// 2. `trace_level`
/// 3. `"info"`
///
/// If the data directory cannot be created only the stderr layer is
/// installed. A second call leaves the first subscriber in place.
///
/// # Example
///
/// ```rust
/// let dir = std::env::temp_dir().join("arcanvas-doc");
/// arcanvas::observability::init_tracing(Some("debug"), &dir);
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(trace_level: Option<&str>, data_dir: &Path) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(trace_level.unwrap_or("info")));

    let span_layer = match std::fs::create_dir_all(data_dir) {
        Ok(()) => {
            let provider = exporter::tracer_provider(&data_dir.join(SPAN_FILE), "arcanvas");
            Some(OpenTelemetryLayer::new(provider.tracer("arcanvas")))
        }
        Err(e) => {
            eprintln!("span export disabled: cannot create {}: {e}", data_dir.display());
            None
        }
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(span_layer)
        .try_init();
}
