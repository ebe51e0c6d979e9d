//! Tracing initialisation for tex2pdf binaries.
//!
//! Log lines always go to stderr: stdout is reserved for the compile
//! result (`--json` emits it there). Respects `RUST_LOG` for fine-grained
//! filtering, falling back to the supplied level otherwise. Safe to call
//! more than once; the global subscriber can only be set once per process
//! and later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json` — when `true`, emit newline-delimited JSON log lines.
/// * `level` — default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
