//! Tracing subscriber setup for host binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.  Call once from the host's entry
/// point; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("causerie_session=debug,causerie_graph=info,causerie_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
