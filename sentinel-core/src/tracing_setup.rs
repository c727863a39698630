//! Tracing subscriber bootstrap for hosts that embed the analyzer as a library
//! and want its `trace!`/`debug!`/`warn!` output without wiring up `tracing`
//! themselves.

use tracing_subscriber::EnvFilter;

/// Install a process-wide `tracing` subscriber driven by `RUST_LOG` (or
/// `sentinel=info` if unset). Safe to call more than once; later calls are
/// no-ops.
pub fn init_default() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentinel=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
