//! Logging setup based on `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Default filter: verbose for our crates, quiet for the GPU stack.
pub const DEFAULT_FILTER: &str =
    "debug,tessera_instanced=trace,wgpu_core=info,wgpu_hal=info,naga=info";

/// Install a global fmt subscriber with [`DEFAULT_FILTER`].
///
/// `RUST_LOG` takes precedence over the default filter when it is set.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a global fmt subscriber using `filter` unless `RUST_LOG` is set.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
