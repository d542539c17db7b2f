//! Log output for the binaries.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber. `RUST_LOG` directives apply on top of `info`.
///
/// `korad_psu=debug` shows every command and reply on the wire.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}
