use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "chama_loans=info";

/// install a fmt subscriber once per process; later calls are no-ops
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // another subscriber may already be installed by the host binary
        let _ = fmt().with_env_filter(filter).try_init();
        tracing::info!("chama-loans tracing initialized");
    });
}
