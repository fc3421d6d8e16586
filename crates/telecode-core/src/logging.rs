use tracing_subscriber::{fmt, EnvFilter};

use crate::Result;

/// Initialize tracing for the bridge.
///
/// Default: info for our crates, warn for everything else. Can be
/// overridden with `RUST_LOG`; `verbose` bumps our crates to debug.
pub fn init(service_name: &str, verbose: bool) -> Result<()> {
    let ours = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,telecode={ours},telecode_core={ours},telecode_engine={ours},{service_name}={ours}"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .init();

    Ok(())
}
