//! Structured logging setup, mirroring the teacher's own `tracing-subscriber`
//! wiring: an `EnvFilter`-driven formatter callers opt into from a binary or
//! test harness, never initialized implicitly by the library itself.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, ViewError};

/// Installs a global `tracing` subscriber filtered by `level` (an
/// `EnvFilter` directive string, e.g. `"pagedview=debug"`).
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| ViewError::UserCallbackFault(format!("invalid log filter: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| ViewError::UserCallbackFault("logging already initialized".into()))
}
