use std::time::Duration;

/// Core error type for telecode.
///
/// Engine failures are per-invocation and never fatal to the hosting
/// process; the dispatch layer decides what to surface to the chat.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The engine did not exit before the deadline. The child has been
    /// killed and reaped; callers should suggest retrying rather than
    /// blindly resuming the same token.
    #[error("engine timed out after {}s", .0.as_secs())]
    EngineTimeout(Duration),

    /// The engine exited non-zero. Carries whichever of stderr/stdout was
    /// non-empty (stderr preferred), verbatim, for diagnostics.
    #[error("engine failed: {0}")]
    EngineExecution(String),

    /// The engine exited successfully but wrote nothing to the capture
    /// file. Treated as a failure so an empty message is never forwarded.
    #[error("engine returned empty output")]
    EngineEmptyOutput,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
