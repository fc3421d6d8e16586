//! Child-process adapter for the telecode engine bridge.
//!
//! Runs `claude`/`codex` CLI invocations built by `telecode-core`, enforces
//! the deadline, recovers the session token from the NDJSON event stream
//! and collects the final answer from the capture file.

mod answer;
mod bridge;
mod events;
mod runner;

pub use bridge::EngineBridge;
pub use events::extract_session_token;
pub use runner::{run, ProcessOutput};
