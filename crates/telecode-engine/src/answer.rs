use std::path::Path;

use telecode_core::{errors::Error, Result};

/// Read the engine's final answer from the capture file.
///
/// Only called after the process has fully exited on a non-timeout path
/// (after a timeout the file may hold a partial write, so it is never
/// read). An existing-but-empty file is a failure, not an empty answer.
pub async fn read_answer(capture_path: &Path) -> Result<String> {
    let raw = tokio::fs::read_to_string(capture_path).await?;
    let answer = raw.trim();
    if answer.is_empty() {
        return Err(Error::EngineEmptyOutput);
    }
    Ok(answer.to_string())
}
