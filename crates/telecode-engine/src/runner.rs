use std::{process::Stdio, time::Duration};

use telecode_core::{engine::EngineInvocation, errors::Error, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    time::timeout,
};

/// Raw streams of a finished engine process. The runner does no parsing.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run one engine invocation to completion under `deadline`.
///
/// Exactly one child is spawned and it is reaped on every exit path: on
/// timeout it is killed explicitly, and `kill_on_drop` backstops failures
/// during stream setup.
pub async fn run(inv: &EngineInvocation, deadline: Duration) -> Result<ProcessOutput> {
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args)
        .stdin(if inv.stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(program = %inv.program.display(), args = ?inv.args, "spawning engine");
    let mut child = cmd.spawn()?;

    if let Some(payload) = inv.stdin_payload.clone() {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::External("engine stdin was not captured".to_string()))?;
        // Write from a task and drop the handle so the pipe closes; a prompt
        // larger than the pipe buffer must not wedge the wait below.
        tokio::spawn(async move {
            let _ = stdin.write_all(payload.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::External("engine stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::External("engine stderr was not captured".to_string()))?;

    // Drain both pipes concurrently with the wait, otherwise a chatty engine
    // fills a pipe and never exits.
    let out_task = tokio::spawn(read_stream(stdout));
    let err_task = tokio::spawn(read_stream(stderr));

    let status = match timeout(deadline, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            // kill() also reaps the child.
            if let Err(e) = child.kill().await {
                return Err(Error::External(format!(
                    "engine timed out after {}s and could not be killed: {e}",
                    deadline.as_secs()
                )));
            }
            tracing::warn!(timeout_s = deadline.as_secs(), "engine timed out, killed");
            return Err(Error::EngineTimeout(deadline));
        }
    };

    let stdout = out_task
        .await
        .map_err(|e| Error::External(format!("engine stdout reader failed: {e}")))?;
    let stderr = err_task
        .await
        .map_err(|e| Error::External(format!("engine stderr reader failed: {e}")))?;

    if !status.success() {
        let detail = pick_failure_detail(&stderr, &stdout)
            .unwrap_or_else(|| format!("engine exited with status {status}"));
        return Err(Error::EngineExecution(detail));
    }

    Ok(ProcessOutput { stdout, stderr })
}

/// Prefer stderr, then stdout, both trimmed; `None` when both are blank.
fn pick_failure_detail(stderr: &str, stdout: &str) -> Option<String> {
    for s in [stderr, stdout] {
        let t = s.trim();
        if !t.is_empty() {
            return Some(t.to_string());
        }
    }
    None
}

async fn read_stream<R: AsyncRead + Unpin + Send + 'static>(mut r: R) -> String {
    let mut buf = Vec::new();
    let _ = r.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}
