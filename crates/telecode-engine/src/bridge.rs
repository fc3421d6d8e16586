use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use telecode_core::{
    config::Config,
    domain::SessionToken,
    engine::{EngineKind, EnginePort, EngineProfile, EngineRequest, EngineResult},
    Result,
};

use crate::{answer, events, runner};

/// One engine variant wired to a concrete program path.
///
/// Each `invoke` spawns a fresh child process; continuity across turns
/// exists only through the session token threaded by the caller.
pub struct EngineBridge {
    profile: &'static EngineProfile,
    program: PathBuf,
    default_timeout: Duration,
}

impl EngineBridge {
    pub fn new(kind: EngineKind, program: impl Into<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            profile: kind.profile(),
            program: program.into(),
            default_timeout,
        }
    }

    pub fn from_config(cfg: &Config, kind: EngineKind) -> Self {
        Self::new(kind, cfg.engine_path(kind), cfg.query_timeout)
    }
}

#[async_trait]
impl EnginePort for EngineBridge {
    fn kind(&self) -> EngineKind {
        self.profile.kind
    }

    async fn invoke(&self, req: EngineRequest) -> Result<EngineResult> {
        // The capture file exists (empty) before the child starts and is
        // removed when this guard drops, on success and failure alike.
        let capture = tempfile::Builder::new()
            .prefix("telecode-answer-")
            .tempfile()?;

        let inv = self
            .profile
            .build_invocation(&req, &self.program, capture.path());
        let deadline = req.timeout.unwrap_or(self.default_timeout);

        let out = runner::run(&inv, deadline).await?;

        let combined = format!("{}\n{}", out.stdout, out.stderr);
        let session = events::extract_session_token(&combined)
            .map(SessionToken)
            .or_else(|| req.resume.clone());
        let answer = answer::read_answer(capture.path()).await?;

        tracing::info!(
            engine = %self.profile.kind,
            resumed = req.resume.is_some(),
            minted = session != req.resume,
            "engine turn complete"
        );

        Ok(EngineResult {
            answer,
            session,
            log: combined.trim().to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};

    use telecode_core::errors::Error;

    use super::*;

    /// Write an executable stub engine script into `dir`.
    fn stub_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("engine.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Shell snippet resolving the capture path from the argv.
    const FIND_CAPTURE: &str = r#"
prev=""
out=""
for a in "$@"; do
  if [ "$prev" = "--output-last-message" ]; then out="$a"; fi
  prev="$a"
done
"#;

    #[tokio::test]
    async fn end_to_end_answer_and_token() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_engine(
            dir.path(),
            &format!("echo '{{\"session_id\":\"S1\"}}'\n{FIND_CAPTURE}printf '4' > \"$out\""),
        );

        let bridge = EngineBridge::new(EngineKind::Codex, &stub, Duration::from_secs(30));
        let res = bridge.invoke(EngineRequest::new("2+2?")).await.unwrap();

        assert_eq!(res.answer, "4");
        assert_eq!(res.session, Some(SessionToken("S1".to_string())));
        assert!(res.log.contains("session_id"));
    }

    #[tokio::test]
    async fn prior_token_survives_a_run_that_mints_none() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_engine(
            dir.path(),
            &format!("echo 'no json here'\n{FIND_CAPTURE}printf 'ok' > \"$out\""),
        );

        let bridge = EngineBridge::new(EngineKind::Codex, &stub, Duration::from_secs(30));
        let mut req = EngineRequest::new("hi again");
        req.resume = Some(SessionToken("prior".to_string()));
        let res = bridge.invoke(req).await.unwrap();

        assert_eq!(res.answer, "ok");
        assert_eq!(res.session, Some(SessionToken("prior".to_string())));
    }

    #[tokio::test]
    async fn empty_capture_file_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Exits zero without writing an answer.
        let stub = stub_engine(dir.path(), "echo '{\"session_id\":\"S2\"}'");

        let bridge = EngineBridge::new(EngineKind::Codex, &stub, Duration::from_secs(30));
        let err = bridge.invoke(EngineRequest::new("anything")).await.unwrap_err();
        assert!(matches!(err, Error::EngineEmptyOutput));
    }

    #[tokio::test]
    async fn runner_failure_propagates_without_collection() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_engine(dir.path(), "echo 'bad prompt' 1>&2\nexit 1");

        let bridge = EngineBridge::new(EngineKind::Codex, &stub, Duration::from_secs(30));
        let err = bridge.invoke(EngineRequest::new("nope")).await.unwrap_err();
        match err {
            Error::EngineExecution(detail) => assert_eq!(detail, "bad prompt"),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn per_request_deadline_overrides_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let stub = stub_engine(dir.path(), "sleep 30");

        let bridge = EngineBridge::new(EngineKind::Codex, &stub, Duration::from_secs(600));
        let mut req = EngineRequest::new("slow");
        req.timeout = Some(Duration::from_millis(100));
        let err = bridge.invoke(req).await.unwrap_err();
        assert!(matches!(err, Error::EngineTimeout(d) if d == Duration::from_millis(100)));
    }
}
