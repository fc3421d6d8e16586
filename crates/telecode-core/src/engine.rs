//! Engine variants and the pure command builder.
//!
//! Each supported CLI engine gets its own invocation table (program name,
//! flag spellings, resume syntax) so call sites never branch on engine
//! names. Building an invocation does no I/O; the child-process side lives
//! in `telecode-engine`.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use async_trait::async_trait;

use crate::{domain::SessionToken, errors::Error, Result};

/// The fixed set of supported CLI engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Claude,
    Codex,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Claude => "claude",
            EngineKind::Codex => "codex",
        }
    }

    pub fn profile(self) -> &'static EngineProfile {
        match self {
            EngineKind::Claude => &CLAUDE_PROFILE,
            EngineKind::Codex => &CODEX_PROFILE,
        }
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(EngineKind::Claude),
            "codex" => Ok(EngineKind::Codex),
            other => Err(Error::Config(format!("unknown engine: {other}"))),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an engine spells "resume this session".
#[derive(Clone, Copy, Debug)]
pub enum ResumeStyle {
    /// `resume <token>` spliced into the argument list at a fixed position
    /// (after the exec sub-command, before the base flags).
    Subcommand { insert_at: usize },
    /// A `--resume <token>` style flag appended after the base flags.
    Flag(&'static str),
}

/// Per-engine invocation table.
#[derive(Clone, Debug)]
pub struct EngineProfile {
    pub kind: EngineKind,
    /// Default program name, looked up on PATH unless config overrides it.
    pub program: &'static str,
    pub base_args: &'static [&'static str],
    /// Flag directing the final answer into the capture file.
    pub output_flag: &'static str,
    pub resume: ResumeStyle,
    pub image_flag: &'static str,
}

pub static CLAUDE_PROFILE: EngineProfile = EngineProfile {
    kind: EngineKind::Claude,
    program: "claude",
    base_args: &["-p", "--output-format", "stream-json", "--verbose"],
    output_flag: "--output-last-message",
    resume: ResumeStyle::Flag("--resume"),
    image_flag: "--image",
};

pub static CODEX_PROFILE: EngineProfile = EngineProfile {
    kind: EngineKind::Codex,
    program: "codex",
    base_args: &["exec", "--json", "--skip-git-repo-check"],
    output_flag: "--output-last-message",
    resume: ResumeStyle::Subcommand { insert_at: 1 },
    image_flag: "--image",
};

/// One conversational turn, as the dispatch layer hands it to us.
#[derive(Clone, Debug)]
pub struct EngineRequest {
    pub prompt: String,
    /// Token from a previous turn, if the caller wants continuity.
    pub resume: Option<SessionToken>,
    /// Per-request deadline; the bridge falls back to its configured default.
    pub timeout: Option<Duration>,
    /// Image attachments, in order.
    pub images: Vec<PathBuf>,
}

impl EngineRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resume: None,
            timeout: None,
            images: Vec::new(),
        }
    }
}

/// A concrete child-process invocation, derived from one request.
///
/// The capture file exists (empty) before the process starts and is owned
/// by the invoking bridge, which removes it once the call completes.
#[derive(Clone, Debug)]
pub struct EngineInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub capture_path: PathBuf,
    /// Present only when images are attached: the prompt then travels over
    /// stdin because it cannot be passed positionally next to image flags.
    pub stdin_payload: Option<String>,
}

/// What one successful invocation produced.
#[derive(Clone, Debug)]
pub struct EngineResult {
    /// Final answer text; never empty.
    pub answer: String,
    /// Token for the next turn. Carries the request's prior token forward
    /// when the run minted nothing new.
    pub session: Option<SessionToken>,
    /// Combined stdout + stderr, trimmed, for diagnostics.
    pub log: String,
}

impl EngineProfile {
    /// Build the argument vector for one request. Pure; no I/O.
    ///
    /// Known limitation, kept on purpose: when image attachments are
    /// present the prompt moves to stdin and no resume syntax is emitted,
    /// so an image turn silently starts a fresh session even if the caller
    /// supplied a prior token.
    pub fn build_invocation(
        &self,
        req: &EngineRequest,
        program: &Path,
        capture_path: &Path,
    ) -> EngineInvocation {
        let mut args: Vec<String> = self.base_args.iter().map(|s| s.to_string()).collect();
        args.push(self.output_flag.to_string());
        args.push(capture_path.display().to_string());

        for image in &req.images {
            args.push(self.image_flag.to_string());
            args.push(image.display().to_string());
        }

        if !req.images.is_empty() {
            return EngineInvocation {
                program: program.to_path_buf(),
                args,
                capture_path: capture_path.to_path_buf(),
                stdin_payload: Some(req.prompt.clone()),
            };
        }

        if let Some(token) = &req.resume {
            match self.resume {
                ResumeStyle::Subcommand { insert_at } => {
                    args.insert(insert_at, token.0.clone());
                    args.insert(insert_at, "resume".to_string());
                }
                ResumeStyle::Flag(flag) => {
                    args.push(flag.to_string());
                    args.push(token.0.clone());
                }
            }
        }

        // Prompt is always the final positional argument on non-image turns.
        args.push(req.prompt.clone());

        EngineInvocation {
            program: program.to_path_buf(),
            args,
            capture_path: capture_path.to_path_buf(),
            stdin_payload: None,
        }
    }
}

/// Port for running one engine turn.
///
/// The caller owns session continuity: it must not issue two concurrent
/// invocations resuming the same token (see `sessions::SessionStore`).
#[async_trait]
pub trait EnginePort: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn invoke(&self, req: EngineRequest) -> Result<EngineResult>;
}
