//! One-shot CLI front-end for the engine bridge.
//!
//! Runs a single prompt against the selected engine and prints the answer.
//! Session continuity across calls is the caller's job: pass the token this
//! prints via `--resume` on the next call.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};

use telecode_core::{
    config::Config,
    domain::SessionToken,
    engine::{EngineKind, EnginePort, EngineRequest},
};
use telecode_engine::EngineBridge;

const USAGE: &str = "usage: telecode [--engine claude|codex] [--resume TOKEN] \
[--timeout SECS] [--image PATH]... [-v] <prompt>";

struct CliArgs {
    engine: Option<EngineKind>,
    resume: Option<String>,
    timeout: Option<u64>,
    images: Vec<PathBuf>,
    verbose: bool,
    prompt: String,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut engine = None;
    let mut resume = None;
    let mut timeout = None;
    let mut images = Vec::new();
    let mut verbose = false;
    let mut prompt_parts: Vec<String> = Vec::new();

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--engine" => {
                let v = argv.next().context("--engine needs a value")?;
                engine = Some(v.parse::<EngineKind>().map_err(anyhow::Error::from)?);
            }
            "--resume" => {
                resume = Some(argv.next().context("--resume needs a token")?);
            }
            "--timeout" => {
                let v = argv.next().context("--timeout needs seconds")?;
                let secs: u64 = v.parse().context("--timeout expects an integer")?;
                if secs == 0 {
                    bail!("--timeout must be positive");
                }
                timeout = Some(secs);
            }
            "--image" => {
                images.push(PathBuf::from(argv.next().context("--image needs a path")?));
            }
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => bail!("{USAGE}"),
            other if other.starts_with('-') => bail!("unknown flag {other}\n{USAGE}"),
            _ => prompt_parts.push(arg),
        }
    }

    if prompt_parts.is_empty() {
        bail!("missing prompt\n{USAGE}");
    }

    Ok(CliArgs {
        engine,
        resume,
        timeout,
        images,
        verbose,
        prompt: prompt_parts.join(" "),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let cfg = Config::load()?;
    telecode_core::logging::init("telecode", args.verbose || cfg.verbose)?;

    let kind = args.engine.unwrap_or(cfg.engine);
    let bridge: Arc<dyn EnginePort> = Arc::new(EngineBridge::from_config(&cfg, kind));

    let mut req = EngineRequest::new(args.prompt);
    req.resume = args.resume.map(SessionToken);
    req.timeout = args.timeout.map(Duration::from_secs);
    req.images = args.images;

    let res = bridge.invoke(req).await?;

    println!("{}", res.answer);
    match &res.session {
        Some(token) => tracing::info!(%token, "session token (pass back with --resume)"),
        None => tracing::info!("engine minted no session token"),
    }

    Ok(())
}
