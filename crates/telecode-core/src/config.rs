use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{engine::EngineKind, errors::Error, Result};

/// Typed configuration for telecode.
///
/// Values come from key=value files (`~/.telecode`, then `./.telecode`,
/// local winning) with real environment variables taking precedence over
/// both. Loading never mutates the process environment; everything the
/// bridge needs is passed in explicitly at construction time.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default engine for new chats.
    pub engine: EngineKind,

    pub claude_cli_path: PathBuf,
    pub codex_cli_path: PathBuf,

    /// Deadline applied when a request carries none.
    pub query_timeout: Duration,

    pub verbose: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_source(&ConfigSource::load())
    }

    fn from_source(src: &ConfigSource) -> Result<Self> {
        let engine = src
            .get("TELECODE_ENGINE")
            .unwrap_or_else(|| "claude".to_string())
            .parse::<EngineKind>()?;

        let claude_cli_path = src
            .get("CLAUDE_CLI_PATH")
            .map(PathBuf::from)
            .or_else(|| which_in_path("claude"))
            .unwrap_or_else(|| PathBuf::from("/usr/local/bin/claude"));
        let codex_cli_path = src
            .get("CODEX_CLI_PATH")
            .map(PathBuf::from)
            .or_else(|| which_in_path("codex"))
            .unwrap_or_else(|| PathBuf::from("/usr/local/bin/codex"));

        let timeout_s = match src.get("TELECODE_TIMEOUT_S") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("invalid TELECODE_TIMEOUT_S: {raw}")))?,
            None => 180,
        };
        if timeout_s == 0 {
            return Err(Error::Config(
                "TELECODE_TIMEOUT_S must be positive".to_string(),
            ));
        }

        let verbose = src.get("TELECODE_VERBOSE").map(parse_bool).unwrap_or(false);

        Ok(Self {
            engine,
            claude_cli_path,
            codex_cli_path,
            query_timeout: Duration::from_secs(timeout_s),
            verbose,
        })
    }

    /// Program path for an engine, as configured.
    pub fn engine_path(&self, kind: EngineKind) -> &Path {
        match kind {
            EngineKind::Claude => &self.claude_cli_path,
            EngineKind::Codex => &self.codex_cli_path,
        }
    }
}

/// Merged file-backed configuration with env-var precedence on read.
struct ConfigSource {
    values: HashMap<String, String>,
}

impl ConfigSource {
    fn load() -> Self {
        let mut values = HashMap::new();
        if let Some(home) = home_dir() {
            merge_kv_file(&mut values, &home.join(".telecode"));
        }
        merge_kv_file(&mut values, Path::new(".telecode"));
        Self { values }
    }

    #[cfg(test)]
    fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    fn get(&self, key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .and_then(non_empty)
            .or_else(|| self.values.get(key).cloned())
    }
}

fn merge_kv_file(into: &mut HashMap<String, String>, path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (k, v) in parse_kv(&contents) {
        into.insert(k, v);
    }
}

/// Parse `key=value` lines; blank lines, `#` comments and lines without an
/// `=` are skipped. Surrounding quotes on values are stripped.
fn parse_kv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(s: String) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}
