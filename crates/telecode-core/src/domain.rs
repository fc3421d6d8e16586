/// Chat id (numeric, as Telegram hands them out).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Engine session/conversation token (string).
///
/// Minted and interpreted entirely by the external engine; we only extract
/// it from the event stream and hand it back on the next turn. Never
/// validated or parsed here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
