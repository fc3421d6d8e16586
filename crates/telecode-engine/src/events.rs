//! Session-token recovery from the engine's event stream.
//!
//! Engines emit newline-delimited events where JSON objects interleave with
//! free-form diagnostic lines. Several schema generations are in the wild,
//! so the token is probed under every historical key name.

/// Key names tried on each decoded object, in priority order.
const TOKEN_KEYS: [&str; 4] = ["session_id", "sessionId", "conversation_id", "conversationId"];

/// Scan combined stdout+stderr for a session token.
///
/// Lines that are not self-contained JSON objects are skipped. The first
/// line yielding a non-empty string wins and scanning stops; later tokens
/// in the same run are ignored on purpose. Returns `None` when the run
/// minted nothing (the caller then keeps its prior token).
pub fn extract_session_token(combined: &str) -> Option<String> {
    for raw in combined.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if let Some(token) = pick_token(&value) {
            return Some(token);
        }
    }
    None
}

fn pick_token(value: &serde_json::Value) -> Option<String> {
    for key in TOKEN_KEYS {
        if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    // Newer schema nests it: {"session": {"id": "..."}}.
    if let Some(s) = value
        .get("session")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
    {
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }
    None
}
