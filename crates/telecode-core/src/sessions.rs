//! In-memory per-chat session state.
//!
//! Durable storage is out of scope; this only guarantees the concurrency
//! contract the bridge needs: at most one in-flight invocation per chat
//! (resuming the same token concurrently can corrupt the engine's own
//! state), with full parallelism across distinct chats.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, SessionToken},
    engine::{EngineKind, EnginePort, EngineRequest, EngineResult},
    Result,
};

#[derive(Clone, Debug)]
pub struct ChatSession {
    pub engine: EngineKind,
    pub token: Option<SessionToken>,
}

pub struct SessionStore {
    default_engine: EngineKind,
    chats: Mutex<HashMap<ChatId, Arc<Mutex<ChatSession>>>>,
}

impl SessionStore {
    pub fn new(default_engine: EngineKind) -> Self {
        Self {
            default_engine,
            chats: Mutex::new(HashMap::new()),
        }
    }

    async fn entry(&self, chat: ChatId) -> Arc<Mutex<ChatSession>> {
        let mut chats = self.chats.lock().await;
        chats
            .entry(chat)
            .or_insert_with(|| {
                Arc::new(Mutex::new(ChatSession {
                    engine: self.default_engine,
                    token: None,
                }))
            })
            .clone()
    }

    pub async fn engine(&self, chat: ChatId) -> EngineKind {
        self.entry(chat).await.lock().await.engine
    }

    pub async fn token(&self, chat: ChatId) -> Option<SessionToken> {
        self.entry(chat).await.lock().await.token.clone()
    }

    /// Select an engine for a chat. Switching clears the stored token: a
    /// token minted by one engine means nothing to the other.
    pub async fn set_engine(&self, chat: ChatId, kind: EngineKind) {
        let entry = self.entry(chat).await;
        let mut st = entry.lock().await;
        if st.engine != kind {
            st.engine = kind;
            st.token = None;
        }
    }

    /// Forget the chat's session token (start fresh next turn).
    pub async fn reset(&self, chat: ChatId) {
        let entry = self.entry(chat).await;
        entry.lock().await.token = None;
    }

    /// Run one turn for a chat through `port`, holding the chat's lock for
    /// the whole invocation so turns on the same chat are serialized.
    ///
    /// On success the returned token is persisted for the next turn. On
    /// failure the stored token is left untouched; retry policy belongs to
    /// the caller.
    pub async fn send(
        &self,
        chat: ChatId,
        port: &dyn EnginePort,
        prompt: &str,
        images: Vec<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<EngineResult> {
        let entry = self.entry(chat).await;
        let mut st = entry.lock().await;

        // Dispatch handed us a different engine than this chat last used:
        // treat it as a switch and drop the stale token.
        if st.engine != port.kind() {
            tracing::debug!(chat = chat.0, engine = %port.kind(), "engine switch, dropping session token");
            st.engine = port.kind();
            st.token = None;
        }

        let req = EngineRequest {
            prompt: prompt.to_string(),
            resume: st.token.clone(),
            timeout,
            images,
        };

        let result = port.invoke(req).await?;
        st.token = result.session.clone();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    /// Stub port: returns a canned token and records call overlap.
    struct StubPort {
        kind: EngineKind,
        mint: Option<String>,
        seen_resume: Mutex<Vec<Option<String>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubPort {
        fn new(kind: EngineKind, mint: Option<&str>) -> Self {
            Self {
                kind,
                mint: mint.map(|s| s.to_string()),
                seen_resume: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EnginePort for StubPort {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn invoke(&self, req: EngineRequest) -> Result<EngineResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            self.seen_resume
                .lock()
                .await
                .push(req.resume.as_ref().map(|t| t.0.clone()));
            tokio::time::sleep(Duration::from_millis(20)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(EngineResult {
                answer: "ok".to_string(),
                session: self
                    .mint
                    .clone()
                    .map(SessionToken)
                    .or(req.resume),
                log: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn token_is_persisted_and_resumed_next_turn() {
        let store = SessionStore::new(EngineKind::Codex);
        let port = StubPort::new(EngineKind::Codex, Some("S1"));
        let chat = ChatId(7);

        store.send(chat, &port, "first", Vec::new(), None).await.unwrap();
        store.send(chat, &port, "second", Vec::new(), None).await.unwrap();

        let seen = port.seen_resume.lock().await;
        assert_eq!(*seen, vec![None, Some("S1".to_string())]);
        assert_eq!(store.token(chat).await, Some(SessionToken("S1".to_string())));
    }

    #[tokio::test]
    async fn switching_engines_clears_the_token() {
        let store = SessionStore::new(EngineKind::Claude);
        let port = StubPort::new(EngineKind::Claude, Some("A"));
        let chat = ChatId(1);

        store.send(chat, &port, "hi", Vec::new(), None).await.unwrap();
        assert!(store.token(chat).await.is_some());

        store.set_engine(chat, EngineKind::Codex).await;
        assert_eq!(store.engine(chat).await, EngineKind::Codex);
        assert!(store.token(chat).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn turns_on_one_chat_never_overlap() {
        let store = Arc::new(SessionStore::new(EngineKind::Codex));
        let port = Arc::new(StubPort::new(EngineKind::Codex, Some("S")));
        let chat = ChatId(42);

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = store.clone();
            let port = port.clone();
            handles.push(tokio::spawn(async move {
                store
                    .send(chat, port.as_ref(), &format!("turn {i}"), Vec::new(), None)
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(port.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
