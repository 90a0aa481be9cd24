//! Application state: config, park table, provider-backed chat service, session map and stores.
//!
//! Sessions live in a map keyed by id; each sits behind its own mutex so a
//! session has exactly one writer at a time while different sessions proceed
//! in parallel. The map is bounded: idle sessions expire and, at the cap, the
//! least recently used one makes room for a new one.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::chat::{ChatService, ChatSession};
use crate::config::{load_config_from_env, AppConfig};
use crate::parks::ParkTable;
use crate::provider::{provider_from_env, CompletionProvider};
use crate::store::{MessageLog, QuizStore, ReviewStore};

pub type SharedSession = Arc<Mutex<ChatSession>>;

pub struct AppState {
    pub parks: ParkTable,
    pub chat: ChatService,
    pub sessions: RwLock<HashMap<String, SharedSession>>,
    pub messages: Arc<MessageLog>,
    pub quizzes: QuizStore,
    pub reviews: ReviewStore,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl AppState {
    /// Build state from env: load TOML config, resolve the park table, pick a provider.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_config_from_env().unwrap_or_default();
        let provider = provider_from_env(&cfg);
        Self::new(cfg, provider)
    }

    pub fn new(cfg: AppConfig, provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        let parks = cfg.park_table();
        for r in parks.ranges() {
            info!(target: "quiz", min = r.min, max = r.max, park = %r.park, "Park range");
        }
        info!(
            target: "chat",
            max_history = cfg.chat.max_history,
            timeout_secs = cfg.chat.timeout_secs,
            max_retries = cfg.chat.max_retries,
            persist_turns = cfg.chat.persist_turns,
            max_sessions = cfg.chat.max_sessions,
            idle_ttl_secs = cfg.chat.idle_ttl_secs,
            "Chat settings"
        );

        let messages = Arc::new(MessageLog::new());
        Self {
            parks,
            max_sessions: cfg.chat.max_sessions.max(1),
            idle_ttl: Duration::from_secs(cfg.chat.idle_ttl_secs),
            chat: ChatService::new(provider, messages.clone(), cfg.chat),
            sessions: RwLock::new(HashMap::new()),
            messages,
            quizzes: QuizStore::new(),
            reviews: ReviewStore::new(),
        }
    }

    /// Existing session for `id`, or a new one (under `id` if given, else a fresh UUID).
    ///
    /// Creating a session first sweeps expired ones and, at the cap, evicts the
    /// least recently used idle session.
    #[instrument(level = "debug", skip(self))]
    pub async fn session(&self, id: Option<&str>) -> (String, SharedSession) {
        if let Some(id) = id {
            if let Some(s) = self.sessions.read().await.get(id) {
                return (id.to_string(), s.clone());
            }
        }
        let id = id.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write().await;
        // Another request may have created it between the read and write locks.
        if let Some(s) = sessions.get(&id) {
            return (id, s.clone());
        }
        self.evict_sessions(&mut sessions);
        let s = Arc::new(Mutex::new(self.chat.new_session(id.clone())));
        sessions.insert(id.clone(), s.clone());
        info!(target: "chat", session = %id, live = sessions.len(), "Chat session created");
        (id, s)
    }

    fn evict_sessions(&self, sessions: &mut HashMap<String, SharedSession>) {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, s| idle_since(s).map_or(true, |t| now.saturating_duration_since(t) < self.idle_ttl));

        if sessions.len() >= self.max_sessions {
            let mut idle: Vec<(Instant, String)> = sessions
                .iter()
                .filter_map(|(id, s)| idle_since(s).map(|t| (t, id.clone())))
                .collect();
            idle.sort();
            let excess = sessions.len() + 1 - self.max_sessions;
            for (_, id) in idle.into_iter().take(excess) {
                sessions.remove(&id);
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "chat", evicted, live = sessions.len(), "Evicted idle chat sessions");
        }
    }

    pub async fn find_session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop a session and its history. The message log is untouched.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if let Some(s) = &removed {
            s.lock().await.reset();
            info!(target: "chat", session = %id, "Chat session removed");
        }
        removed.is_some()
    }
}

/// Last use of a session nobody is holding, or `None` while a request has it.
fn idle_since(s: &SharedSession) -> Option<Instant> {
    if Arc::strong_count(s) > 1 {
        return None;
    }
    s.try_lock().ok().map(|g| g.last_used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_is_reused_by_id() {
        let state = AppState::new(AppConfig::default(), None);
        let (id, a) = state.session(None).await;
        let (same_id, b) = state.session(Some(&id)).await;
        assert_eq!(id, same_id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn client_chosen_id_creates_session() {
        let state = AppState::new(AppConfig::default(), None);
        let (id, _) = state.session(Some("campfire")).await;
        assert_eq!(id, "campfire");
        assert!(state.find_session("campfire").await.is_some());
        assert!(state.remove_session("campfire").await);
        assert!(!state.remove_session("campfire").await);
        assert!(state.find_session("campfire").await.is_none());
    }

    fn capped(max_sessions: usize, idle_ttl_secs: u64) -> AppState {
        let mut cfg = AppConfig::default();
        cfg.chat.max_sessions = max_sessions;
        cfg.chat.idle_ttl_secs = idle_ttl_secs;
        AppState::new(cfg, None)
    }

    async fn live_ids(state: &AppState) -> Vec<String> {
        let mut ids: Vec<String> = state.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire_when_a_new_one_is_created() {
        let state = capped(100, 60);
        for id in ["a", "b", "c"] {
            state.session(Some(id)).await;
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        state.session(Some("d")).await;
        assert_eq!(live_ids(&state).await.len(), 4);

        tokio::time::advance(Duration::from_secs(31)).await;
        state.session(Some("e")).await;
        assert_eq!(live_ids(&state).await, ["d", "e"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cap_evicts_least_recently_used() {
        let state = capped(2, 3600);
        state.session(Some("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        state.session(Some("b")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        {
            let a = state.find_session("a").await.unwrap();
            let mut a = a.lock().await;
            state.chat.post(&mut a, "still here", None).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(1)).await;

        state.session(Some("c")).await;
        assert_eq!(live_ids(&state).await, ["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_in_use_are_never_evicted() {
        let state = capped(1, 1);
        let (_, held) = state.session(Some("busy")).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        state.session(Some("other")).await;
        assert!(state.find_session("busy").await.is_some());

        drop(held);
        state.session(Some("third")).await;
        assert_eq!(live_ids(&state).await, ["third"]);
    }

    #[tokio::test]
    async fn client_chosen_ids_cannot_grow_the_map_past_the_cap() {
        let state = capped(100, 3600);
        for i in 0..5000 {
            state.session(Some(&format!("sid-{i}"))).await;
        }
        assert_eq!(live_ids(&state).await.len(), 100);
        assert!(state.find_session("sid-4999").await.is_some());
    }
}
