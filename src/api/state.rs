use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use crate::ai::responder::{GroqPrompt, HuggingFacePrompt, Responder, SqlAgent, Summarizer};
use crate::core::db::DbBackend;
use crate::core::{AppConfig, Configuration, ResourceCache, Session};

pub type SharedSession<R> = Arc<Mutex<Session<R>>>;

/// Sessions of one app along with the responder and resource cache
/// they all share.
pub struct AppRegistry<R: Responder> {
    responder: Arc<R>,
    cache: Arc<ResourceCache<R::Resource>>,
    sessions: RwLock<HashMap<String, SharedSession<R>>>,
}

impl<R: Responder> AppRegistry<R> {
    pub fn new(responder: R, config: &AppConfig) -> Self {
        Self {
            responder: Arc::new(responder),
            cache: Arc::new(ResourceCache::new(config.cache_ttl)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.responder.name()
    }

    pub fn find(&self, id: &str) -> Option<SharedSession<R>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }

    /// Returns the session for `id`, starting an unconfigured one if it
    /// doesn't exist yet.
    pub fn get_or_create(&self, id: &str) -> SharedSession<R> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!("Starting {} session {}", self.responder.name(), id);
                Arc::new(Mutex::new(Session::new(
                    Arc::clone(&self.responder),
                    Arc::clone(&self.cache),
                    Configuration::new(),
                )))
            })
            .clone()
    }

    pub fn remove(&self, id: &str) -> Option<SharedSession<R>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let removed = sessions.remove(id);
        if removed.is_some() {
            tracing::info!("Ended {} session {}", self.responder.name(), id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub mysql: Arc<AppRegistry<SqlAgent>>,
    pub sqlite: Arc<AppRegistry<SqlAgent>>,
    pub summarize: Arc<AppRegistry<Summarizer>>,
    pub groq: Arc<AppRegistry<GroqPrompt>>,
    pub huggingface: Arc<AppRegistry<HuggingFacePrompt>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            mysql: Arc::new(AppRegistry::new(
                SqlAgent::new(DbBackend::Mysql, &config),
                &config,
            )),
            sqlite: Arc::new(AppRegistry::new(
                SqlAgent::new(DbBackend::Sqlite, &config),
                &config,
            )),
            summarize: Arc::new(AppRegistry::new(Summarizer::new(&config), &config)),
            groq: Arc::new(AppRegistry::new(GroqPrompt::new(&config), &config)),
            huggingface: Arc::new(AppRegistry::new(HuggingFacePrompt::new(&config), &config)),
            config,
        }
    }
}
