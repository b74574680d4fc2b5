use std::env;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use super::repl;
use crate::ai::responder::SqlAgent;
use crate::core::db::DbBackend;
use crate::core::{AppConfig, Configuration, ResourceCache, Session};

pub struct SqlArgs {
    pub backend: DbBackend,
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub sqlite_path: Option<String>,
    pub api_key: Option<String>,
}

impl SqlArgs {
    fn configuration(self) -> Configuration {
        let mut config = Configuration::new();
        if let Some(key) = self.api_key.or_else(|| env::var("GROQ_API_KEY").ok()) {
            config.set("api_key", &key);
        }
        match self.backend {
            DbBackend::Mysql => {
                config.set("host", &self.host);
                config.set("user", &self.user);
                if let Some(password) = self.password.or_else(|| env::var("MYSQL_PASSWORD").ok()) {
                    config.set("password", &password);
                }
                if let Some(database) = self.database {
                    config.set("database", &database);
                }
            }
            DbBackend::Sqlite => {
                if let Some(path) = self.sqlite_path {
                    config.set("sqlite_path", &path);
                }
            }
        }
        config
    }
}

pub async fn run(args: SqlArgs) -> Result<()> {
    let config = AppConfig::default();
    let backend = args.backend;

    // Show the agent's tool calls while it works
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    let responder = SqlAgent::new(backend, &config).streaming(tx);
    let cache = Arc::new(ResourceCache::new(config.cache_ttl));
    let session = Session::new(Arc::new(responder), cache, args.configuration());

    repl::run(session, Some(repl::Progress::Steps(rx))).await
}
