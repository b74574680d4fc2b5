use std::env;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::ai::responder::{Language, Request, Summarizer};
use crate::core::{AppConfig, Configuration, ResourceCache, Session};

pub async fn run(url: String, language: Language, api_key: Option<String>) -> Result<()> {
    let config = AppConfig::default();
    let mut fields = Configuration::new();
    if let Some(key) = api_key.or_else(|| env::var("GROQ_API_KEY").ok()) {
        fields.set("api_key", &key);
    }

    let cache = Arc::new(ResourceCache::new(config.cache_ttl));
    let mut session = Session::new(Arc::new(Summarizer::new(&config)), cache, fields);
    if let Some(msg) = session.validation().message() {
        return Err(anyhow!(msg));
    }

    let entry = session
        .submit(Request::new(&url).with_language(language))
        .await?;
    if entry.error {
        return Err(anyhow!(entry.content.clone()));
    }
    println!("{}", entry.content);
    Ok(())
}
