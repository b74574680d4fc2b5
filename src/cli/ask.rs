use std::env;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use super::repl;
use crate::ai::responder::{GroqPrompt, HuggingFacePrompt, Provider};
use crate::core::{AppConfig, Configuration, ResourceCache, Session};

pub struct AskArgs {
    pub provider: Provider,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: Option<String>,
    pub stream: bool,
}

impl AskArgs {
    fn configuration(&self) -> Configuration {
        let key_var = match self.provider {
            Provider::Groq => "GROQ_API_KEY",
            Provider::HuggingFace => "HUGGINGFACE_API_KEY",
        };
        let mut config = Configuration::new()
            .with(
                "model",
                self.model
                    .as_deref()
                    .unwrap_or(self.provider.default_model()),
            )
            .with("temperature", &self.temperature.to_string())
            .with("max_tokens", &self.max_tokens.to_string());
        if let Some(key) = self.api_key.clone().or_else(|| env::var(key_var).ok()) {
            config.set("api_key", &key);
        }
        config
    }
}

pub async fn run(args: AskArgs) -> Result<()> {
    let config = AppConfig::default();
    let fields = args.configuration();

    if fields.get("api_key").is_none() {
        println!("Please enter the {} API Key", args.provider.label());
        return Ok(());
    }
    println!(
        "Using {} with {}",
        args.provider.label(),
        fields.get("model").unwrap_or_default()
    );

    match args.provider {
        Provider::Groq => {
            let mut responder = GroqPrompt::new(&config);
            let mut progress = None;
            if args.stream {
                let (tx, rx) = mpsc::unbounded_channel::<String>();
                responder = responder.streaming(tx);
                progress = Some(repl::Progress::Answer(rx));
            }
            let cache = Arc::new(ResourceCache::new(config.cache_ttl));
            repl::run(Session::new(Arc::new(responder), cache, fields), progress).await
        }
        Provider::HuggingFace => {
            if args.stream {
                tracing::warn!("Streaming is only supported for Groq, ignoring --stream");
            }
            let responder = HuggingFacePrompt::new(&config);
            let cache = Arc::new(ResourceCache::new(config.cache_ttl));
            repl::run(Session::new(Arc::new(responder), cache, fields), None).await
        }
    }
}
