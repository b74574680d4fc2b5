//! Fetches the text of a document at a URL so it can be summarized.
//! Wikipedia articles go through the MediaWiki API to get a clean plain
//! text extract, everything else is fetched as HTML and converted.

pub mod web;
pub mod wikipedia;

pub use web::WebPageLoader;
pub use wikipedia::WikipediaLoader;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub source: String,
    pub title: Option<String>,
    pub content: String,
}

#[async_trait]
pub trait ContentLoader: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load(&self, client: &reqwest::Client) -> Result<Document>;
}

pub type BoxedLoader = Box<dyn ContentLoader>;

/// Parses user input as a URL. Only http and https URLs with a host are
/// accepted.
pub fn parse_url(input: &str) -> Result<Url> {
    let url = Url::parse(input.trim()).map_err(|e| anyhow!("Invalid URL {}: {}", input, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(anyhow!("Invalid URL {}: expected an http(s) address", input)),
    }
}

/// Picks the loader for `url` by host. `wikipedia_api_host` overrides
/// where Wikipedia requests are sent.
pub fn loader_for(url: &Url, wikipedia_api_host: Option<&str>) -> BoxedLoader {
    let host = url.host_str().unwrap_or_default();
    if host.contains("wikipedia.org") {
        let api_host = match wikipedia_api_host {
            Some(h) => h.to_string(),
            // Bare wikipedia.org has no API, use the english site
            None if host == "wikipedia.org" || host == "www.wikipedia.org" => {
                "https://en.wikipedia.org".to_string()
            }
            None => format!("{}://{}", url.scheme(), host),
        };
        return Box::new(WikipediaLoader::from_url(url, &api_host));
    }
    Box::new(WebPageLoader::new(url))
}
