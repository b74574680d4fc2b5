use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;

use super::{ContentLoader, Document};

// {
//   "query": {
//     "pages": {
//       "21501970": {
//         "pageid": 21501970,
//         "title": "Alan Turing",
//         "extract": "Alan Mathison Turing (23 June 1912 – 7 June 1954) was..."
//       }
//     }
//   }
// }
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: Option<String>,
    extract: Option<String>,
    // Present when the title doesn't exist
    missing: Option<serde_json::Value>,
}

pub struct WikipediaLoader {
    api_host: String,
    pub title: String,
    source: String,
}

impl WikipediaLoader {
    /// The article title is the last path segment of the URL,
    /// e.g. `/wiki/Alan_Turing` → `Alan Turing`.
    pub fn from_url(url: &Url, api_host: &str) -> Self {
        let segment = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default();
        let title = urlencoding::decode(segment)
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| segment.to_string())
            .replace('_', " ");
        Self {
            api_host: api_host.trim_end_matches('/').to_string(),
            title,
            source: url.to_string(),
        }
    }
}

#[async_trait]
impl ContentLoader for WikipediaLoader {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn load(&self, client: &reqwest::Client) -> Result<Document> {
        if self.title.trim().is_empty() {
            return Err(anyhow!("No article title found in {}", self.source));
        }
        tracing::debug!("Loading Wikipedia article {}", self.title);

        let resp = client
            .get(format!("{}/w/api.php", self.api_host))
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("format", "json"),
                ("titles", self.title.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Wikipedia request returned {}", status));
        }
        let body: ExtractResponse = resp.json().await?;

        let page = body
            .query
            .and_then(|q| q.pages.into_values().next())
            .filter(|p| p.missing.is_none())
            .ok_or_else(|| anyhow!("No Wikipedia page found for {}", self.title))?;
        let content = page
            .extract
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| anyhow!("Wikipedia page {} has no content", self.title))?;

        Ok(Document {
            source: self.source.clone(),
            title: page.title,
            content,
        })
    }
}
