use anyhow::{Result, anyhow};
use async_trait::async_trait;
use htmd::HtmlToMarkdown;
use regex::Regex;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use super::{ContentLoader, Document};

// Some sites refuse requests that don't look like they came from a browser
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";

pub struct WebPageLoader {
    url: Url,
}

impl WebPageLoader {
    pub fn new(url: &Url) -> Self {
        Self { url: url.clone() }
    }
}

fn html_to_text(html: &str) -> Result<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "footer", "img", "svg", "head"])
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| anyhow!("Failed to convert HTML: {}", e))?;
    let re = Regex::new(r"\n{3,}")?;
    Ok(re.replace_all(markdown.trim(), "\n\n").to_string())
}

fn html_title(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    re.captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl ContentLoader for WebPageLoader {
    fn name(&self) -> &'static str {
        "web"
    }

    async fn load(&self, client: &reqwest::Client) -> Result<Document> {
        tracing::debug!("Loading web page {}", self.url);
        let resp = client
            .get(self.url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Fetching {} returned {}", self.url, status));
        }
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);
        let body = resp.text().await?;

        let (title, content) = if is_html {
            (html_title(&body), html_to_text(&body)?)
        } else {
            (None, body.trim().to_string())
        };
        if content.is_empty() {
            return Err(anyhow!("No text content found at {}", self.url));
        }

        Ok(Document {
            source: self.url.to_string(),
            title,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_skips_chrome() {
        let html = r#"<html><head><title>Post</title><style>p{}</style></head>
<body><nav>Home | About</nav><h1>Hello</h1><p>Some <b>bold</b> text.</p>
<script>alert(1)</script><footer>Copyright</footer></body></html>"#;
        let text = html_to_text(html).unwrap();
        assert!(text.contains("Hello"));
        assert!(text.contains("Some **bold** text."));
        assert!(!text.contains("alert"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[tokio::test]
    async fn test_load_sends_browser_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/article")
            .match_header("user-agent", BROWSER_USER_AGENT)
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><head><title>An Article</title></head><body><p>Body text.</p></body></html>")
            .create();

        let url = Url::parse(&format!("{}/article", server.url())).unwrap();
        let doc = WebPageLoader::new(&url)
            .load(&reqwest::Client::new())
            .await
            .unwrap();

        mock.assert();
        assert_eq!(doc.title.as_deref(), Some("An Article"));
        assert_eq!(doc.content, "Body text.");
    }

    #[tokio::test]
    async fn test_load_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/gone").with_status(404).create();

        let url = Url::parse(&format!("{}/gone", server.url())).unwrap();
        let err = WebPageLoader::new(&url)
            .load(&reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
