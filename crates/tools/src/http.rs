//! Shared HTTP plumbing for the network-backed tools.

use std::sync::Arc;
use std::time::Duration;

use agentwire_config::ToolsConfig;
use agentwire_core::error::ToolError;
use reqwest::Url;

/// Base URLs of the external services. Overridable so tests can point every
/// tool at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub wikipedia: String,
    pub google_books: String,
    pub arxiv: String,
    pub scholar: String,
    pub wttr: String,
    pub exchange_rates: String,
    pub nyt_rss: String,
    pub transcripts: String,
    pub google_calendar: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            wikipedia: "https://en.wikipedia.org".into(),
            google_books: "https://www.googleapis.com".into(),
            arxiv: "http://export.arxiv.org".into(),
            scholar: "https://scholar.google.com".into(),
            wttr: "https://wttr.in".into(),
            exchange_rates: "https://api.exchangerate-api.com".into(),
            nyt_rss: "https://rss.nytimes.com".into(),
            transcripts: "https://tactiq-apps-prod.tactiq.io".into(),
            google_calendar: "https://www.googleapis.com".into(),
        }
    }
}

impl Endpoints {
    /// Every service rooted at the same base URL.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            wikipedia: base.clone(),
            google_books: base.clone(),
            arxiv: base.clone(),
            scholar: base.clone(),
            wttr: base.clone(),
            exchange_rates: base.clone(),
            nyt_rss: base.clone(),
            transcripts: base.clone(),
            google_calendar: base,
        }
    }
}

/// One `reqwest::Client` plus endpoints, shared by all tools of a registry.
#[derive(Debug, Clone)]
pub struct HttpContext {
    pub client: reqwest::Client,
    pub endpoints: Arc<Endpoints>,
}

impl HttpContext {
    pub fn new(config: &ToolsConfig, endpoints: Endpoints) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ToolError::failed(format!("Error building HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
        })
    }

    /// `base` joined with percent-encoded path segments.
    pub fn url(base: &str, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(base).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("{base} cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET and decode a JSON body; non-2xx statuses are errors.
    pub async fn get_json(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, reqwest::Error> {
        self.client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// GET a text body; non-2xx statuses are errors.
    pub async fn get_text(&self, url: Url, query: &[(&str, &str)]) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
