//! Fetch a web page and return its readable text.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use reqwest::Url;

use crate::html::{page_text, truncate_chars};
use crate::http::HttpContext;

const MAX_CHARS: usize = 5000;

pub struct WebScraperTool {
    http: HttpContext,
}

impl WebScraperTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "Fetch a web page and extract its text content. Input is an absolute http(s) \
         URL. Scripts, styles and markup are removed and the text is truncated to \
         5000 characters."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let url = parse_url(input.trim()).map_err(|reason| ToolError::InvalidInput {
            tool_name: self.name().into(),
            reason,
        })?;

        let html = self
            .http
            .get_text(url, &[])
            .await
            .map_err(|e| ToolError::failed(format!("Error fetching webpage: {e}")))?;

        let text = page_text(&html);
        if text.is_empty() {
            return Ok("The page contains no readable text.".into());
        }
        Ok(truncate_chars(&text, MAX_CHARS))
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    let url = Url::parse(input).map_err(|e| format!("'{input}' is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported URL scheme '{other}'")),
    }
}
