//! Wikipedia search and page retrieval via the MediaWiki action API.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::html::{page_text, strip_tags, truncate_chars};
use crate::http::HttpContext;

const MAX_RESULTS: usize = 5;
const MAX_PAGE_CHARS: usize = 8000;

pub struct WikipediaSearchTool {
    http: HttpContext,
}

impl WikipediaSearchTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    title: String,
    page_id: u64,
    snippet: String,
}

#[async_trait]
impl Tool for WikipediaSearchTool {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for articles. Input is a search query. Returns up to five \
         matches with their title, pageId and a snippet; pass a pageId to \
         wikipedia_page to read the article."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a search query".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error searching Wikipedia: {e}"));
        let url = HttpContext::url(&self.http.endpoints.wikipedia, &["w", "api.php"]).map_err(fail)?;
        let body = self
            .http
            .get_json(
                url,
                &[
                    ("action", "query"),
                    ("format", "json"),
                    ("list", "search"),
                    ("formatversion", "2"),
                    ("srsearch", query),
                ],
            )
            .await
            .map_err(|e| fail(e.to_string()))?;

        let response: SearchResponse =
            serde_json::from_value(body).map_err(|e| fail(e.to_string()))?;
        let results: Vec<SearchResult> = response
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .take(MAX_RESULTS)
            .map(|hit| SearchResult {
                title: hit.title,
                page_id: hit.pageid,
                snippet: strip_tags(&hit.snippet),
            })
            .collect();

        if results.is_empty() {
            return Ok(format!("No Wikipedia articles found for '{query}'."));
        }
        serde_json::to_string(&results).map_err(|e| fail(e.to_string()))
    }
}

pub struct WikipediaPageTool {
    http: HttpContext,
}

impl WikipediaPageTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParsedPage>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    title: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    info: String,
}

#[async_trait]
impl Tool for WikipediaPageTool {
    fn name(&self) -> &str {
        "wikipedia_page"
    }

    fn description(&self) -> &str {
        "Fetch the text of a Wikipedia article. Input is the numeric pageId returned \
         by wikipedia_search. The text is truncated to 8000 characters."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let page_id = input.trim();
        if page_id.is_empty() || !page_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: format!("expected a numeric pageId, got '{page_id}'"),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error fetching Wikipedia page: {e}"));
        let url = HttpContext::url(&self.http.endpoints.wikipedia, &["w", "api.php"]).map_err(fail)?;
        let body = self
            .http
            .get_json(
                url,
                &[
                    ("action", "parse"),
                    ("format", "json"),
                    ("pageid", page_id),
                    ("formatversion", "2"),
                ],
            )
            .await
            .map_err(|e| fail(e.to_string()))?;

        let response: ParseResponse =
            serde_json::from_value(body).map_err(|e| fail(e.to_string()))?;
        match (response.parse, response.error) {
            (Some(page), _) => Ok(format!(
                "Title: {}\n\n{}",
                page.title,
                truncate_chars(&page_text(&page.text), MAX_PAGE_CHARS)
            )),
            (None, Some(err)) => Err(fail(err.info)),
            (None, None) => Err(fail("empty response".into())),
        }
    }
}
