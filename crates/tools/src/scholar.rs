//! Academic search over Google Scholar result pages.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::html::{collapse_whitespace, truncate_chars};
use crate::http::HttpContext;

const MAX_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 200;

pub struct AcademicSearchTool {
    http: HttpContext,
}

impl AcademicSearchTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    count: usize,
    papers: Vec<Paper>,
}

#[derive(Debug, PartialEq, Serialize)]
struct Paper {
    title: String,
    snippet: String,
}

#[async_trait]
impl Tool for AcademicSearchTool {
    fn name(&self) -> &str {
        "academic_search"
    }

    fn description(&self) -> &str {
        "Search for academic papers and research articles. Input is keywords or a \
         research topic. Returns up to five titles with a short snippet; use \
         arxiv_search for abstracts and authors."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a search query".into(),
            });
        }

        let fail = |e: String| {
            ToolError::failed(format!(
                "Error searching academic papers: {e}. Try web_scraper with a specific \
                 paper URL instead."
            ))
        };
        let url = HttpContext::url(&self.http.endpoints.scholar, &["scholar"]).map_err(fail)?;
        let html = self
            .http
            .get_text(url, &[("q", query), ("hl", "en"), ("as_sdt", "0,5")])
            .await
            .map_err(|e| fail(e.to_string()))?;

        let papers = parse_results(&html).map_err(fail)?;
        let output = SearchOutput {
            query,
            count: papers.len(),
            papers,
        };
        serde_json::to_string(&output).map_err(|e| fail(e.to_string()))
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector '{css}': {e}"))
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// One paper per `.gs_ri` result block, so titles and snippets stay paired
/// even when a result has no snippet.
fn parse_results(html: &str) -> Result<Vec<Paper>, String> {
    let result_sel = selector("div.gs_ri")?;
    let title_sel = selector("h3.gs_rt")?;
    let link_sel = selector("a")?;
    let snippet_sel = selector("div.gs_rs")?;

    let document = Html::parse_document(html);
    let papers = document
        .select(&result_sel)
        .filter_map(|block| {
            let heading = block.select(&title_sel).next()?;
            let title = heading
                .select(&link_sel)
                .next()
                .map_or_else(|| text_of(heading), text_of);
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(|s| truncate_chars(&text_of(s), SNIPPET_CHARS))
                .unwrap_or_default();
            (!title.is_empty()).then_some(Paper { title, snippet })
        })
        .take(MAX_RESULTS)
        .collect();
    Ok(papers)
}
