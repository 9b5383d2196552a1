//! arXiv paper search over the Atom export API.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

use crate::html::{collapse_whitespace, truncate_chars};
use crate::http::HttpContext;

const MAX_RESULTS: &str = "5";
const SUMMARY_CHARS: usize = 300;

pub struct ArxivSearchTool {
    http: HttpContext,
}

impl ArxivSearchTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    source: &'static str,
    count: usize,
    papers: Vec<Paper>,
}

#[derive(Debug, PartialEq, Serialize)]
struct Paper {
    title: String,
    authors: String,
    summary: String,
    published: String,
    link: String,
}

#[async_trait]
impl Tool for ArxivSearchTool {
    fn name(&self) -> &str {
        "arxiv_search"
    }

    fn description(&self) -> &str {
        "Search arXiv.org for academic papers. Input is a search query. Returns up to \
         five papers with title, authors, a short summary, publication date and link."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a search query".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error searching arXiv: {e}"));
        let url = HttpContext::url(&self.http.endpoints.arxiv, &["api", "query"]).map_err(fail)?;
        let search = format!("all:{query}");
        let feed = self
            .http
            .get_text(
                url,
                &[
                    ("search_query", search.as_str()),
                    ("start", "0"),
                    ("max_results", MAX_RESULTS),
                ],
            )
            .await
            .map_err(|e| fail(e.to_string()))?;

        let papers = parse_feed(&feed).map_err(fail)?;
        let output = SearchOutput {
            query,
            source: "arXiv.org",
            count: papers.len(),
            papers,
        };
        serde_json::to_string(&output).map_err(|e| fail(e.to_string()))
    }
}

/// Atom elements of an entry that end up in a [`Paper`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Summary,
    Published,
    Id,
    AuthorName,
}

#[derive(Debug, Default)]
struct RawEntry {
    title: String,
    summary: String,
    published: String,
    id: String,
    authors: Vec<String>,
}

impl RawEntry {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Published => &mut self.published,
            Field::Id => &mut self.id,
            Field::AuthorName => match self.authors.last_mut() {
                Some(name) => name,
                None => return,
            },
        };
        target.push_str(text);
    }

    fn into_paper(self) -> Paper {
        let summary = collapse_whitespace(&self.summary);
        let summary = if summary.chars().count() > SUMMARY_CHARS {
            format!("{}...", truncate_chars(&summary, SUMMARY_CHARS))
        } else {
            summary
        };

        let published = self.published.trim();
        let published = published
            .split_once('T')
            .map_or(published, |(date, _)| date)
            .to_string();

        let authors: Vec<String> = self
            .authors
            .iter()
            .map(|name| collapse_whitespace(name))
            .filter(|name| !name.is_empty())
            .collect();

        Paper {
            title: collapse_whitespace(&self.title),
            authors: authors.join(", "),
            summary,
            published,
            link: self.id.trim().to_string(),
        }
    }
}

/// Papers in feed order. Feed-level metadata outside `<entry>` is ignored.
fn parse_feed(feed: &str) -> Result<Vec<Paper>, String> {
    let mut reader = Reader::from_str(feed);
    let mut papers = Vec::new();
    let mut entry: Option<RawEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"entry" => entry = Some(RawEntry::default()),
                _ if entry.is_none() => {}
                b"author" => in_author = true,
                b"name" if in_author => {
                    if let Some(raw) = entry.as_mut() {
                        raw.authors.push(String::new());
                    }
                    field = Some(Field::AuthorName);
                }
                b"title" => field = Some(Field::Title),
                b"summary" => field = Some(Field::Summary),
                b"published" => field = Some(Field::Published),
                b"id" => field = Some(Field::Id),
                _ => field = None,
            },
            Event::End(tag) => match tag.local_name().as_ref() {
                b"entry" => {
                    papers.extend(entry.take().map(RawEntry::into_paper));
                    field = None;
                }
                b"author" => in_author = false,
                _ => field = None,
            },
            Event::Text(text) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    raw.push(f, &text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(data) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    raw.push(f, &String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(papers)
}
