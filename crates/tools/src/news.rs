//! Headlines from the New York Times RSS section feeds.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::http::HttpContext;

const DEFAULT_TOPIC: &str = "HomePage";
const MAX_HEADLINES: usize = 5;

pub struct NewsHeadlinesTool {
    http: HttpContext,
}

impl NewsHeadlinesTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for NewsHeadlinesTool {
    fn name(&self) -> &str {
        "news_headlines"
    }

    fn description(&self) -> &str {
        "Get the latest news headlines. Input is an NYT section such as 'Technology', \
         'Business', 'Science' or 'Sports'; empty input returns the front page."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let topic = match input.trim() {
            "" => DEFAULT_TOPIC,
            t => t,
        };

        let fail = |e: String| ToolError::failed(format!("Error fetching news: {e}"));
        let feed_file = format!("{topic}.xml");
        let url = HttpContext::url(
            &self.http.endpoints.nyt_rss,
            &["services", "xml", "rss", "nyt", &feed_file],
        )
        .map_err(fail)?;
        let xml = self
            .http
            .get_text(url, &[])
            .await
            .map_err(|e| fail(e.to_string()))?;

        let headlines = headlines(&xml).map_err(fail)?;
        if headlines.is_empty() {
            return Ok("No headlines found".into());
        }

        let list: Vec<String> = headlines
            .iter()
            .enumerate()
            .map(|(i, title)| format!("{}. {title}", i + 1))
            .collect();
        Ok(format!("Latest headlines in {topic}:\n{}", list.join("\n")))
    }
}

/// Item titles in feed order, at most [`MAX_HEADLINES`]. The channel's own
/// title is not a headline. Titles may be escaped text or CDATA.
fn headlines(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut titles = Vec::new();
    let mut in_item = false;
    let mut current: Option<String> = None;

    while titles.len() < MAX_HEADLINES {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"item" => in_item = true,
                b"title" if in_item => current = Some(String::new()),
                _ => {}
            },
            Event::End(tag) => match tag.local_name().as_ref() {
                b"item" => in_item = false,
                b"title" => {
                    if let Some(title) = current.take().map(|t| t.trim().to_string())
                        && !title.is_empty()
                    {
                        titles.push(title);
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(data) => {
                if let Some(title) = current.as_mut() {
                    title.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(titles)
}
