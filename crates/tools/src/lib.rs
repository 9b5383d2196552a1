//! Built-in tool implementations for agentwire.
//!
//! Tools give the agent the ability to reach outside the conversation:
//! do math, tell the time, read Wikipedia, arXiv, Google Scholar and Google Books, scrape a
//! page, check the weather, convert currencies, skim headlines, pull
//! YouTube transcripts and schedule meetings on Google Calendar.

pub mod arxiv;
pub mod books;
pub mod calculator;
pub mod calendar;
pub mod currency;
pub mod datetime;
pub mod html;
pub mod http;
pub mod news;
pub mod scholar;
pub mod weather;
pub mod web_scraper;
pub mod wikipedia;
pub mod youtube;

use std::sync::Arc;

use agentwire_config::ToolsConfig;
use agentwire_core::error::ToolError;
use agentwire_core::tool::{Tool, ToolRegistry};
use tracing::debug;

pub use http::{Endpoints, HttpContext};

/// Create the default tool registry against the public service endpoints.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    registry_with_endpoints(config, Endpoints::default())
}

/// Create the default tool registry with custom service endpoints.
///
/// Tools listed in `config.disabled` are skipped.
pub fn registry_with_endpoints(
    config: &ToolsConfig,
    endpoints: Endpoints,
) -> Result<ToolRegistry, ToolError> {
    let http = HttpContext::new(config, endpoints)?;

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(calculator::CalculatorTool),
        Arc::new(datetime::DateTimeTool),
        Arc::new(wikipedia::WikipediaSearchTool::new(http.clone())),
        Arc::new(wikipedia::WikipediaPageTool::new(http.clone())),
        Arc::new(books::BookSearchTool::new(http.clone())),
        Arc::new(books::BookDetailsTool::new(http.clone())),
        Arc::new(arxiv::ArxivSearchTool::new(http.clone())),
        Arc::new(scholar::AcademicSearchTool::new(http.clone())),
        Arc::new(web_scraper::WebScraperTool::new(http.clone())),
        Arc::new(weather::WeatherTool::new(http.clone())),
        Arc::new(currency::CurrencyConverterTool::new(http.clone())),
        Arc::new(news::NewsHeadlinesTool::new(http.clone())),
        Arc::new(youtube::YoutubeTranscriptTool::new(http.clone())),
        Arc::new(calendar::ScheduleMeetingTool::new(http)),
    ];

    let mut registry = ToolRegistry::new();
    for tool in tools {
        if !config.is_enabled(tool.name()) {
            debug!(tool = %tool.name(), "Tool disabled by configuration");
            continue;
        }
        registry.register(tool)?;
    }
    Ok(registry)
}
