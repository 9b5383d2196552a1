//! System prompt and the fixed texts the graph injects.

use chrono::{DateTime, Utc};

/// Appended to the system prompt once the soft threshold is reached.
pub const WRAP_UP_WARNING: &str = "You have already made many tool calls for this request. \
Do not call any more tools. Using the information gathered so far, write your final answer now.";

/// Emitted when the hard cap ends a turn that produced no text at all.
pub const CAP_FALLBACK: &str = "I could not complete this request within the allowed number of \
tool calls. Please try rephrasing it or breaking it into smaller questions.";

const BASE_PROMPT: &str = "You are a helpful personal assistant. You answer questions, research \
topics and take care of small tasks through natural conversation.

When using tools:
- Only use the tools that are provided, and always actually call them. Never pretend a tool ran.
- Wait for the tool result before telling the user what happened, and report the actual result.
- Do not mention tool names or backend services; say \"Let me look that up\" instead.
- If a tool returns an error or an instruction (for example to connect a calendar), pass it on in plain language.
- Be selective: three or four tool calls are usually enough. Then synthesize a final answer.
- If a call fails, retry once with corrected input or try another approach. Never invent information.

Choosing sources:
- General knowledge: wikipedia_search, then wikipedia_page for details.
- Books: google_books_search, then google_book_details.
- Computer science, physics and math papers: arxiv_search.
- Current events: news_headlines. A specific page: web_scraper.

Scheduling: use the current year from the date above when building start and end times.

Use earlier messages for context and remember preferences the user mentions.";

/// The system prompt for a turn, opening with today's date.
///
/// `custom` replaces the built-in instructions but keeps the date line.
pub fn system_prompt(custom: Option<&str>, now: DateTime<Utc>) -> String {
    format!(
        "CURRENT DATE: {} ({})\n\n{}",
        now.format("%Y-%m-%d"),
        now.format("%A, %B %-d, %Y"),
        custom.unwrap_or(BASE_PROMPT)
    )
}

/// The prompt for a step taken after the soft threshold.
pub fn with_wrap_up(prompt: &str) -> String {
    format!("{prompt}\n\n{WRAP_UP_WARNING}")
}
