//! Google Books search and volume details.

use agentwire_core::context::RequestContext;
use agentwire_core::error::ToolError;
use agentwire_core::tool::Tool;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::HttpContext;

const MAX_RESULTS: &str = "5";

pub struct BookSearchTool {
    http: HttpContext,
}

impl BookSearchTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookHit {
    volume_id: String,
    title: String,
    authors: Vec<String>,
}

#[async_trait]
impl Tool for BookSearchTool {
    fn name(&self) -> &str {
        "google_books_search"
    }

    fn description(&self) -> &str {
        "Search Google Books. Input is a query (title, author or subject). Returns up \
         to five books with volumeId, title and authors; pass a volumeId to \
         google_book_details for more."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a search query".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error searching books: {e}"));
        let url = HttpContext::url(&self.http.endpoints.google_books, &["books", "v1", "volumes"])
            .map_err(fail)?;
        let body = self
            .http
            .get_json(
                url,
                &[("langRestrict", "en"), ("q", query), ("maxResults", MAX_RESULTS)],
            )
            .await
            .map_err(|e| fail(e.to_string()))?;

        let hits: Vec<BookHit> = body["items"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|item| BookHit {
                volume_id: item["id"].as_str().unwrap_or_default().to_string(),
                title: item["volumeInfo"]["title"]
                    .as_str()
                    .unwrap_or("Untitled")
                    .to_string(),
                authors: string_list(&item["volumeInfo"]["authors"]),
            })
            .collect();

        if hits.is_empty() {
            return Ok(format!("No books found for '{query}'."));
        }
        serde_json::to_string(&hits).map_err(|e| fail(e.to_string()))
    }
}

pub struct BookDetailsTool {
    http: HttpContext,
}

impl BookDetailsTool {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

/// `volumeInfo` keys passed through to the model.
const DETAIL_FIELDS: &[&str] = &[
    "title",
    "subtitle",
    "authors",
    "publisher",
    "publishedDate",
    "description",
    "pageCount",
    "categories",
    "averageRating",
    "ratingsCount",
    "language",
    "previewLink",
    "infoLink",
];

#[async_trait]
impl Tool for BookDetailsTool {
    fn name(&self) -> &str {
        "google_book_details"
    }

    fn description(&self) -> &str {
        "Get details for a book from Google Books. Input is a volumeId returned by \
         google_books_search. Returns publisher, dates, description, page count, \
         categories, ratings, ISBN and links."
    }

    async fn run(&self, input: &str, _ctx: &RequestContext) -> Result<String, ToolError> {
        let volume_id = input.trim();
        if volume_id.is_empty() {
            return Err(ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: "expected a volumeId".into(),
            });
        }

        let fail = |e: String| ToolError::failed(format!("Error fetching book details: {e}"));
        let url = HttpContext::url(
            &self.http.endpoints.google_books,
            &["books", "v1", "volumes", volume_id],
        )
        .map_err(fail)?;
        let body = self
            .http
            .get_json(url, &[])
            .await
            .map_err(|e| fail(e.to_string()))?;

        let info = body
            .get("volumeInfo")
            .and_then(Value::as_object)
            .ok_or_else(|| fail("response has no volumeInfo".into()))?;

        let mut details = Map::new();
        for field in DETAIL_FIELDS {
            if let Some(value) = info.get(*field) {
                details.insert((*field).to_string(), value.clone());
            }
        }
        if let Some(isbn) = pick_isbn(&info["industryIdentifiers"]) {
            details.insert("isbn".into(), Value::String(isbn));
        }

        serde_json::to_string(&details).map_err(|e| fail(e.to_string()))
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// ISBN-13 if present, else ISBN-10.
fn pick_isbn(identifiers: &Value) -> Option<String> {
    let ids = identifiers.as_array()?;
    let find = |kind: &str| {
        ids.iter()
            .find(|id| id["type"] == kind)
            .and_then(|id| id["identifier"].as_str())
            .map(str::to_string)
    };
    find("ISBN_13").or_else(|| find("ISBN_10"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_isbn_13() {
        let ids = json!([
            {"type": "ISBN_10", "identifier": "0131103628"},
            {"type": "ISBN_13", "identifier": "9780131103627"}
        ]);
        assert_eq!(pick_isbn(&ids).as_deref(), Some("9780131103627"));
        assert_eq!(
            pick_isbn(&json!([{"type": "ISBN_10", "identifier": "0131103628"}])).as_deref(),
            Some("0131103628")
        );
        assert!(pick_isbn(&Value::Null).is_none());
    }

    #[test]
    fn authors_tolerate_missing_field() {
        assert!(string_list(&Value::Null).is_empty());
        assert_eq!(string_list(&json!(["Kernighan", "Ritchie"])).len(), 2);
    }
}
