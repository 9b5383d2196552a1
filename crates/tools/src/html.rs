//! Markup-to-text helpers shared by the scraping tools.

use scraper::{ElementRef, Html, Node};

/// Elements whose text is never shown to a reader.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template"];

/// Inline text of an HTML fragment (search snippets). Entities are decoded.
pub fn strip_tags(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
}

/// Page text: hidden elements dropped, text nodes separated by spaces,
/// whitespace collapsed.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_visible(document.root_element(), &mut text);
    collapse_whitespace(&text)
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    if HIDDEN.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_visible(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_text_drops_scripts_and_styles() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <SCRIPT type="text/javascript">alert("hi")</SCRIPT></head>
            <body><h1>Title</h1><p>First   paragraph &amp; more.</p>
            <noscript>Enable JavaScript</noscript></body></html>"#;
        assert_eq!(page_text(html), "Title First paragraph & more.");
    }

    #[test]
    fn named_and_numeric_entities_are_decoded() {
        let html = "<p>It&#8217;s caf&eacute; &#x2014; &mdash; ok</p>";
        assert_eq!(page_text(html), "It\u{2019}s caf\u{e9} \u{2014} \u{2014} ok");
        assert_eq!(strip_tags("a &lt;b&gt; &amp;&nbsp;c"), "a <b> &\u{a0}c");
    }

    #[test]
    fn strip_tags_keeps_inline_text() {
        let snippet = r#"The <span class="searchmatch">Rust</span> language"#;
        assert_eq!(strip_tags(snippet), "The Rust language");
    }

    #[test]
    fn malformed_markup_still_yields_text() {
        assert_eq!(page_text("<div><p>unclosed <b>bold</div> tail"), "unclosed bold tail");
        assert_eq!(page_text(""), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
