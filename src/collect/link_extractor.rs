use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+|www\.[^\s<>"{}|\\^`\[\]]+"#)
        .expect("URL pattern is valid")
});

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Invalid selector"));

/// Characters that end a sentence or close markdown rather than belong to the URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '*'];

/// Extract URLs from plain or markdown text.
///
/// Bare `www.` hosts get an `http://` scheme. Order of first appearance is kept.
#[must_use]
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for m in URL_PATTERN.find_iter(text) {
        let raw = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if raw.is_empty() {
            continue;
        }
        let url = if raw.len() >= 4 && raw[..4].eq_ignore_ascii_case("www.") {
            format!("http://{raw}")
        } else {
            raw.to_string()
        };
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }

    urls
}

/// Extract anchor targets from an HTML fragment.
///
/// Accepts entity-escaped HTML as returned in Reddit's `selftext_html`.
#[must_use]
pub fn extract_html_links(html: &str) -> Vec<String> {
    let html = if html.contains("&lt;") {
        decode_entities(html)
    } else {
        html.to_string()
    };

    let document = Html::parse_fragment(&html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        // Skip empty hrefs, anchors, relative and non-web links
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with('/')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }
        if seen.insert(href.to_string()) {
            links.push(href.to_string());
        }
    }

    links
}

/// Turn `&lt;a href=...&gt;` back into markup by letting the parser decode it as text.
fn decode_entities(escaped: &str) -> String {
    Html::parse_fragment(escaped)
        .root_element()
        .text()
        .collect()
}
