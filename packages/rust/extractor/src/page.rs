//! HTML → [`ContentSnapshot`] extraction.
//!
//! Reads head metadata (description, keywords, author, Open Graph, canonical
//! link), heading and paragraph texts, and the visible body text, bounded to
//! the snapshot limits.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use markfold_shared::{ContentSnapshot, PageMetadata};

/// Elements whose text never reaches the reader.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect("valid selector"));
    };
}

selector!(TITLE, "title");
selector!(DESCRIPTION, r#"meta[name="description"]"#);
selector!(KEYWORDS, r#"meta[name="keywords"]"#);
selector!(AUTHOR, r#"meta[name="author"]"#);
selector!(OG_TAGS, r#"meta[property^="og:"]"#);
selector!(CANONICAL, r#"link[rel="canonical"]"#);
selector!(HEADINGS, "h1, h2, h3, h4, h5, h6");
selector!(PARAGRAPHS, "p");
selector!(BODY, "body");

/// Extract a bounded snapshot of `html`, which was loaded from `url`.
#[instrument(skip(html), fields(html_len = html.len()))]
pub fn extract_snapshot(html: &str, url: &str) -> ContentSnapshot {
    let doc = Html::parse_document(html);

    let headings: Vec<String> = doc
        .select(&HEADINGS)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    let paragraphs: Vec<String> = doc
        .select(&PARAGRAPHS)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .take(ContentSnapshot::MAX_PARAGRAPHS)
        .collect();

    let text: String = visible_text(&doc)
        .chars()
        .take(ContentSnapshot::MAX_TEXT_CHARS)
        .collect();

    let snapshot = ContentSnapshot {
        url: url.to_string(),
        title: document_title(&doc),
        metadata: extract_metadata(&doc, url),
        headings,
        paragraphs,
        text,
        error: None,
    };

    debug!(
        headings = snapshot.headings.len(),
        paragraphs = snapshot.paragraphs.len(),
        text_chars = snapshot.text.chars().count(),
        "snapshot extracted"
    );
    snapshot
}

/// Read `<head>` metadata.
fn extract_metadata(doc: &Html, url: &str) -> PageMetadata {
    let keywords = meta_content(doc, &KEYWORDS)
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect();

    let mut og_tags = BTreeMap::new();
    for el in doc.select(&OG_TAGS) {
        if let Some(property) = el.value().attr("property") {
            let key = property.strip_prefix("og:").unwrap_or(property);
            let content = el.value().attr("content").unwrap_or_default();
            og_tags.insert(key.to_string(), content.to_string());
        }
    }

    let canonical_url = doc
        .select(&CANONICAL)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|href| resolve_href(url, href))
        .unwrap_or_default();

    PageMetadata {
        description: meta_content(doc, &DESCRIPTION),
        keywords,
        author: meta_content(doc, &AUTHOR),
        og_tags,
        canonical_url,
    }
}

/// `content` attribute of the first element matching `selector`, or empty.
fn meta_content(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}

fn document_title(doc: &Html) -> String {
    doc.select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Make a possibly relative `href` absolute against the page URL.
fn resolve_href(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Body text without script/style content, whitespace collapsed.
fn visible_text(doc: &Html) -> String {
    let Some(body) = doc.select(&BODY).next() else {
        return String::new();
    };

    let mut raw = String::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE_TAGS.contains(&e.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    collapse_whitespace(&raw)
}

fn collapse_whitespace(s: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<!doctype html>
<html>
<head>
  <title>Tokio Tutorial | Async Rust</title>
  <meta name="description" content="Learn async Rust with Tokio.">
  <meta name="keywords" content="rust, async, , tokio ">
  <meta name="author" content="Tokio Team">
  <meta property="og:type" content="article">
  <meta property="og:site_name" content="Tokio">
  <link rel="canonical" href="/tokio/tutorial">
  <style>body { color: red; }</style>
</head>
<body>
  <h1>Tutorial</h1>
  <h2>  Setup
     steps </h2>
  <h3></h3>
  <p>Tokio is an asynchronous runtime.</p>
  <p>   </p>
  <p>It provides I/O, timers, and tasks.</p>
  <script>var hidden = "do not include";</script>
  <noscript>enable js</noscript>
</body>
</html>"#;

    #[test]
    fn extracts_metadata() {
        let snapshot = extract_snapshot(ARTICLE, "https://tokio.rs/tokio/tutorial?ref=x");
        assert_eq!(snapshot.title, "Tokio Tutorial | Async Rust");
        assert_eq!(snapshot.url, "https://tokio.rs/tokio/tutorial?ref=x");
        assert_eq!(snapshot.metadata.description, "Learn async Rust with Tokio.");
        assert_eq!(snapshot.metadata.keywords, ["rust", "async", "tokio"]);
        assert_eq!(snapshot.metadata.author, "Tokio Team");
        assert_eq!(snapshot.metadata.og_tags["type"], "article");
        assert_eq!(snapshot.metadata.og_tags["site_name"], "Tokio");
        assert_eq!(
            snapshot.metadata.canonical_url,
            "https://tokio.rs/tokio/tutorial"
        );
        assert!(snapshot.is_usable());
    }

    #[test]
    fn extracts_headings_and_paragraphs() {
        let snapshot = extract_snapshot(ARTICLE, "https://tokio.rs/");
        assert_eq!(snapshot.headings, ["Tutorial", "Setup steps"]);
        assert_eq!(
            snapshot.paragraphs,
            [
                "Tokio is an asynchronous runtime.",
                "It provides I/O, timers, and tasks."
            ]
        );
    }

    #[test]
    fn visible_text_skips_scripts() {
        let snapshot = extract_snapshot(ARTICLE, "https://tokio.rs/");
        assert!(snapshot.text.starts_with("Tutorial Setup steps Tokio is"));
        assert!(!snapshot.text.contains("do not include"));
        assert!(!snapshot.text.contains("enable js"));
        assert!(!snapshot.text.contains("color: red"));
    }

    #[test]
    fn bounds_paragraphs_and_text() {
        let mut html = String::from("<html><body>");
        for i in 0..25 {
            html.push_str(&format!("<p>paragraph {i} {}</p>", "é".repeat(400)));
        }
        html.push_str("</body></html>");

        let snapshot = extract_snapshot(&html, "https://example.com/");
        assert_eq!(snapshot.paragraphs.len(), ContentSnapshot::MAX_PARAGRAPHS);
        assert!(snapshot.paragraphs[0].starts_with("paragraph 0 "));
        assert_eq!(snapshot.paragraphs[9].split(' ').nth(1), Some("9"));
        assert_eq!(
            snapshot.text.chars().count(),
            ContentSnapshot::MAX_TEXT_CHARS
        );
    }

    #[test]
    fn empty_document_yields_empty_snapshot() {
        let snapshot = extract_snapshot("", "https://example.com/");
        assert_eq!(snapshot.title, "");
        assert!(snapshot.headings.is_empty());
        assert!(snapshot.paragraphs.is_empty());
        assert!(snapshot.metadata.og_tags.is_empty());
        assert_eq!(snapshot.text, "");
    }
}
