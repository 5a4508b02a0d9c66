//! Page metadata: meta tags, language and JSON-LD blocks.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use scraper::Selector;
use serde_json::Value;

use crate::analysis::html::HtmlDocument;

const STANDARD_TAGS: &[&str] = &["description", "keywords", "author", "viewport", "robots"];
const OPEN_GRAPH_TAGS: &[&str] = &[
    "og:title",
    "og:description",
    "og:image",
    "og:url",
    "og:type",
    "og:site_name",
];
const TWITTER_TAGS: &[&str] = &[
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
];

static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("valid selector"));
static CANONICAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="canonical"][href]"#).expect("valid selector"));
static HTML_LANG: Lazy<Selector> = Lazy::new(|| Selector::parse("html[lang]").expect("valid selector"));
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector"));

/// Standard, Open Graph and Twitter meta tags plus the canonical link.
pub fn extract_meta_tags(doc: &HtmlDocument) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let lookups = STANDARD_TAGS
        .iter()
        .map(|name| ("name", *name))
        .chain(OPEN_GRAPH_TAGS.iter().map(|name| ("property", *name)))
        .chain(TWITTER_TAGS.iter().map(|name| ("name", *name)));

    for (attr, name) in lookups {
        if let Some(content) = meta_content(doc, attr, name) {
            tags.insert(name.to_string(), content);
        }
    }

    if let Some(href) = doc
        .inner()
        .select(&CANONICAL)
        .next()
        .and_then(|l| l.value().attr("href"))
        .filter(|h| !h.is_empty())
    {
        tags.insert("canonical".to_string(), href.to_string());
    }
    tags
}

/// `<html lang>` or the `content-language` meta.
pub fn extract_language(doc: &HtmlDocument) -> Option<String> {
    let from_html = doc
        .inner()
        .select(&HTML_LANG)
        .next()
        .and_then(|h| h.value().attr("lang"))
        .filter(|l| !l.is_empty());
    if let Some(lang) = from_html {
        return Some(lang.to_string());
    }

    doc.inner()
        .select(&META)
        .find(|m| {
            m.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("content-language"))
        })
        .and_then(|m| m.value().attr("content"))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Parsed JSON-LD blocks; unparsable blocks are skipped.
pub fn extract_structured_data(doc: &HtmlDocument) -> Vec<Value> {
    doc.inner()
        .select(&JSON_LD)
        .filter_map(|script| serde_json::from_str(&script.text().collect::<String>()).ok())
        .collect()
}

fn meta_content(doc: &HtmlDocument, attr: &str, name: &str) -> Option<String> {
    doc.inner()
        .select(&META)
        .find(|m| m.value().attr(attr) == Some(name))
        .and_then(|m| m.value().attr("content"))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html lang="es"><head>
        <meta name="description" content="A test page">
        <meta name="keywords" content="">
        <meta property="og:title" content="OG Title">
        <meta name="twitter:card" content="summary">
        <link rel="canonical" href="https://example.com/canonical">
        <script type="application/ld+json">{"@type": "Organization", "name": "Acme"}</script>
        <script type="application/ld+json">{ not json</script>
        </head><body></body></html>
    "#;

    #[test]
    fn meta_tags_skip_empty_content() {
        let doc = HtmlDocument::parse(PAGE);
        let tags = extract_meta_tags(&doc);
        assert_eq!(tags.get("description").map(String::as_str), Some("A test page"));
        assert_eq!(tags.get("og:title").map(String::as_str), Some("OG Title"));
        assert_eq!(tags.get("twitter:card").map(String::as_str), Some("summary"));
        assert_eq!(
            tags.get("canonical").map(String::as_str),
            Some("https://example.com/canonical")
        );
        assert!(!tags.contains_key("keywords"));
    }

    #[test]
    fn language_from_html_or_meta() {
        assert_eq!(extract_language(&HtmlDocument::parse(PAGE)).as_deref(), Some("es"));

        let doc = HtmlDocument::parse(
            r#"<html><head><meta http-equiv="Content-Language" content="fr"></head></html>"#,
        );
        assert_eq!(extract_language(&doc).as_deref(), Some("fr"));

        assert_eq!(extract_language(&HtmlDocument::parse("<p>x</p>")), None);
    }

    #[test]
    fn json_ld_skips_invalid_blocks() {
        let data = extract_structured_data(&HtmlDocument::parse(PAGE));
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "Acme");
    }
}
