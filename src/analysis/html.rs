//! Structural HTML queries.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

/// Maximum links reported for one page.
pub const MAX_LINKS: usize = 100;

/// Extensions accepted as thumbnail sources.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid selector"));
static IMG_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("valid selector"));
static STYLESHEET: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="stylesheet"][href]"#).expect("valid selector"));
static SCRIPT_SRC: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script[src]").expect("valid selector"));
static HEADERS: Lazy<Vec<(String, Selector)>> = Lazy::new(|| {
    (1..=6)
        .map(|level| {
            let tag = format!("h{}", level);
            let selector = Selector::parse(&tag).expect("valid selector");
            (tag, selector)
        })
        .collect()
});

/// A parsed page.
///
/// `scraper::Html` is not `Send`, so documents are built and dropped inside
/// synchronous code and never held across an `.await`.
pub struct HtmlDocument {
    doc: Html,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }

    pub(crate) fn inner(&self) -> &Html {
        &self.doc
    }

    /// Text of the first `<title>`, trimmed.
    pub fn title(&self) -> Option<String> {
        self.doc
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
    }

    /// Absolute, deduplicated http(s) links in document order.
    pub fn links(&self, base: &Url) -> Vec<String> {
        let hrefs = self.doc.select(&ANCHOR).filter_map(|a| a.value().attr("href"));
        collect_urls(base, hrefs, MAX_LINKS, |_| true)
    }

    /// Count of each header level present on the page (`h1`..`h6`).
    pub fn structure(&self) -> BTreeMap<String, usize> {
        HEADERS
            .iter()
            .filter_map(|(tag, selector)| {
                let count = self.doc.select(selector).count();
                (count > 0).then(|| (tag.clone(), count))
            })
            .collect()
    }

    pub fn count_images(&self) -> usize {
        self.doc.select(&IMG).count()
    }

    /// Absolute raster image URLs, at most `limit`.
    pub fn image_urls(&self, base: &Url, limit: usize) -> Vec<String> {
        let sources = self.doc.select(&IMG_SRC).filter_map(|i| i.value().attr("src"));
        collect_urls(base, sources, limit, has_image_extension)
    }

    /// Visible text with scripts and styles removed, whitespace collapsed.
    ///
    /// Longer text is cut to `max_chars` characters and suffixed with `...`.
    pub fn visible_text(&self, max_chars: usize) -> String {
        let words: Vec<&str> = self
            .doc
            .root_element()
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
                });
                (!hidden).then_some(&**text)
            })
            .flat_map(str::split_whitespace)
            .collect();
        let text = words.join(" ");

        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        }
    }

    /// Stylesheets, scripts and images the page pulls in.
    pub fn resource_urls(&self, base: &Url) -> Vec<String> {
        let css = self.doc.select(&STYLESHEET).filter_map(|l| l.value().attr("href"));
        let js = self.doc.select(&SCRIPT_SRC).filter_map(|s| s.value().attr("src"));
        let img = self.doc.select(&IMG_SRC).filter_map(|i| i.value().attr("src"));
        collect_urls(base, css.chain(js).chain(img), usize::MAX, |_| true)
    }
}

fn collect_urls<'a>(
    base: &Url,
    candidates: impl Iterator<Item = &'a str>,
    limit: usize,
    accept: impl Fn(&Url) -> bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for raw in candidates {
        if urls.len() >= limit {
            break;
        }
        let Ok(resolved) = base.join(raw.trim()) else {
            continue;
        };
        if !is_http(&resolved) || !accept(&resolved) {
            continue;
        }
        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            urls.push(resolved);
        }
    }
    urls
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

fn has_image_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>  Test Page </title>
        <link rel="stylesheet" href="/style.css">
        <script src="app.js"></script>
        </head><body>
        <h1>Main</h1><h2>A</h2><h2>B</h2><h3>C</h3>
        <a href="/about">About</a>
        <a href="https://other.example/x">Other</a>
        <a href="/about">About again</a>
        <a href="mailto:someone@example.com">Mail</a>
        <a href="javascript:void(0)">JS</a>
        <img src="/img/logo.png">
        <img src="banner.JPG?v=2">
        <img src="/icon.svg">
        <img>
        </body></html>
    "#;

    fn base() -> Url {
        "https://example.com/dir/page.html".parse().unwrap()
    }

    #[test]
    fn title_is_trimmed() {
        let doc = HtmlDocument::parse(PAGE);
        assert_eq!(doc.title().as_deref(), Some("Test Page"));
        assert_eq!(HtmlDocument::parse("<p>no title</p>").title(), None);
    }

    #[test]
    fn links_are_absolute_and_unique() {
        let doc = HtmlDocument::parse(PAGE);
        assert_eq!(
            doc.links(&base()),
            vec!["https://example.com/about", "https://other.example/x"]
        );
    }

    #[test]
    fn links_are_capped() {
        let html: String = (0..150).map(|i| format!(r#"<a href="/p{}">x</a>"#, i)).collect();
        let doc = HtmlDocument::parse(&html);
        assert_eq!(doc.links(&base()).len(), MAX_LINKS);
    }

    #[test]
    fn structure_counts_present_levels_only() {
        let doc = HtmlDocument::parse(PAGE);
        let structure = doc.structure();
        assert_eq!(structure.get("h1"), Some(&1));
        assert_eq!(structure.get("h2"), Some(&2));
        assert_eq!(structure.get("h3"), Some(&1));
        assert!(!structure.contains_key("h4"));
    }

    #[test]
    fn images_counted_and_filtered() {
        let doc = HtmlDocument::parse(PAGE);
        assert_eq!(doc.count_images(), 4);
        assert_eq!(
            doc.image_urls(&base(), 5),
            vec![
                "https://example.com/img/logo.png",
                "https://example.com/dir/banner.JPG?v=2"
            ]
        );
        assert_eq!(doc.image_urls(&base(), 1).len(), 1);
    }

    #[test]
    fn resources_include_css_js_and_images() {
        let doc = HtmlDocument::parse(PAGE);
        let resources = doc.resource_urls(&base());
        assert_eq!(resources[0], "https://example.com/style.css");
        assert_eq!(resources[1], "https://example.com/dir/app.js");
        assert_eq!(resources.len(), 5);
    }

    #[test]
    fn visible_text_skips_scripts_and_truncates() {
        let doc = HtmlDocument::parse(
            "<html><head><style>p { color: red }</style></head>\
             <body><h1>Título   Principal</h1><script>var x = 1;</script><p>Subtítulo</p></body></html>",
        );
        assert_eq!(doc.visible_text(1000), "Título Principal Subtítulo");
        assert_eq!(doc.visible_text(6), "Título...");
    }

    #[test]
    fn empty_and_malformed_html() {
        let doc = HtmlDocument::parse("");
        assert!(doc.links(&base()).is_empty());
        assert!(doc.structure().is_empty());

        let doc = HtmlDocument::parse("<html><h2>unclosed<p><a href='/x'>x");
        assert_eq!(doc.structure().get("h2"), Some(&1));
        assert_eq!(doc.links(&base()), vec!["https://example.com/x"]);
    }
}
