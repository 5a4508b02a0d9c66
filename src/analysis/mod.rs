//! Lightweight page analysis run on the scraping server.
//!
//! Pure, synchronous functions over HTML text. They are fast enough to run
//! inline on the front-end scheduler between fetch and the processing
//! round-trip.

pub mod html;
pub mod metadata;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

pub use html::HtmlDocument;

/// Cheap analysis of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingData {
    pub title: Option<String>,
    pub links: Vec<String>,
    pub meta_tags: BTreeMap<String, String>,
    pub structure: BTreeMap<String, usize>,
    pub images_count: usize,
    /// Readable page text, script and style content removed.
    #[serde(default)]
    pub text_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structured_data: Vec<serde_json::Value>,
}

const TEXT_CONTENT_LIMIT: usize = 1000;

/// Analyze `html` fetched from `page_url`.
pub fn analyze(html: &str, page_url: &Url) -> ScrapingData {
    let doc = HtmlDocument::parse(html);
    ScrapingData {
        title: doc.title(),
        links: doc.links(page_url),
        meta_tags: metadata::extract_meta_tags(&doc),
        structure: doc.structure(),
        images_count: doc.count_images(),
        text_content: doc.visible_text(TEXT_CONTENT_LIMIT),
        language: metadata::extract_language(&doc),
        structured_data: metadata::extract_structured_data(&doc),
    }
}
