//! Main-content extraction: boilerplate removal, metadata and rendering
//! into the requested output format.
//!
//! Locating the main content is delegated to `readability`. Its result is
//! sanitized here and rendered into the requested format.

mod clean;
mod metadata;
mod render;

use scraper::Html;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::api::models::OutputFormat;
use crate::error::ScrapeError;

pub use clean::{clean_fragment, comment_sections};
pub use metadata::{PageMetadata, extract_metadata};
pub use render::{DocumentInfo, to_csv, to_markdown, to_text, to_xml};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub include_comments: bool,
    pub include_tables: bool,
    pub include_images: bool,
    pub include_links: bool,
    pub normalize_paragraphs: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            include_comments: false,
            include_tables: true,
            include_images: true,
            include_links: true,
            normalize_paragraphs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub content: String,
    pub metadata: PageMetadata,
}

/// Extracts the main content of `html` in `format`.
///
/// `base_url` resolves relative links and images; `source_url` is only
/// echoed into the `json`, `xml` and `csv` outputs.
pub fn extract(
    html: &str,
    base_url: &Url,
    source_url: &str,
    format: OutputFormat,
    options: &ExtractOptions,
) -> Result<Extraction, ScrapeError> {
    let document = Html::parse_document(html);
    let metadata = extract_metadata(&document);

    let fragment = main_fragment(html, &document, base_url, options)?;
    let text = to_text(&fragment, options.normalize_paragraphs);
    if text.is_empty() {
        return Err(ScrapeError::ExtractionFailed(
            "no main content found".to_string(),
        ));
    }

    let info = DocumentInfo {
        source_url,
        hostname: base_url.host_str(),
        metadata: &metadata,
    };
    let content = match format {
        OutputFormat::Markdown => to_markdown(&fragment)?,
        OutputFormat::Html => fragment.trim().to_string(),
        OutputFormat::Json => json!({
            "title": metadata.title,
            "language": metadata.language,
            "sourceURL": source_url,
            "text": text,
        })
        .to_string(),
        OutputFormat::Xml => to_xml(&fragment, &info),
        OutputFormat::Csv => to_csv(&text, &info),
        OutputFormat::Txt => text,
    };

    Ok(Extraction { content, metadata })
}

/// The cleaned main-content fragment.
///
/// When the readability candidate is empty once sanitized, the whole body
/// is used instead, minus page chrome.
fn main_fragment(
    html: &str,
    document: &Html,
    base_url: &Url,
    options: &ExtractOptions,
) -> Result<String, ScrapeError> {
    if let Some(readable) = readable_html(html, base_url) {
        let parsed = Html::parse_fragment(&readable);
        let mut fragment = clean_fragment(parsed.root_element(), base_url, options);

        if !to_text(&fragment, true).is_empty() {
            // readability discards comment sections outright
            if options.include_comments {
                fragment.push_str(&comment_sections(document, base_url, options));
            }
            return Ok(fragment);
        }
        debug!(url = %base_url, "Readability candidate was empty, using the page body");
    }

    let body = clean::body(document)
        .ok_or_else(|| ScrapeError::ExtractionFailed("document has no body".to_string()))?;
    Ok(clean_fragment(body, base_url, options))
}

fn readable_html(html: &str, base_url: &Url) -> Option<String> {
    match readability::extractor::extract(&mut html.as_bytes(), base_url) {
        Ok(product) => Some(product.content),
        Err(e) => {
            debug!(url = %base_url, error = ?e, "Readability failed");
            None
        }
    }
}
