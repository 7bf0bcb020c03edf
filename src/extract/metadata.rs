use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::clean::collapse_whitespace;

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("title"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("h1"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static OG_LOCALE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:locale"]"#));
static OG_LOCALE_ALTERNATE: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:locale:alternate"]"#));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static OG_SITE_NAME: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:site_name"]"#));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static META_AUTHOR: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="author"]"#));
static META_HTTP_EQUIV: Lazy<Selector> = Lazy::new(|| selector("meta[http-equiv]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Failed to parse metadata selector")
}

/// Best-effort document metadata. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub site_name: Option<String>,
    pub og_locale_alternate: Vec<String>,
}

pub fn extract_metadata(document: &Html) -> PageMetadata {
    let title = meta_content(document, &OG_TITLE)
        .or_else(|| element_text(document, &TITLE_SELECTOR))
        .or_else(|| element_text(document, &H1_SELECTOR));

    let language = document
        .root_element()
        .value()
        .attr("lang")
        .and_then(non_empty)
        .or_else(|| content_language(document))
        .or_else(|| meta_content(document, &OG_LOCALE));

    let description = meta_content(document, &META_DESCRIPTION)
        .or_else(|| meta_content(document, &OG_DESCRIPTION));

    let og_locale_alternate = document
        .select(&OG_LOCALE_ALTERNATE)
        .filter_map(|el| el.value().attr("content"))
        .filter_map(non_empty)
        .collect();

    PageMetadata {
        title,
        language,
        description,
        author: meta_content(document, &META_AUTHOR),
        site_name: meta_content(document, &OG_SITE_NAME),
        og_locale_alternate,
    }
}

fn content_language(document: &Html) -> Option<String> {
    document
        .select(&META_HTTP_EQUIV)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("content-language"))
        })
        .find_map(|el| el.value().attr("content").and_then(non_empty))
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| el.value().attr("content").and_then(non_empty))
}

fn element_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .find_map(|el| non_empty(&el.text().collect::<String>()))
}

fn non_empty(raw: &str) -> Option<String> {
    let collapsed = collapse_whitespace(raw);
    if collapsed.is_empty() { None } else { Some(collapsed) }
}
