use scraper::{ElementRef, Html, Node};

use super::clean::{collapse_whitespace, push_escaped};
use super::metadata::PageMetadata;
use crate::error::ScrapeError;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre",
    "table", "thead", "tbody", "tfoot", "tr", "caption", "dl", "dt", "dd", "figure",
    "figcaption",
];

pub fn to_markdown(fragment: &str) -> Result<String, ScrapeError> {
    let markdown = htmd::convert(fragment)
        .map_err(|e| ScrapeError::ExtractionFailed(format!("markdown conversion failed: {}", e)))?;
    Ok(squeeze_blank_lines(&markdown))
}

/// Plain text, one line per block.
pub fn to_text(fragment: &str, normalize: bool) -> String {
    let parsed = Html::parse_fragment(fragment);
    let mut writer = TextWriter::default();
    writer.walk(parsed.root_element(), false);
    writer.flush();

    let mut lines: Vec<String> = Vec::with_capacity(writer.lines.len());
    for line in writer.lines {
        let line = if normalize {
            collapse_whitespace(&line)
        } else {
            line.trim_end().to_string()
        };
        if line.trim().is_empty() {
            continue;
        }
        if normalize && lines.last() == Some(&line) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[derive(Default)]
struct TextWriter {
    lines: Vec<String>,
    current: String,
}

impl TextWriter {
    fn walk(&mut self, el: ElementRef<'_>, in_pre: bool) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.text(text, in_pre),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, in_pre);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>, in_pre: bool) {
        let name = el.value().name();
        match name {
            "img" => {}
            "br" | "hr" => self.flush(),
            "td" | "th" => {
                if !self.current.trim().is_empty() {
                    self.current.push_str(" | ");
                }
                self.walk(el, in_pre);
            }
            "li" => {
                self.flush();
                self.current.push_str("- ");
                self.walk(el, in_pre);
                self.flush();
            }
            _ if BLOCK_TAGS.contains(&name) => {
                self.flush();
                self.walk(el, in_pre || name == "pre");
                self.flush();
            }
            _ => self.walk(el, in_pre),
        }
    }

    fn text(&mut self, text: &str, in_pre: bool) {
        if !in_pre {
            self.current.push_str(text);
            return;
        }
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.current.push_str(first);
        }
        for part in parts {
            self.flush();
            self.current.push_str(part);
        }
    }

    fn flush(&mut self) {
        let line = std::mem::take(&mut self.current);
        // A bare list marker with nothing after it is not content.
        if !line.trim().is_empty() && line.trim() != "-" {
            self.lines.push(line);
        }
    }
}

/// Document-level fields carried by the `xml` and `csv` renderings.
pub struct DocumentInfo<'a> {
    pub source_url: &'a str,
    pub hostname: Option<&'a str>,
    pub metadata: &'a PageMetadata,
}

const CSV_COLUMNS: &[&str] = &["url", "hostname", "title", "author", "description", "language", "text"];
const CSV_NULL: &str = "null";

/// XML document in the `<doc><main>…</main></doc>` layout: headings become
/// `head`, lists `list`/`item`, tables `row`/`cell`, links `ref` and images
/// `graphic`.
pub fn to_xml(fragment: &str, info: &DocumentInfo<'_>) -> String {
    let meta = info.metadata;
    let attrs = [
        ("sitename", meta.site_name.as_deref()),
        ("title", meta.title.as_deref()),
        ("author", meta.author.as_deref()),
        ("url", Some(info.source_url)),
        ("hostname", info.hostname),
        ("description", meta.description.as_deref()),
        ("language", meta.language.as_deref()),
    ];

    let mut writer = XmlWriter {
        out: String::from("<doc"),
    };
    for (name, value) in attrs {
        if let Some(value) = value {
            writer.attr(name, value);
        }
    }
    writer.out.push_str(">\n<main>\n");

    let parsed = Html::parse_fragment(fragment);
    writer.walk(parsed.root_element());

    let mut out = writer.out;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</main>\n</doc>");
    out
}

/// Tab-separated header line plus one record. Missing values are `null`;
/// fields holding tabs, quotes or line breaks are quoted.
pub fn to_csv(text: &str, info: &DocumentInfo<'_>) -> String {
    let meta = info.metadata;
    let record = [
        Some(info.source_url),
        info.hostname,
        meta.title.as_deref(),
        meta.author.as_deref(),
        meta.description.as_deref(),
        meta.language.as_deref(),
        Some(text),
    ];

    let fields: Vec<String> = record
        .iter()
        .map(|value| csv_field(value.unwrap_or(CSV_NULL)))
        .collect();
    format!("{}\r\n{}\r\n", CSV_COLUMNS.join("\t"), fields.join("\t"))
}

fn csv_field(value: &str) -> String {
    if value.contains(['\t', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

struct XmlWriter {
    out: String,
}

impl XmlWriter {
    fn walk(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => push_escaped(&mut self.out, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.wrap(el, "head", Some(("rend", name)), true),
            "caption" => self.wrap(el, "head", None, true),
            "p" | "figcaption" => self.wrap(el, "p", None, true),
            "ul" | "ol" | "dl" => self.wrap(el, "list", Some(("rend", name)), true),
            "li" | "dt" | "dd" => self.wrap(el, "item", None, true),
            "table" => self.wrap(el, "table", None, true),
            "tr" => self.wrap(el, "row", None, true),
            "th" => self.wrap(el, "cell", Some(("role", "head")), false),
            "td" => self.wrap(el, "cell", None, false),
            "blockquote" => self.wrap(el, "quote", None, true),
            "pre" => self.wrap(el, "code", None, true),
            "code" if inside_pre(el) => self.walk(el),
            "code" => self.wrap(el, "code", None, false),
            "em" | "i" => self.wrap(el, "hi", Some(("rend", "#i")), false),
            "strong" | "b" => self.wrap(el, "hi", Some(("rend", "#b")), false),
            "sub" => self.wrap(el, "hi", Some(("rend", "#sub")), false),
            "sup" => self.wrap(el, "hi", Some(("rend", "#sup")), false),
            "del" => self.wrap(el, "del", None, false),
            "a" => match el.value().attr("href") {
                Some(href) => self.wrap(el, "ref", Some(("target", href)), false),
                None => self.walk(el),
            },
            "img" => {
                if let Some(src) = el.value().attr("src") {
                    self.out.push_str("<graphic");
                    self.attr("src", src);
                    if let Some(alt) = el.value().attr("alt") {
                        self.attr("alt", alt);
                    }
                    self.out.push_str("/>\n");
                }
            }
            "br" => self.out.push_str("<lb/>"),
            "hr" => {}
            _ => self.walk(el),
        }
    }

    fn wrap(&mut self, el: ElementRef<'_>, tag: &str, attr: Option<(&str, &str)>, block: bool) {
        self.out.push('<');
        self.out.push_str(tag);
        if let Some((name, value)) = attr {
            self.attr(name, value);
        }
        self.out.push('>');
        self.walk(el);
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
        if block {
            self.out.push('\n');
        }
    }

    fn attr(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        push_escaped(&mut self.out, value);
        self.out.push('"');
    }
}

fn inside_pre(el: ElementRef<'_>) -> bool {
    el.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|parent| parent.value().name() == "pre")
}

fn squeeze_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}
