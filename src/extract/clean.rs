//! Sanitizing of extracted markup.
//!
//! Whatever subtree the content detector returns is serialized into a small,
//! whitelisted HTML fragment that the renderers consume.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use super::ExtractOptions;

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6").expect("Failed to parse heading selector")
});

static COMMENT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[id*="comment"], [class*="comment"], #disqus_thread"#)
        .expect("Failed to parse comment selector")
});

const DROPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "footer", "aside", "form", "button",
    "svg", "template", "select", "input", "textarea", "object", "embed", "canvas", "head",
    "title", "meta", "link",
];

/// Elements kept as-is in the cleaned fragment.
const KEPT_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre", "code",
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption", "dl", "dt", "dd",
    "figure", "figcaption", "em", "strong", "b", "i", "sub", "sup", "del",
];

/// Structural containers, emitted as `div` so block boundaries survive.
const BLOCK_CONTAINERS: &[&str] = &[
    "div", "section", "article", "main", "body", "center", "details", "summary", "address",
    "header",
];

const COMMENT_MARKERS: &[&str] = &["comment", "comments", "disqus", "respond", "replies"];

pub fn body(document: &Html) -> Option<ElementRef<'_>> {
    document.select(&BODY_SELECTOR).next()
}

/// Serializes `root` into a cleaned HTML fragment.
pub fn clean_fragment(root: ElementRef<'_>, base: &Url, options: &ExtractOptions) -> String {
    let mut cleaner = Cleaner {
        base,
        options,
        out: String::new(),
    };
    cleaner.write_children(root, false);
    cleaner.out
}

/// Cleaned comment sections of `document`, outermost matches only.
pub fn comment_sections(document: &Html, base: &Url, options: &ExtractOptions) -> String {
    let mut out = String::new();
    for section in document.select(&COMMENT_SELECTOR) {
        let nested = section
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| COMMENT_SELECTOR.matches(&ancestor));
        if nested {
            continue;
        }
        out.push_str("<div>");
        out.push_str(&clean_fragment(section, base, options));
        out.push_str("</div>");
    }
    out
}

struct Cleaner<'a> {
    base: &'a Url,
    options: &'a ExtractOptions,
    out: String,
}

impl Cleaner<'_> {
    fn write_children(&mut self, el: ElementRef<'_>, in_pre: bool) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.write_text(text, in_pre),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.write_element(child_el, in_pre);
                    }
                }
                // comments, doctypes, processing instructions
                _ => {}
            }
        }
    }

    fn write_element(&mut self, el: ElementRef<'_>, in_pre: bool) {
        if self.is_dropped(el) {
            return;
        }

        let name = el.value().name();
        match name {
            "img" => self.write_image(el),
            "a" => self.write_link(el, in_pre),
            "br" => self.out.push_str("<br>"),
            "hr" => self.out.push_str("<hr>"),
            _ if KEPT_TAGS.contains(&name) => {
                let in_pre = in_pre || name == "pre";
                self.out.push('<');
                self.out.push_str(name);
                self.out.push('>');
                self.write_children(el, in_pre);
                self.out.push_str("</");
                self.out.push_str(name);
                self.out.push('>');
            }
            _ if BLOCK_CONTAINERS.contains(&name) => {
                self.out.push_str("<div>");
                self.write_children(el, in_pre);
                self.out.push_str("</div>");
            }
            _ => self.write_children(el, in_pre),
        }
    }

    fn write_text(&mut self, text: &str, in_pre: bool) {
        if in_pre || !self.options.normalize_paragraphs {
            push_escaped(&mut self.out, text);
            return;
        }

        let collapsed = collapse_whitespace(text);
        if collapsed.is_empty() {
            // Keep one separator between inline siblings.
            if !text.is_empty() && !self.out.ends_with(' ') {
                self.out.push(' ');
            }
            return;
        }
        if text.starts_with(char::is_whitespace) && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
        push_escaped(&mut self.out, &collapsed);
        if text.ends_with(char::is_whitespace) {
            self.out.push(' ');
        }
    }

    fn write_image(&mut self, el: ElementRef<'_>) {
        if !self.options.include_images {
            return;
        }
        let src = el
            .value()
            .attr("src")
            .or_else(|| el.value().attr("data-src"))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let Some(src) = src else {
            return;
        };

        let src = self.resolve(src);
        self.out.push_str("<img src=\"");
        push_escaped(&mut self.out, &src);
        self.out.push('"');
        if let Some(alt) = el.value().attr("alt") {
            self.out.push_str(" alt=\"");
            push_escaped(&mut self.out, alt.trim());
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn write_link(&mut self, el: ElementRef<'_>, in_pre: bool) {
        let href = el
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"));

        match href {
            Some(href) if self.options.include_links => {
                let href = self.resolve(href);
                self.out.push_str("<a href=\"");
                push_escaped(&mut self.out, &href);
                self.out.push_str("\">");
                self.write_children(el, in_pre);
                self.out.push_str("</a>");
            }
            _ => self.write_children(el, in_pre),
        }
    }

    fn resolve(&self, reference: &str) -> String {
        self.base
            .join(reference)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| reference.to_string())
    }

    fn is_dropped(&self, el: ElementRef<'_>) -> bool {
        let element = el.value();
        let name = element.name();

        if DROPPED_TAGS.contains(&name) {
            return true;
        }
        if name == "header" && el.select(&HEADING_SELECTOR).next().is_none() {
            return true;
        }
        if name == "table" && !self.options.include_tables {
            return true;
        }
        if element.attr("hidden").is_some()
            || element.attr("aria-hidden") == Some("true")
            || element
                .attr("style")
                .is_some_and(|s| s.replace(' ', "").contains("display:none"))
        {
            return true;
        }

        !self.options.include_comments && names_comments(el)
    }
}

fn names_comments(el: ElementRef<'_>) -> bool {
    let element = el.value();
    element.id().into_iter().chain(element.classes()).any(|attr| {
        attr.to_ascii_lowercase()
            .split(|c: char| c == '-' || c == '_')
            .any(|token| COMMENT_MARKERS.contains(&token))
    })
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    fn clean(html: &str, options: &ExtractOptions) -> String {
        let document = Html::parse_document(html);
        clean_fragment(body(&document).unwrap(), &base(), options)
    }

    #[test]
    fn strips_scripts_navigation_and_hidden_blocks() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <p>Kept paragraph</p>
            <script>var tracking = true;</script>
            <div hidden>Hidden promo</div>
            <div style="display: none">Invisible</div>
            <aside>Popular posts</aside>
            <footer>Copyright</footer>
        </body></html>"#;
        let fragment = clean(html, &ExtractOptions::default());

        assert!(fragment.contains("<p>Kept paragraph</p>"));
        for dropped in ["Home", "tracking", "Hidden promo", "Invisible", "Popular posts", "Copyright"] {
            assert!(!fragment.contains(dropped), "{} should be removed: {}", dropped, fragment);
        }
    }

    #[test]
    fn class_names_do_not_drop_content() {
        let html = r#"<html><body><main><div class="layout-with-sidebar">
            <h1>Budget vote</h1><p>The council approved the budget.</p>
        </div></main></body></html>"#;
        let fragment = clean(html, &ExtractOptions::default());
        assert!(fragment.contains("<h1>Budget vote</h1>"));
        assert!(fragment.contains("The council approved the budget."));
    }

    #[test]
    fn header_is_kept_only_with_a_heading() {
        let html = r#"<html><body>
            <header><a href="/">Logo</a></header>
            <header><h2>Section title</h2></header>
        </body></html>"#;
        let fragment = clean(html, &ExtractOptions::default());
        assert!(!fragment.contains("Logo"));
        assert!(fragment.contains("<h2>Section title</h2>"));
    }

    #[test]
    fn comment_sections_follow_option() {
        let html = r#"<html><body><article>
            <p>Story body</p>
            <section class="comments"><p>First!</p></section>
        </article></body></html>"#;

        let without = clean(html, &ExtractOptions::default());
        assert!(!without.contains("First!"));

        let with = clean(html, &ExtractOptions { include_comments: true, ..Default::default() });
        assert!(with.contains("First!"));
    }

    #[test]
    fn comment_sections_are_collected_once() {
        let html = r#"<html><body>
            <p>Story body</p>
            <div id="comments"><div class="comment"><p>Nice read</p></div><div class="comment"><p>Agreed</p></div></div>
        </body></html>"#;
        let document = Html::parse_document(html);
        let options = ExtractOptions { include_comments: true, ..Default::default() };
        let sections = comment_sections(&document, &base(), &options);

        assert_eq!(sections.matches("Nice read").count(), 1);
        assert_eq!(sections.matches("Agreed").count(), 1);
        assert!(!sections.contains("Story body"));
    }

    #[test]
    fn links_are_resolved_or_unwrapped() {
        let html = r#"<html><body><article><p>Read <a href="../about">about us</a> today.</p></article></body></html>"#;

        let linked = clean(html, &ExtractOptions::default());
        assert!(linked.contains(r#"<a href="https://example.com/about">about us</a>"#));

        let plain = clean(html, &ExtractOptions { include_links: false, ..Default::default() });
        assert!(!plain.contains("<a"));
        assert!(plain.contains("Read about us today."));
    }

    #[test]
    fn short_link_heavy_paragraphs_survive() {
        let html = r#"<html><body><article><div><p>Read the <a href="/report">full annual report on regional water quality</a> now.</p></div></article></body></html>"#;
        let fragment = clean(html, &ExtractOptions::default());
        assert!(fragment.contains("full annual report on regional water quality</a> now."));
    }

    #[test]
    fn images_and_tables_follow_options() {
        let html = r#"<html><body><article>
            <p>Chart below</p>
            <img src="/img/chart.png" alt="Chart">
            <table><tr><td>cell</td></tr></table>
        </article></body></html>"#;

        let full = clean(html, &ExtractOptions::default());
        assert!(full.contains(r#"<img src="https://example.com/img/chart.png" alt="Chart">"#));
        assert!(full.contains("<td>cell</td>"));

        let bare = clean(
            html,
            &ExtractOptions { include_images: false, include_tables: false, ..Default::default() },
        );
        assert!(!bare.contains("<img"));
        assert!(!bare.contains("cell"));
    }

    #[test]
    fn whitespace_is_collapsed_outside_pre() {
        let html = "<html><body><p>one\n\n   two</p><pre>a\n  b</pre></body></html>";
        let fragment = clean(html, &ExtractOptions::default());
        assert!(fragment.contains("<p>one two</p>"));
        assert!(fragment.contains("<pre>a\n  b</pre>"));
    }
}
