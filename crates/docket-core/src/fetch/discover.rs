//! Artifact discovery: find the PDF reference embedded in an HTML page.
//!
//! Discovery is an ordered list of strategy functions tried in sequence;
//! the first match wins. Adding a strategy means appending to
//! [`strategies`], callers never change.
//!
//! The structured strategies parse the page with `lol_html`, so attribute
//! syntax variations (quoting, whitespace, case) are the parser's problem,
//! not ours. The raw scan stays a plain text search: it exists precisely
//! for references that are not markup.

use lol_html::{element, rewrite_str, RewriteStrSettings};
use reqwest::Url;

/// A single discovery strategy: given the page HTML and its base URL,
/// return the absolute artifact URL if this strategy finds one.
pub type Strategy = fn(&str, &Url) -> Option<Url>;

/// Strategies in priority order: structured metadata first, explicit link
/// patterns next, raw scan as the last resort.
pub fn strategies() -> &'static [Strategy] {
    &[meta_citation_pdf, anchor_pdf_link, raw_pdf_scan]
}

/// Run the strategy chain; `None` means the page exposes no artifact.
pub fn discover_artifact_url(html: &str, base: &Url) -> Option<Url> {
    strategies().iter().find_map(|s| s(html, base))
}

/// Selects the first element matched by `selector` and returns `extract`'s
/// first non-`None` answer for it.
fn select_first<F>(html: &str, selector: &str, extract: F) -> Option<String>
where
    F: Fn(&lol_html::html_content::Element<'_, '_>) -> Option<String>,
{
    let mut found: Option<String> = None;
    let handler = element!(selector, |el| {
        if found.is_none() {
            found = extract(el);
        }
        Ok(())
    });
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![handler],
            ..RewriteStrSettings::default()
        },
    )
    .ok()?;
    found
}

/// `<meta name="citation_pdf_url" content="...">`: the structured scholarly
/// metadata convention, also used by several court-opinion portals.
fn meta_citation_pdf(html: &str, base: &Url) -> Option<Url> {
    let content = select_first(html, "meta[name]", |el| {
        let name = el.get_attribute("name")?;
        if name.eq_ignore_ascii_case("citation_pdf_url") {
            el.get_attribute("content")
        } else {
            None
        }
    })?;
    base.join(&content).ok()
}

/// First anchor whose href points at a `.pdf` path or an explicit download
/// endpoint.
fn anchor_pdf_link(html: &str, base: &Url) -> Option<Url> {
    let href = select_first(html, "a[href]", |el| {
        el.get_attribute("href").filter(|h| is_artifact_href(h))
    })?;
    base.join(&href).ok()
}

fn is_artifact_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_ascii_lowercase().ends_with(".pdf")
        || href.to_ascii_lowercase().contains("/download/")
}

/// Fallback: scan the raw text for an absolute URL ending in `.pdf`
/// (catches references buried in inline scripts or attributes the other
/// strategies do not look at).
fn raw_pdf_scan(html: &str, _base: &Url) -> Option<Url> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find(".pdf") {
        let end = from + pos + 4;
        let bytes = html.as_bytes();
        let mut start = from + pos;
        while start > 0 && is_url_byte(bytes[start - 1]) {
            start -= 1;
        }
        let candidate = &html[start..end];
        if candidate.starts_with("http://") || candidate.starts_with("https://") {
            if let Ok(url) = Url::parse(candidate) {
                return Some(url);
            }
        }
        from = end;
    }
    None
}

fn is_url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'/' | b'.' | b'-' | b'_' | b'~' | b'%' | b'+')
}
