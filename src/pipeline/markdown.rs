//! Markdown → HTML body with pulldown-cmark.
//!
//! GFM tables, strikethrough, task lists and footnotes are enabled, plus
//! smart punctuation (curly quotes, en/em dashes, ellipses). Every heading
//! gets an anchor `id` so `[see below](#setup)` links resolve; `{#custom}`
//! after a heading sets one explicitly.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static RE_SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Render normalised Markdown to an HTML fragment (no `<html>`/`<body>`).
pub fn markdown_to_html(markdown: &str) -> String {
    let mut events: Vec<Event<'_>> = Parser::new_ext(markdown, options()).collect();
    add_heading_ids(&mut events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    debug!("Rendered {} bytes of Markdown → {} bytes of HTML", markdown.len(), out.len());
    out
}

// ── Heading anchors ──────────────────────────────────────────────────────────

/// Give each heading without an explicit id a unique slug of its text.
fn add_heading_ids(events: &mut [Event<'_>]) {
    let mut used: HashSet<String> = events
        .iter()
        .filter_map(|e| match e {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect();

    let mut i = 0;
    while i < events.len() {
        if !matches!(events[i], Event::Start(Tag::Heading { id: None, .. })) {
            i += 1;
            continue;
        }

        let mut text = String::new();
        let mut end = i + 1;
        while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
            if let Event::Text(t) | Event::Code(t) = &events[end] {
                text.push_str(t);
            }
            end += 1;
        }

        let slug = unique_slug(&slugify(&text), &mut used);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(slug.into());
        }
        i = end;
    }
}

/// Lowercase ASCII words joined by `-`; other characters are dropped.
fn slugify(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-') || c.is_whitespace())
        .collect();
    RE_SLUG_SEPARATORS
        .replace_all(kept.trim(), "-")
        .to_lowercase()
}

/// `slug`, or `slug_1`, `slug_2`, … when already taken (or empty).
fn unique_slug(slug: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = slug.to_string();
    let mut n = 0;
    while candidate.is_empty() || used.contains(&candidate) {
        n += 1;
        candidate = format!("{slug}_{n}");
    }
    used.insert(candidate.clone());
    candidate
}
