//! Inline styling: make rendered HTML survive the Google Docs importer.
//!
//! The importer ignores almost all `<style>` CSS and has its own ideas about
//! tables and code, so every presentational rule is written inline:
//!
//! - code blocks become a one-cell shaded table with one `<p>` per source
//!   line (the importer collapses `<pre>` whitespace and line breaks);
//! - header cells become bold `<td>` cells so Docs doesn't turn the header
//!   into a repeating row across page breaks;
//! - a spacer paragraph follows every table, because Docs glues the next
//!   block to the table's bottom border.
//!
//! ## Rule Order
//!
//! Code blocks are rewritten first: the table they produce carries its own
//! inline styles and must not be picked up by the data-table rules, and their
//! `<code>` wrappers must be gone before the inline-code rule runs.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const CODE_LINE_STYLE: &str = "font-family:Courier New;font-size:11pt;margin:0;line-height:1.0";
const CODE_TABLE_OPEN: &str = concat!(
    r#"<table style="width:100%;border-collapse:collapse;margin:6pt 0"><tr>"#,
    r#"<td style="background-color:#f0f0f0;border:1px solid #d0d0d0;padding:8pt 12pt">"#,
);
const CODE_TABLE_CLOSE: &str = "</td></tr></table>";

const INLINE_CODE_OPEN: &str =
    r#"<span style="background-color:#f0f0f0;font-family:Courier New;font-size:11pt">"#;

const CELL_STYLE: &str = "border:1px solid #dfe2e5;padding:3pt 8pt";
const HEADER_CELL_STYLE: &str =
    "border:1px solid #dfe2e5;padding:3pt 8pt;background-color:#f6f8fa;font-weight:bold";
const DATA_TABLE_OPEN: &str = r#"<table style="border-collapse:collapse;width:100%;margin:4pt 0">"#;

const TABLE_SPACER: &str = "<p><br></p>";
const LIST_ITEM_OPEN: &str = r#"<li style="line-height:1.5;padding-bottom:2pt">"#;
const LIST_STYLE: &str = r#"style="margin-top:8pt""#;

/// Apply every styling rule, in order:
///
/// 1. `<pre>` code blocks → shaded single-cell table, one paragraph per line
/// 2. inline `<code>` → shaded monospace `<span>`
/// 3. drop `<thead>` / `<tbody>`
/// 4. `<th>` → bold shaded `<td>`
/// 5. `<table>` → collapsed full-width table
/// 6. `<td>` → bordered cell
/// 7. spacer paragraph after every `</table>`
/// 8. `<li>` → taller line height
/// 9. `<ul>` / `<ol>` → top margin
pub fn style_html(html: &str) -> String {
    let s = style_code_blocks(html);
    let s = style_inline_code(&s);
    let s = strip_table_sections(&s);
    let s = style_header_cells(&s);
    let s = style_data_tables(&s);
    let s = style_data_cells(&s);
    let s = add_table_spacers(&s);
    let s = style_list_items(&s);
    style_lists(&s)
}

// ── Rule 1: Code blocks ──────────────────────────────────────────────────────

static RE_PRE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<pre>(.*?)</pre>").unwrap());
static RE_CODE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?code[^>]*>").unwrap());

fn style_code_blocks(html: &str) -> String {
    RE_PRE
        .replace_all(html, |caps: &Captures<'_>| code_block_table(&caps[1]))
        .into_owned()
}

fn code_block_table(inner: &str) -> String {
    let bare = RE_CODE_TAG.replace_all(inner, "");
    let text = decode_entities(&bare);

    let mut lines: Vec<&str> = text.split('\n').collect();
    // The renderer terminates the last line with '\n'.
    if lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let mut out = String::with_capacity(text.len() * 2 + 256);
    out.push_str(CODE_TABLE_OPEN);
    for line in lines {
        out.push_str(&code_line(line));
    }
    out.push_str(CODE_TABLE_CLOSE);
    out
}

/// One source line as a paragraph. Leading spaces become no-break spaces so
/// Docs keeps the indentation; an empty line gets a single one so the
/// paragraph keeps its height.
fn code_line(line: &str) -> String {
    let safe = encode_entities(line);
    let body = if safe.is_empty() {
        "\u{a0}".to_string()
    } else {
        let rest = safe.trim_start_matches(' ');
        let leading = safe.len() - rest.len();
        format!("{}{}", "\u{a0}".repeat(leading), rest)
    };
    format!(r#"<p style="{CODE_LINE_STYLE}">{body}</p>"#)
}

/// `&amp;` goes last so `&amp;lt;` decodes to the literal text `&lt;`.
fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn encode_entities(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// ── Rule 2: Inline code ──────────────────────────────────────────────────────

static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<code>(.*?)</code>").unwrap());

fn style_inline_code(html: &str) -> String {
    RE_INLINE_CODE
        .replace_all(html, |caps: &Captures<'_>| {
            format!("{INLINE_CODE_OPEN}{}</span>", &caps[1])
        })
        .into_owned()
}

// ── Rule 3: Table sections ───────────────────────────────────────────────────

static RE_TABLE_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?t(?:head|body)>").unwrap());

fn strip_table_sections(html: &str) -> String {
    RE_TABLE_SECTION.replace_all(html, "").into_owned()
}

// ── Rules 4–6: Data tables ───────────────────────────────────────────────────
//
// Column alignment arrives as `style="text-align: X"` on the cell and is
// folded into the inline style.

static RE_TH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<th(?: style="text-align: (left|center|right)")?>"#).unwrap()
});
static RE_TD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<td(?: style="text-align: (left|center|right)")?>"#).unwrap()
});

fn cell_open(base: &str, caps: &Captures<'_>) -> String {
    match caps.get(1) {
        Some(align) => format!(r#"<td style="{base};text-align:{}">"#, align.as_str()),
        None => format!(r#"<td style="{base}">"#),
    }
}

fn style_header_cells(html: &str) -> String {
    RE_TH
        .replace_all(html, |caps: &Captures<'_>| cell_open(HEADER_CELL_STYLE, caps))
        .replace("</th>", "</td>")
}

fn style_data_tables(html: &str) -> String {
    html.replace("<table>", DATA_TABLE_OPEN)
}

fn style_data_cells(html: &str) -> String {
    RE_TD
        .replace_all(html, |caps: &Captures<'_>| cell_open(CELL_STYLE, caps))
        .into_owned()
}

// ── Rule 7: Spacer after tables ──────────────────────────────────────────────

static RE_TABLE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"</table>\s*").unwrap());

fn add_table_spacers(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;

    for m in RE_TABLE_END.find_iter(html) {
        out.push_str(&html[last..m.start()]);
        out.push_str("</table>");
        if !html[m.end()..].starts_with("<p><br>") {
            out.push_str(TABLE_SPACER);
        }
        last = m.end();
    }
    out.push_str(&html[last..]);
    out
}

// ── Rules 8–9: Lists ─────────────────────────────────────────────────────────

static RE_LIST_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(ul|ol)((?:\s[^>]*)?)>").unwrap());

fn style_list_items(html: &str) -> String {
    html.replace("<li>", LIST_ITEM_OPEN)
}

fn style_lists(html: &str) -> String {
    RE_LIST_OPEN
        .replace_all(html, |caps: &Captures<'_>| {
            format!("<{} {LIST_STYLE}{}>", &caps[1], &caps[2])
        })
        .into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn code_paragraphs(html: &str) -> usize {
        html.matches(&format!(r#"<p style="{CODE_LINE_STYLE}">"#)).count()
    }

    #[test]
    fn test_code_block_one_paragraph_per_line() {
        let html = "<pre><code class=\"language-rust\">fn main() {\n    run();\n}\n</code></pre>\n";
        let out = style_code_blocks(html);
        assert!(out.starts_with(CODE_TABLE_OPEN));
        assert_eq!(code_paragraphs(&out), 3);
        assert!(!out.contains("<code"));
        assert!(!out.contains("<pre>"));
    }

    #[test]
    fn test_code_block_leading_spaces_become_nbsp() {
        let out = code_line("    run();");
        assert!(out.contains(">\u{a0}\u{a0}\u{a0}\u{a0}run();</p>"));
    }

    #[test]
    fn test_code_block_empty_line_gets_nbsp() {
        let out = style_code_blocks("<pre><code>a\n\nb\n</code></pre>");
        assert_eq!(code_paragraphs(&out), 3);
        assert!(out.contains(">\u{a0}</p>"));
    }

    #[test]
    fn test_code_block_entities_round_trip() {
        let out = style_code_blocks("<pre><code>if a &lt; b &amp;&amp; c &gt; &quot;d&quot;\n</code></pre>");
        assert!(out.contains(">if a &lt; b &amp;&amp; c &gt; \"d\"</p>"), "got: {out}");
    }

    #[test]
    fn test_decode_amp_last() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("&#39;x&#39;"), "'x'");
    }

    #[test]
    fn test_inline_code_becomes_span() {
        let out = style_inline_code("<p>run <code>cargo</code> now</p>");
        assert_eq!(out, format!("<p>run {INLINE_CODE_OPEN}cargo</span> now</p>"));
    }

    #[test]
    fn test_header_cells_become_bold_td() {
        let out = style_header_cells("<tr><th>A</th><th style=\"text-align: center\">B</th></tr>");
        assert_eq!(
            out,
            format!(
                r#"<tr><td style="{HEADER_CELL_STYLE}">A</td><td style="{HEADER_CELL_STYLE};text-align:center">B</td></tr>"#
            )
        );
    }

    #[test]
    fn test_data_cells_keep_alignment() {
        let out = style_data_cells("<td style=\"text-align: right\">1</td><td>2</td>");
        assert!(out.contains(&format!(r#"<td style="{CELL_STYLE};text-align:right">1</td>"#)));
        assert!(out.contains(&format!(r#"<td style="{CELL_STYLE}">2</td>"#)));
    }

    #[test]
    fn test_code_table_cell_untouched_by_data_rules() {
        let code = style_code_blocks("<pre><code>x\n</code></pre>");
        assert_eq!(style_data_cells(&style_data_tables(&code)), code);
    }

    #[test]
    fn test_spacer_after_every_table() {
        let out = add_table_spacers("<table></table>\n<table></table>\n<p>x</p>");
        assert_eq!(
            out,
            "<table></table><p><br></p><table></table><p><br></p><p>x</p>"
        );
    }

    #[test]
    fn test_spacer_not_duplicated() {
        let input = "<table></table>\n<p><br></p>";
        assert_eq!(add_table_spacers(input), "<table></table><p><br></p>");
        assert_eq!(add_table_spacers(&add_table_spacers(input)), "<table></table><p><br></p>");
    }

    #[test]
    fn test_spacer_at_end_of_document() {
        assert_eq!(add_table_spacers("<table></table>"), "<table></table><p><br></p>");
    }

    #[test]
    fn test_lists_keep_attributes() {
        let out = style_lists("<ol start=\"3\">\n<li>x</li></ol><ul>\n");
        assert!(out.contains(r#"<ol style="margin-top:8pt" start="3">"#));
        assert!(out.contains(r#"<ul style="margin-top:8pt">"#));
    }

    #[test]
    fn test_list_items() {
        assert_eq!(style_list_items("<li>x</li>"), format!("{LIST_ITEM_OPEN}x</li>"));
    }

    #[test]
    fn test_style_html_full_table() {
        let html = "<table><thead><tr><th>A</th></tr></thead><tbody>\n<tr><td>1</td></tr>\n</tbody></table>\n<p>after</p>\n";
        let out = style_html(html);
        assert!(!out.contains("<thead>") && !out.contains("<tbody>") && !out.contains("<th"));
        assert!(out.starts_with(DATA_TABLE_OPEN));
        assert!(out.contains("</table><p><br></p><p>after</p>"));
    }

    #[test]
    fn test_style_html_plain_paragraph_unchanged() {
        let html = "<h1>Title</h1>\n<p>some text</p>\n";
        assert_eq!(style_html(html), html);
    }
}
