//! Markdown normalisation ahead of rendering.
//!
//! Authors write GFM loosely: a table glued to the paragraph above it, a
//! bullet list that starts on the line after a sentence, nested items indented
//! by two spaces. This pass rewrites those constructs into a form every
//! CommonMark renderer reads the same way:
//!
//! 1. A blank line before the first row of a table.
//! 2. A blank line before the first item of a list (not after a heading).
//! 3. Nested list items re-indented in multiples of four spaces, based on the
//!    smallest indentation found in the document. Depth is measured from the
//!    first item of each list, so a list indented as a whole (no parent item)
//!    starts at the margin instead of turning into an indented code block.
//!
//! Fenced code blocks are copied through untouched. The pass is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_INDENT_UNIT: usize = 4;
const NESTED_INDENT: &str = "    ";

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)([-*]|[0-9]+\.)\s+(.*)$").unwrap());

static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|.+\|$").unwrap());

/// Apply all normalisation rules. See the module docs for the list.
pub fn normalize_markdown(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let fenced = fenced_lines(&lines);
    let unit = indent_unit(&lines, &fenced);

    let mut result: Vec<String> = Vec::with_capacity(lines.len() + 8);
    // Indentation of the first item of the list being copied, if any.
    let mut list_base: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        if fenced[i] {
            if !line.starts_with(char::is_whitespace) {
                list_base = None;
            }
            result.push((*line).to_string());
            continue;
        }

        let prev = if i > 0 { lines[i - 1] } else { "" };
        let prev_trimmed = prev.trim();

        if i > 0 && is_table_row(line) && !prev_trimmed.is_empty() && !is_table_row(prev) {
            result.push(String::new());
        }

        if i > 0
            && is_list_item(line)
            && !prev_trimmed.is_empty()
            && !is_list_item(prev)
            && !prev_trimmed.starts_with('#')
        {
            result.push(String::new());
        }

        if let Some(width) = list_item_indent(line) {
            let base = *list_base.get_or_insert(width);
            result.push(reindent_list_item(line, width.saturating_sub(base), unit));
        } else {
            if !line.trim().is_empty() && !line.starts_with(char::is_whitespace) {
                list_base = None;
            }
            result.push((*line).to_string());
        }
    }

    result.join("\n")
}

fn is_list_item(line: &str) -> bool {
    RE_LIST_ITEM.is_match(line)
}

fn list_item_indent(line: &str) -> Option<usize> {
    RE_LIST_ITEM
        .captures(line)
        .map(|caps| caps[1].chars().count())
}

fn is_table_row(line: &str) -> bool {
    RE_TABLE_ROW.is_match(line.trim())
}

// ── Fences ───────────────────────────────────────────────────────────────────

/// Mark every line that belongs to a fenced code block, fence lines included.
/// A fence closes on a run of the same character at least as long as the
/// opener; an unterminated fence runs to the end of the document.
fn fenced_lines(lines: &[&str]) -> Vec<bool> {
    let mut marks = Vec::with_capacity(lines.len());
    let mut open: Option<(char, usize)> = None;

    for line in lines {
        let trimmed = line.trim_start();
        let run = fence_run(trimmed);
        match open {
            Some((ch, len)) => {
                marks.push(true);
                if let Some((c, n)) = run {
                    if c == ch && n >= len && trimmed[n..].trim().is_empty() {
                        open = None;
                    }
                }
            }
            None => {
                marks.push(run.is_some());
                open = run;
            }
        }
    }

    marks
}

/// Fence character and run length when `trimmed` starts with three or more
/// backticks or tildes.
fn fence_run(trimmed: &str) -> Option<(char, usize)> {
    let ch = trimmed.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = trimmed.chars().take_while(|&c| c == ch).count();
    (len >= 3).then_some((ch, len))
}

// ── List indentation ─────────────────────────────────────────────────────────

/// Smallest nonzero list-item indentation outside fences, or 4 when no list
/// item is indented.
fn indent_unit(lines: &[&str], fenced: &[bool]) -> usize {
    lines
        .iter()
        .zip(fenced)
        .filter(|(_, &in_fence)| !in_fence)
        .filter_map(|(line, _)| RE_LIST_ITEM.captures(line))
        .map(|caps| caps[1].chars().count())
        .filter(|&width| width > 0)
        .min()
        .unwrap_or(DEFAULT_INDENT_UNIT)
}

/// Re-emit a list item `depth` columns deeper than the first item of its
/// list. Items already at the margin are left as written.
fn reindent_list_item(line: &str, depth: usize, unit: usize) -> String {
    let Some(caps) = RE_LIST_ITEM.captures(line) else {
        return line.to_string();
    };

    if caps[1].is_empty() {
        return line.to_string();
    }

    let level = depth / unit;
    format!("{}{} {}", NESTED_INDENT.repeat(level), &caps[2], &caps[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_before_list() {
        let input = "Shopping:\n- eggs\n- milk";
        assert_eq!(normalize_markdown(input), "Shopping:\n\n- eggs\n- milk");
    }

    #[test]
    fn exactly_one_blank_line_per_list() {
        let input = "Steps:\n1. one\n2. two\nThen:\n* a";
        let out = normalize_markdown(input);
        assert_eq!(out, "Steps:\n\n1. one\n2. two\nThen:\n\n* a");
    }

    #[test]
    fn no_blank_line_after_heading() {
        let input = "## Items\n- a\n- b";
        assert_eq!(normalize_markdown(input), input);
    }

    #[test]
    fn existing_blank_line_kept_single() {
        let input = "Intro\n\n- a";
        assert_eq!(normalize_markdown(input), input);
    }

    #[test]
    fn blank_line_before_table() {
        let input = "Results:\n| a | b |\n|---|---|\n| 1 | 2 |";
        assert_eq!(
            normalize_markdown(input),
            "Results:\n\n| a | b |\n|---|---|\n| 1 | 2 |"
        );
    }

    #[test]
    fn two_space_nesting_becomes_four() {
        let input = "- a\n  - b\n    - c\n- d";
        assert_eq!(normalize_markdown(input), "- a\n    - b\n        - c\n- d");
    }

    #[test]
    fn four_space_nesting_unchanged() {
        let input = "- a\n    - b\n        - c";
        assert_eq!(normalize_markdown(input), input);
    }

    #[test]
    fn marker_spacing_collapsed_on_nested_items() {
        assert_eq!(normalize_markdown("- a\n    -   b"), "- a\n    - b");
    }

    #[test]
    fn idempotent() {
        let input = "Intro\n- a\n  - b\n   - c\nText\n| x | y |\n|---|---|\n\n1. one\n  2. two";
        let once = normalize_markdown(input);
        assert_eq!(normalize_markdown(&once), once);
    }

    #[test]
    fn fenced_code_untouched() {
        let input = "Example:\n```\nlet xs = vec![\n  - 1,\n];\n| not | a table |\n```\nafter";
        assert_eq!(normalize_markdown(input), input);
    }

    #[test]
    fn fenced_lines_ignored_for_unit() {
        // The two-space "item" inside the fence must not shrink the unit.
        let input = "~~~\n  - x\n~~~\n- a\n    - b";
        let out = normalize_markdown(input);
        assert!(out.ends_with("- a\n    - b"), "got: {out}");
        assert!(out.starts_with("~~~\n  - x\n~~~"));
    }

    #[test]
    fn indented_list_without_parent_starts_at_margin() {
        let input = "Intro:\n  - a\n  - b";
        let out = normalize_markdown(input);
        assert_eq!(out, "Intro:\n\n- a\n- b");
        assert_eq!(normalize_markdown(&out), out);
    }

    #[test]
    fn indented_list_keeps_relative_nesting() {
        let input = "Intro:\n  - a\n    - b\n  - c";
        assert_eq!(normalize_markdown(input), "Intro:\n\n- a\n    - b\n- c");
    }

    #[test]
    fn paragraph_ends_list_base() {
        // The second list starts at the margin, so its nested item keeps depth 1.
        let input = "Intro:\n  - a\n\nMore\n- b\n  - c";
        assert_eq!(
            normalize_markdown(input),
            "Intro:\n\n- a\n\nMore\n\n- b\n    - c"
        );
    }

    #[test]
    fn longer_closing_fence_closes_block() {
        let marks = fenced_lines(&["```", "code", "`````", "- after"]);
        assert_eq!(marks, vec![true, true, true, false]);

        let input = "```\ncode\n````\nText\n- item";
        assert_eq!(normalize_markdown(input), "```\ncode\n````\nText\n\n- item");
    }

    #[test]
    fn shorter_or_different_fence_does_not_close() {
        let marks = fenced_lines(&["````", "```", "~~~~", "````", "x"]);
        assert_eq!(marks, vec![true, true, true, true, false]);
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let marks = fenced_lines(&["a", "```", "- x", "b"]);
        assert_eq!(marks, vec![false, true, true, true]);
    }

    #[test]
    fn default_unit_without_nesting() {
        let lines = ["- a", "- b"];
        assert_eq!(indent_unit(&lines, &[false, false]), DEFAULT_INDENT_UNIT);
    }

    #[test]
    fn plain_text_passes_through() {
        let input = "# Title\n\nsome text\n";
        assert_eq!(normalize_markdown(input), input);
    }
}
