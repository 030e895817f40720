//! The HTML shell around the styled body.

/// Wrap a styled body in a complete UTF-8 HTML document.
///
/// Only link colour is set in the `<style>` block; everything else the
/// importer honours is inline.
pub fn wrap_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>a {{ color: #0366d6; }}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_text(title),
        body.trim_end()
    )
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
