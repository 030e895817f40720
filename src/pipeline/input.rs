//! Input loading: read the Markdown file and derive a document title.
//!
//! Line endings are normalised to `\n` here so every later stage can split
//! on a single character.

use crate::error::Md2DocsError;
use std::path::Path;
use tracing::debug;

/// Read a Markdown file as UTF-8 text.
///
/// A missing file, a permission failure and non-UTF-8 content are all fatal.
pub async fn load_markdown(path: &Path) -> Result<String, Md2DocsError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Md2DocsError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Md2DocsError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(Md2DocsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let text = String::from_utf8(bytes).map_err(|e| Md2DocsError::InvalidEncoding {
        path: path.to_path_buf(),
        detail: e.utf8_error().to_string(),
    })?;

    debug!("Loaded {} bytes from {}", text.len(), path.display());
    Ok(normalise_line_endings(&text))
}

/// Derive a title from the file name: `q3-launch_plan.md` → `Q3 Launch Plan`.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let spaced = stem.replace(['-', '_'], " ");

    let title = spaced
        .split_whitespace()
        .map(capitalise)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
