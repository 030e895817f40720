//! Result types returned by the conversion entry points.

use crate::error::DiagramError;
use serde::{Deserialize, Serialize};

/// Styled HTML ready for upload, plus what happened to each diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Document title (also the `<title>` of the HTML shell).
    pub title: String,
    /// Complete HTML document, shell included.
    pub html: String,
    /// Number of ```` ```mermaid ```` blocks found in the source.
    pub diagrams_found: usize,
    /// Blocks embedded as PNG images.
    pub diagrams_rendered: usize,
    /// Blocks that fell back to plain code, with the reason.
    pub diagram_errors: Vec<DiagramError>,
}

/// The Google Doc created by an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Drive file id.
    pub id: String,
    /// Shareable view link.
    pub url: String,
}

/// Timing and size figures for a full conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub markdown_bytes: usize,
    pub html_bytes: usize,
    pub diagrams_found: usize,
    pub diagrams_rendered: usize,
    pub diagrams_failed: usize,
    pub auth_duration_ms: u64,
    pub render_duration_ms: u64,
    pub upload_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything [`crate::convert::convert`] produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub document: UploadedDocument,
    pub title: String,
    /// The HTML document that was uploaded.
    pub html: String,
    pub stats: ConversionStats,
}
