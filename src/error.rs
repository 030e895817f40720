//! Error types for the md2docs library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2DocsError`] — **Fatal**: the conversion cannot proceed at all
//!   (missing input file, no OAuth client secret provisioned, upload
//!   rejected). Returned as `Err(Md2DocsError)` from the top-level
//!   `convert*` functions.
//!
//! * [`DiagramError`] — **Non-fatal**: a single Mermaid block could not be
//!   rendered. The block stays in the document as an ordinary code block and
//!   the error is reported through [`crate::output::ConversionStats`] and the
//!   progress callback, never propagated.

use md2docs_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2docs library.
#[derive(Debug, Error)]
pub enum Md2DocsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is not valid UTF-8 text.
    #[error("'{path}' is not valid UTF-8 Markdown: {detail}")]
    InvalidEncoding { path: PathBuf, detail: String },

    // ── Auth errors ───────────────────────────────────────────────────────
    /// Credentials could not be obtained (includes the missing client secret
    /// case, whose message carries setup instructions).
    #[error(transparent)]
    Auth(#[from] AuthError),

    // ── Upload errors ─────────────────────────────────────────────────────
    /// Drive answered an upload request with a non-success status.
    #[error("Google Drive upload failed (HTTP {status}): {body}")]
    UploadFailed { status: u16, body: String },

    /// Transport-level failure talking to Drive.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, write or read a scratch/output file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2DocsError {
    /// `true` when the failure is the missing-client-secret case.
    pub fn is_missing_credentials(&self) -> bool {
        matches!(self, Md2DocsError::Auth(AuthError::ClientSecretNotFound { .. }))
    }
}

/// A non-fatal error for a single Mermaid block.
///
/// `index` is the 0-based ordinal of the block in the source document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DiagramError {
    /// Neither `mmdc` nor `npx` could be found on `PATH`.
    #[error("Diagram {index}: no Mermaid renderer available (install @mermaid-js/mermaid-cli)")]
    RendererUnavailable { index: usize },

    /// The renderer exited with a failure status.
    #[error("Diagram {index}: {tool} failed: {detail}")]
    RenderFailed {
        index: usize,
        tool: String,
        detail: String,
    },

    /// The renderer did not finish in time and was killed.
    #[error("Diagram {index}: {tool} timed out after {secs}s")]
    Timeout {
        index: usize,
        tool: String,
        secs: u64,
    },

    /// The renderer reported success but produced no image.
    #[error("Diagram {index}: renderer produced no output image")]
    EmptyOutput { index: usize },

    /// Scratch file I/O failed.
    #[error("Diagram {index}: I/O error: {detail}")]
    Io { index: usize, detail: String },
}

impl DiagramError {
    /// 0-based ordinal of the failing block.
    pub fn index(&self) -> usize {
        match self {
            DiagramError::RendererUnavailable { index }
            | DiagramError::RenderFailed { index, .. }
            | DiagramError::Timeout { index, .. }
            | DiagramError::EmptyOutput { index }
            | DiagramError::Io { index, .. } => *index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = Md2DocsError::FileNotFound {
            path: PathBuf::from("notes/plan.md"),
        };
        assert!(e.to_string().contains("notes/plan.md"));
    }

    #[test]
    fn missing_client_secret_is_transparent() {
        let e = Md2DocsError::from(AuthError::ClientSecretNotFound {
            searched: "~/.md2docs/client_secret.json".into(),
        });
        assert!(e.is_missing_credentials());
        let msg = e.to_string();
        assert!(msg.contains("Setup instructions"), "got: {msg}");
    }

    #[test]
    fn upload_failed_display() {
        let e = Md2DocsError::UploadFailed {
            status: 403,
            body: "insufficientPermissions".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("insufficientPermissions"));
    }

    #[test]
    fn diagram_timeout_display() {
        let e = DiagramError::Timeout {
            index: 2,
            tool: "mmdc".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("Diagram 2"));
        assert_eq!(e.index(), 2);
    }

    #[test]
    fn diagram_error_index_for_every_variant() {
        let errors = [
            DiagramError::RendererUnavailable { index: 0 },
            DiagramError::RenderFailed {
                index: 1,
                tool: "npx".into(),
                detail: "exit 1".into(),
            },
            DiagramError::EmptyOutput { index: 3 },
            DiagramError::Io {
                index: 4,
                detail: "disk full".into(),
            },
        ];
        let indices: Vec<usize> = errors.iter().map(DiagramError::index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
    }
}
