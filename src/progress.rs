//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages: authentication, HTML
//! rendering (with one event per Mermaid block), and upload.
//!
//! # Example
//!
//! ```rust
//! use md2docs::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_stage(&self, stage: Stage) {
//!         eprintln!("{stage}...");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stage announced through [`ConversionProgressCallback::on_stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Loading or obtaining OAuth credentials.
    Authenticating,
    /// Markdown → styled HTML (diagrams included).
    Rendering,
    /// Uploading the HTML to Drive under the given title.
    Uploading { title: String },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Authenticating => write!(f, "Authenticating with Google"),
            Stage::Rendering => write!(f, "Converting markdown to HTML"),
            Stage::Uploading { title } => write!(f, "Creating Google Doc: {title}"),
        }
    }
}

/// Called by the conversion pipeline as it progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when a pipeline stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when the interactive OAuth flow needs the user's consent.
    ///
    /// The call blocks the pipeline until the browser redirect arrives, so
    /// implementations should open or print `url` and return promptly.
    fn on_authorization_required(&self, url: &str) {
        let _ = url;
    }

    /// Called when a Mermaid block has been rendered to PNG.
    ///
    /// # Arguments
    /// * `index`   — 0-based ordinal of the block in the document
    /// * `png_len` — size of the rendered image in bytes
    fn on_diagram_rendered(&self, index: usize, png_len: usize) {
        let _ = (index, png_len);
    }

    /// Called when a Mermaid block falls back to a plain code block.
    fn on_diagram_failed(&self, index: usize, error: &str) {
        let _ = (index, error);
    }

    /// Called once the Google Doc exists.
    fn on_upload_complete(&self, url: &str) {
        let _ = url;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
