//! # md2docs
//!
//! Convert Markdown files into formatted Google Docs.
//!
//! ## Why this crate?
//!
//! Google Drive can convert an uploaded HTML file into a native Google Doc,
//! but its importer ignores stylesheets, flattens `<pre>` blocks, repeats
//! table headers across pages and cannot fetch images. This crate renders
//! Markdown to HTML that the importer reproduces faithfully: every style is
//! inline, code blocks become shaded one-cell tables, and Mermaid diagrams
//! are rendered to PNG and embedded as `data:` URIs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown file
//!  │
//!  ├─ 1. Input      read UTF-8 text, derive a title from the file name
//!  ├─ 2. Auth       cached / refreshed / interactive OAuth (spawn_blocking)
//!  ├─ 3. Diagrams   ```mermaid → PNG via mmdc or npx, placeholder left behind
//!  ├─ 4. Normalize  blank lines before lists/tables, 4-space nesting
//!  ├─ 5. Render     pulldown-cmark (tables, task lists, footnotes)
//!  ├─ 6. Style      9 inline-style rules for the Docs importer
//!  ├─ 7. Inject     placeholders → <img src="data:image/png;base64,…">
//!  ├─ 8. Shell      <!DOCTYPE html> wrapper with the escaped title
//!  └─ 9. Upload     Drive v3 resumable upload as a Google Doc
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2docs::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Client secret from ~/.md2docs/client_secret.json or MD2DOCS_CLIENT_SECRET
//!     let config = ConversionConfig::default();
//!     let output = convert("notes.md", &config).await?;
//!     println!("{}", output.document.url);
//!     Ok(())
//! }
//! ```
//!
//! Rendering alone needs no credentials:
//!
//! ```rust,no_run
//! use md2docs::{render_document, ConversionConfig, MermaidCli};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ConversionConfig::default();
//! let renderer = MermaidCli::from_config(&config);
//! let doc = render_document("# Hello\n\nworld", "Hello", &config, &renderer).await;
//! println!("{}", doc.html);
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2docs` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! md2docs = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod launch;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_DRIVE_API_BASE};
pub use convert::{convert, convert_sync, convert_with_renderer, render_document, render_file};
pub use error::{DiagramError, Md2DocsError};
pub use launch::open_in_browser;
pub use md2docs_auth::{AuthConfig, AuthError};
pub use output::{ConversionOutput, ConversionStats, RenderedDocument, UploadedDocument};
pub use pipeline::diagram::{DiagramRenderer, MermaidCli};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
