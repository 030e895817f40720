//! Pipeline stages for Markdown-to-Google-Doc conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ diagram ──▶ normalize ──▶ markdown ──▶ style ──▶ diagram ──▶ document ──▶ upload
//! (file)    (mmdc)      (GFM fixes)   (cmark)      (inline)  (inject)    (shell)      (Drive)
//!                                                                                       ▲
//!                                                                           auth ───────┘
//! ```
//!
//! 1. [`input`]     — read the Markdown file, derive a title
//! 2. [`auth`]      — obtain an access token; blocking, so `spawn_blocking`
//! 3. [`diagram`]   — Mermaid blocks → PNG + placeholders; later, placeholders
//!    → `<img>` tags built by [`encode`]
//! 4. [`normalize`] — blank lines and list indentation the renderer expects
//! 5. [`markdown`]  — pulldown-cmark rendering
//! 6. [`style`]     — inline styles for the Google Docs importer
//! 7. [`document`]  — `<!DOCTYPE html>` shell
//! 8. [`upload`]    — Drive resumable upload; the only stage with Drive I/O

pub mod auth;
pub mod diagram;
pub mod document;
pub mod encode;
pub mod input;
pub mod markdown;
pub mod normalize;
pub mod style;
pub mod upload;
