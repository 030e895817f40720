//! Conversion entry points.
//!
//! [`render_document`] is the pure half of the pipeline (Markdown in, styled
//! HTML out, no network) and is what tests and `--html-only` use.
//! [`convert`] runs the whole thing: read the file, authenticate, render,
//! upload.

use crate::config::ConversionConfig;
use crate::error::Md2DocsError;
use crate::output::{ConversionOutput, ConversionStats, RenderedDocument};
use crate::pipeline::diagram::{self, DiagramExtraction, DiagramRenderer, MermaidCli};
use crate::pipeline::{auth, document, input, markdown, normalize, style, upload};
use crate::progress::Stage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Turn Markdown into a complete, styled HTML document.
///
/// Stages, in order: diagram extraction, normalisation, Markdown rendering,
/// inline styling, diagram injection, HTML shell. Diagram failures are soft:
/// the block stays as code and the reason lands in
/// [`RenderedDocument::diagram_errors`].
pub async fn render_document(
    markdown_text: &str,
    title: &str,
    config: &ConversionConfig,
    renderer: &dyn DiagramRenderer,
) -> RenderedDocument {
    let extraction = if config.render_diagrams {
        diagram::extract_diagrams(markdown_text, renderer, config.progress_callback.as_ref()).await
    } else {
        DiagramExtraction {
            markdown: markdown_text.to_string(),
            ..Default::default()
        }
    };

    let normalized = normalize::normalize_markdown(&extraction.markdown);
    let body = markdown::markdown_to_html(&normalized);
    let body = style::style_html(&body);
    let body = diagram::inject_diagrams(&body, &extraction.images);
    let html = document::wrap_document(title, &body);

    debug!(
        "Rendered '{}': {} diagram(s) found, {} embedded, {} bytes of HTML",
        title,
        extraction.found,
        extraction.images.len(),
        html.len()
    );

    RenderedDocument {
        title: title.to_string(),
        html,
        diagrams_found: extraction.found,
        diagrams_rendered: extraction.images.len(),
        diagram_errors: extraction.errors,
    }
}

/// Read a Markdown file and render it with the Mermaid CLI, without
/// authenticating or uploading.
pub async fn render_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<RenderedDocument, Md2DocsError> {
    let path = path.as_ref();
    let text = input::load_markdown(path).await?;
    let title = resolve_title(path, config);
    let renderer = MermaidCli::from_config(config);
    Ok(render_document(&text, &title, config, &renderer).await)
}

/// Convert a Markdown file to a Google Doc.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(Md2DocsError)` only for fatal errors:
/// - File not found / unreadable / not UTF-8
/// - No OAuth client secret, or the authorization failed
/// - Drive rejected the upload
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocsError> {
    let renderer = MermaidCli::from_config(config);
    convert_with_renderer(path, config, &renderer).await
}

/// [`convert`] with a caller-supplied diagram renderer.
pub async fn convert_with_renderer(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
    renderer: &dyn DiagramRenderer,
) -> Result<ConversionOutput, Md2DocsError> {
    let total_start = Instant::now();
    let path = path.as_ref();
    info!("Starting conversion: {}", path.display());

    // ── Step 1: Read input ───────────────────────────────────────────────
    let text = input::load_markdown(path).await?;
    let title = resolve_title(path, config);

    // ── Step 2: Credentials ──────────────────────────────────────────────
    notify_stage(config, Stage::Authenticating);
    let auth_start = Instant::now();
    let token = auth::obtain_credentials(config).await?;
    let auth_duration_ms = auth_start.elapsed().as_millis() as u64;

    // ── Step 3: Markdown → styled HTML ───────────────────────────────────
    notify_stage(config, Stage::Rendering);
    let render_start = Instant::now();
    let rendered = render_document(&text, &title, config, renderer).await;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered HTML in {}ms", render_duration_ms);

    // ── Step 4: Upload ───────────────────────────────────────────────────
    notify_stage(
        config,
        Stage::Uploading {
            title: title.clone(),
        },
    );
    let upload_start = Instant::now();
    let document =
        upload::upload_document(&title, &rendered.html, token.access_token(), config).await?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_complete(&document.url);
    }

    let stats = ConversionStats {
        markdown_bytes: text.len(),
        html_bytes: rendered.html.len(),
        diagrams_found: rendered.diagrams_found,
        diagrams_rendered: rendered.diagrams_rendered,
        diagrams_failed: rendered.diagram_errors.len(),
        auth_duration_ms,
        render_duration_ms,
        upload_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} in {}ms",
        document.url, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        document,
        title,
        html: rendered.html,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2DocsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_title(path: &Path, config: &ConversionConfig) -> String {
    config
        .title
        .clone()
        .unwrap_or_else(|| input::title_from_path(path))
}

fn notify_stage(config: &ConversionConfig, stage: Stage) {
    info!("{stage}");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}
