//! Mermaid diagrams: render ```` ```mermaid ```` blocks to PNG and swap them
//! for placeholders that survive Markdown rendering.
//!
//! ## Flow
//!
//! ```text
//! ```mermaid … ```  ──render──▶  \n\nMERMAID_IMAGE_<i>\n\n   (before Markdown)
//! <p>MERMAID_IMAGE_<i></p> ──inject──▶ <img src="data:image/png;base64,…">   (after styling)
//! ```
//!
//! Rendering shells out to the Mermaid CLI. A block whose render fails for
//! any reason (tool missing, non-zero exit, timeout, no image) is kept as an
//! ordinary fenced code block; the other blocks are unaffected.

use crate::config::ConversionConfig;
use crate::error::DiagramError;
use crate::pipeline::encode::image_tag;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const PLACEHOLDER_PREFIX: &str = "MERMAID_IMAGE_";

static RE_MERMAID_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid\s*\n(.*?)```").unwrap());

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p>MERMAID_IMAGE_([0-9]+)</p>|MERMAID_IMAGE_([0-9]+)").unwrap());

/// A rendered diagram: source ordinal and PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramImage {
    pub index: usize,
    pub png: Vec<u8>,
}

/// Result of [`extract_diagrams`].
#[derive(Debug, Clone, Default)]
pub struct DiagramExtraction {
    /// Markdown with rendered blocks replaced by placeholders.
    pub markdown: String,
    /// Rendered images, in source order.
    pub images: Vec<DiagramImage>,
    /// Blocks left as code, with the reason.
    pub errors: Vec<DiagramError>,
    /// Total Mermaid blocks found.
    pub found: usize,
}

/// Placeholder token for the diagram at `index`.
pub fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}")
}

/// Something that turns Mermaid source into PNG bytes.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// `false` when no rendering backend exists at all; extraction is then
    /// skipped and the document passes through unchanged.
    fn is_available(&self) -> bool {
        true
    }

    /// Render one diagram. `index` is its 0-based ordinal in the document.
    async fn render(&self, source: &str, index: usize) -> Result<Vec<u8>, DiagramError>;
}

/// Renders diagrams with `mmdc`, falling back to `npx @mermaid-js/mermaid-cli`.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    mmdc: Option<PathBuf>,
    npx: Option<PathBuf>,
    background: String,
    scale: u32,
    mmdc_timeout: Duration,
    npx_timeout: Duration,
}

impl MermaidCli {
    /// Use explicit tool paths (`None` = not installed) with default options.
    pub fn new(mmdc: Option<PathBuf>, npx: Option<PathBuf>) -> Self {
        Self {
            mmdc,
            npx,
            background: "white".to_string(),
            scale: 2,
            mmdc_timeout: Duration::from_secs(30),
            npx_timeout: Duration::from_secs(60),
        }
    }

    /// Resolve `mmdc` and `npx` from `PATH` and apply the config's options.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let mmdc = which::which("mmdc").ok();
        let npx = which::which("npx").ok();
        debug!("Mermaid tools: mmdc={:?} npx={:?}", mmdc, npx);

        Self::new(mmdc, npx)
            .background(config.diagram_background.clone())
            .scale(config.diagram_scale)
            .timeouts(
                Duration::from_secs(config.mmdc_timeout_secs),
                Duration::from_secs(config.npx_timeout_secs),
            )
    }

    pub fn background(mut self, colour: impl Into<String>) -> Self {
        self.background = colour.into();
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn timeouts(mut self, mmdc: Duration, npx: Duration) -> Self {
        self.mmdc_timeout = mmdc;
        self.npx_timeout = npx;
        self
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            output.as_os_str().to_owned(),
            "-b".into(),
            self.background.clone().into(),
            "-s".into(),
            self.scale.to_string().into(),
        ]
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCli {
    fn is_available(&self) -> bool {
        self.mmdc.is_some() || self.npx.is_some()
    }

    async fn render(&self, source: &str, index: usize) -> Result<Vec<u8>, DiagramError> {
        let io_err = move |e: std::io::Error| DiagramError::Io {
            index,
            detail: e.to_string(),
        };

        // Dropping the TempDir removes both scratch files on every path.
        let scratch = tempfile::Builder::new()
            .prefix("md2docs-mermaid-")
            .tempdir()
            .map_err(io_err)?;
        let input = scratch.path().join(format!("diagram_{index}.mmd"));
        let output = scratch.path().join(format!("diagram_{index}.png"));
        tokio::fs::write(&input, source).await.map_err(io_err)?;

        let args = self.render_args(&input, &output);
        let mut last_err = DiagramError::RendererUnavailable { index };

        if let Some(mmdc) = &self.mmdc {
            match run_tool(index, "mmdc", mmdc, &[], &args, self.mmdc_timeout).await {
                Ok(()) => return read_png(index, &output).await,
                Err(e) => {
                    debug!("{e}");
                    last_err = e;
                }
            }
        }

        if let Some(npx) = &self.npx {
            let prefix = ["--yes", "@mermaid-js/mermaid-cli"];
            match run_tool(index, "npx", npx, &prefix, &args, self.npx_timeout).await {
                Ok(()) => return read_png(index, &output).await,
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }
}

/// Run one renderer invocation under a timeout. The child is killed if the
/// timeout elapses.
async fn run_tool(
    index: usize,
    tool: &str,
    program: &Path,
    prefix: &[&str],
    args: &[OsString],
    timeout: Duration,
) -> Result<(), DiagramError> {
    let mut cmd = Command::new(program);
    cmd.args(prefix)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Diagram {index}: running {}", program.display());
    let child = cmd.spawn().map_err(|e| DiagramError::RenderFailed {
        index,
        tool: tool.to_string(),
        detail: format!("could not start: {e}"),
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => Err(DiagramError::Timeout {
            index,
            tool: tool.to_string(),
            secs: timeout.as_secs(),
        }),
        Ok(Err(e)) => Err(DiagramError::RenderFailed {
            index,
            tool: tool.to_string(),
            detail: e.to_string(),
        }),
        Ok(Ok(out)) if out.status.success() => Ok(()),
        Ok(Ok(out)) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let first = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            Err(DiagramError::RenderFailed {
                index,
                tool: tool.to_string(),
                detail: format!("{} {}", out.status, first.trim()).trim_end().to_string(),
            })
        }
    }
}

async fn read_png(index: usize, path: &Path) -> Result<Vec<u8>, DiagramError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(DiagramError::EmptyOutput { index }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DiagramError::EmptyOutput { index })
        }
        Err(e) => Err(DiagramError::Io {
            index,
            detail: e.to_string(),
        }),
    }
}

/// Render every Mermaid block and replace it with a placeholder.
///
/// Blocks are rendered one at a time in source order. A failed block is
/// rewritten as a plain fenced code block (the `mermaid` tag is dropped) and
/// recorded in [`DiagramExtraction::errors`]. When the renderer is not
/// available at all the text is returned unchanged.
pub async fn extract_diagrams(
    text: &str,
    renderer: &dyn DiagramRenderer,
    progress: Option<&ProgressCallback>,
) -> DiagramExtraction {
    let blocks: Vec<(usize, usize, String)> = RE_MERMAID_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps[1].to_string()))
        })
        .collect();

    if blocks.is_empty() {
        return DiagramExtraction {
            markdown: text.to_string(),
            ..Default::default()
        };
    }

    if !renderer.is_available() {
        warn!(
            "{} Mermaid block(s) found but neither mmdc nor npx is installed; leaving them as code",
            blocks.len()
        );
        return DiagramExtraction {
            markdown: text.to_string(),
            images: Vec::new(),
            errors: (0..blocks.len())
                .map(|index| DiagramError::RendererUnavailable { index })
                .collect(),
            found: blocks.len(),
        };
    }

    let mut markdown = String::with_capacity(text.len());
    let mut images = Vec::new();
    let mut errors = Vec::new();
    let mut last = 0;

    for (index, (start, end, source)) in blocks.iter().enumerate() {
        markdown.push_str(&text[last..*start]);

        match renderer.render(source, index).await {
            Ok(png) => {
                info!("Rendered diagram {} ({} bytes)", index, png.len());
                if let Some(cb) = progress {
                    cb.on_diagram_rendered(index, png.len());
                }
                markdown.push_str("\n\n");
                markdown.push_str(&placeholder(index));
                markdown.push_str("\n\n");
                images.push(DiagramImage { index, png });
            }
            Err(e) => {
                warn!("{e}; keeping the block as code");
                if let Some(cb) = progress {
                    cb.on_diagram_failed(index, &e.to_string());
                }
                markdown.push_str(&text[*start..*end].replacen("```mermaid", "```", 1));
                errors.push(e);
            }
        }

        last = *end;
    }
    markdown.push_str(&text[last..]);

    DiagramExtraction {
        markdown,
        images,
        errors,
        found: blocks.len(),
    }
}

/// Replace diagram placeholders in rendered HTML with inline `<img>` tags.
///
/// A placeholder wrapped in its own paragraph loses the `<p>` wrapper.
/// Placeholders with no matching image are left as they are.
pub fn inject_diagrams(html: &str, images: &[DiagramImage]) -> String {
    if images.is_empty() {
        return html.to_string();
    }

    RE_PLACEHOLDER
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let image = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .and_then(|i| images.iter().find(|img| img.index == i));
            match image {
                Some(img) => image_tag(&img.png),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Returns `PNG<index>` for every block except those listed in `fail`.
    struct FakeRenderer {
        fail: HashSet<usize>,
    }

    impl FakeRenderer {
        fn ok() -> Self {
            Self {
                fail: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl DiagramRenderer for FakeRenderer {
        async fn render(&self, _source: &str, index: usize) -> Result<Vec<u8>, DiagramError> {
            if self.fail.contains(&index) {
                Err(DiagramError::RenderFailed {
                    index,
                    tool: "fake".into(),
                    detail: "boom".into(),
                })
            } else {
                Ok(format!("PNG{index}").into_bytes())
            }
        }
    }

    struct Unavailable;

    #[async_trait]
    impl DiagramRenderer for Unavailable {
        fn is_available(&self) -> bool {
            false
        }

        async fn render(&self, _source: &str, index: usize) -> Result<Vec<u8>, DiagramError> {
            Err(DiagramError::RendererUnavailable { index })
        }
    }

    const TWO_DIAGRAMS: &str = "# Flow\n\n```mermaid\ngraph TD\n  A-->B\n```\n\ntext\n\n```mermaid\nsequenceDiagram\n  A->>B: hi\n```\n";

    #[tokio::test]
    async fn no_diagrams_is_identity() {
        let text = "# Title\n\n```rust\nfn main() {}\n```\n";
        let out = extract_diagrams(text, &FakeRenderer::ok(), None).await;
        assert_eq!(out.markdown, text);
        assert!(out.images.is_empty());
        assert_eq!(out.found, 0);
    }

    #[tokio::test]
    async fn blocks_become_placeholders() {
        let out = extract_diagrams(TWO_DIAGRAMS, &FakeRenderer::ok(), None).await;
        assert_eq!(out.found, 2);
        assert_eq!(out.images.len(), 2);
        assert!(out.markdown.contains("\n\nMERMAID_IMAGE_0\n\n"));
        assert!(out.markdown.contains("\n\nMERMAID_IMAGE_1\n\n"));
        assert!(!out.markdown.contains("```mermaid"));
        assert!(out.markdown.contains("text"));
    }

    #[tokio::test]
    async fn failed_block_falls_back_to_code() {
        let renderer = FakeRenderer {
            fail: HashSet::from([0]),
        };
        let out = extract_diagrams(TWO_DIAGRAMS, &renderer, None).await;
        assert_eq!(out.images, vec![DiagramImage { index: 1, png: b"PNG1".to_vec() }]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].index(), 0);
        assert!(out.markdown.contains("```\ngraph TD\n  A-->B\n```"));
        assert!(!out.markdown.contains("MERMAID_IMAGE_0"));
        assert!(out.markdown.contains("MERMAID_IMAGE_1"));
    }

    #[tokio::test]
    async fn unavailable_renderer_leaves_text_unchanged() {
        let out = extract_diagrams(TWO_DIAGRAMS, &Unavailable, None).await;
        assert_eq!(out.markdown, TWO_DIAGRAMS);
        assert!(out.images.is_empty());
        assert_eq!(out.errors.len(), 2);
    }

    #[test]
    fn inject_unwraps_paragraph() {
        let html = "<h1>T</h1>\n<p>MERMAID_IMAGE_0</p>\n";
        let images = [DiagramImage { index: 0, png: b"x".to_vec() }];
        let out = inject_diagrams(html, &images);
        assert!(out.contains("<h1>T</h1>\n<img src=\"data:image/png;base64,eA==\""));
        assert!(!out.contains("<p><img"));
    }

    #[test]
    fn inject_distinguishes_multi_digit_indices() {
        let html = "<p>MERMAID_IMAGE_1</p><p>MERMAID_IMAGE_10</p>";
        let images = [DiagramImage { index: 10, png: b"ten".to_vec() }];
        let out = inject_diagrams(html, &images);
        assert!(out.starts_with("<p>MERMAID_IMAGE_1</p><img"), "got: {out}");
    }

    #[test]
    fn inject_without_images_is_identity() {
        let html = "<p>MERMAID_IMAGE_0</p>";
        assert_eq!(inject_diagrams(html, &[]), html);
    }

    #[test]
    fn cli_without_tools_is_unavailable() {
        assert!(!MermaidCli::new(None, None).is_available());
        assert!(MermaidCli::new(None, Some(PathBuf::from("/usr/bin/npx"))).is_available());
    }

    #[test]
    fn render_args_carry_options() {
        let cli = MermaidCli::new(None, None).background("transparent").scale(3);
        let args = cli.render_args(Path::new("in.mmd"), Path::new("out.png"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-i", "in.mmd", "-o", "out.png", "-b", "transparent", "-s", "3"]
        );
    }

    #[tokio::test]
    async fn missing_binary_reports_render_failure() {
        let cli = MermaidCli::new(Some(PathBuf::from("/nonexistent/mmdc")), None);
        let err = cli.render("graph TD\nA-->B\n", 4).await.unwrap_err();
        assert!(matches!(err, DiagramError::RenderFailed { index: 4, .. }), "got: {err:?}");
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_renderer_produces_image() {
        let dir = tempfile::tempdir().unwrap();
        // -i <in> -o <out> …: copy the source through as the "image".
        let mmdc = script(dir.path(), "mmdc", r#"cp "$2" "$4""#);
        let cli = MermaidCli::new(Some(mmdc), None);
        let png = cli.render("graph LR\nA-->B\n", 0).await.unwrap();
        assert_eq!(png, b"graph LR\nA-->B\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn npx_fallback_runs_after_mmdc_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mmdc = script(dir.path(), "mmdc", "exit 3");
        // npx --yes @mermaid-js/mermaid-cli -i <in> -o <out> …
        let npx = script(dir.path(), "npx", r#"printf png > "$6""#);
        let cli = MermaidCli::new(Some(mmdc), Some(npx));
        assert_eq!(cli.render("graph LR\n", 0).await.unwrap(), b"png");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_without_output_is_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let mmdc = script(dir.path(), "mmdc", "exit 0");
        let cli = MermaidCli::new(Some(mmdc), None);
        let err = cli.render("graph LR\n", 2).await.unwrap_err();
        assert!(matches!(err, DiagramError::EmptyOutput { index: 2 }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_renderer_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mmdc = script(dir.path(), "mmdc", "exec sleep 5");
        let cli = MermaidCli::new(Some(mmdc), None)
            .timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let err = cli.render("graph LR\n", 1).await.unwrap_err();
        assert!(matches!(err, DiagramError::Timeout { index: 1, .. }), "got: {err:?}");
    }

    /// Renders with an `mmdc` stand-in that notes its input path, then
    /// returns the scratch directory that path lived in.
    #[cfg(unix)]
    async fn scratch_dir_after(behaviour: &str, timeout: Duration) -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("input-path");
        let body = format!("printf '%s' \"$2\" > '{}'\n{behaviour}", record.display());
        let mmdc = script(dir.path(), "mmdc", &body);
        let cli = MermaidCli::new(Some(mmdc), None).timeouts(timeout, timeout);

        let _ = cli.render("graph LR\nA-->B\n", 0).await;

        let input = PathBuf::from(std::fs::read_to_string(&record).unwrap());
        let scratch = input.parent().unwrap().to_path_buf();
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("md2docs-mermaid-"));
        scratch
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scratch_dir_removed_after_success() {
        let scratch = scratch_dir_after(r#"cp "$2" "$4""#, Duration::from_secs(10)).await;
        assert!(!scratch.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scratch_dir_removed_after_failure() {
        let scratch = scratch_dir_after("exit 3", Duration::from_secs(10)).await;
        assert!(!scratch.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scratch_dir_removed_after_timeout() {
        let scratch = scratch_dir_after("exec sleep 5", Duration::from_millis(300)).await;
        assert!(!scratch.exists());
    }
}
