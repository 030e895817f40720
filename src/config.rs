//! Configuration types for Markdown-to-Google-Doc conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. File locations that used to be fixed
//! per-user paths (token cache, client secret) live in
//! [`md2docs_auth::AuthConfig`] so tests can point them at a temp directory.

use crate::error::Md2DocsError;
use crate::progress::ProgressCallback;
use md2docs_auth::AuthConfig;
use std::fmt;
use std::path::PathBuf;

/// Default Drive API host. The upload endpoint is
/// `{drive_api_base}/upload/drive/v3/files`.
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";

/// Configuration for a Markdown-to-Google-Doc conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2docs::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .title("Quarterly Plan")
///     .diagram_scale(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Google Doc title. If None, derived from the input file name.
    pub title: Option<String>,

    /// Render ```` ```mermaid ```` blocks to images. Default: true.
    ///
    /// When disabled, diagram blocks are passed through as ordinary fenced
    /// code and no external process is spawned.
    pub render_diagrams: bool,

    /// Background colour passed to the Mermaid CLI (`-b`). Default: "white".
    pub diagram_background: String,

    /// Scale factor passed to the Mermaid CLI (`-s`). Range: 1–8. Default: 2.
    ///
    /// Google Docs downsamples embedded images to the page width, so a 2×
    /// render keeps diagram text legible after import.
    pub diagram_scale: u32,

    /// Timeout for a directly installed `mmdc` in seconds. Default: 30.
    pub mmdc_timeout_secs: u64,

    /// Timeout for the `npx @mermaid-js/mermaid-cli` fallback in seconds.
    /// Default: 60 (the first run downloads the package).
    pub npx_timeout_secs: u64,

    /// Token cache and client secret locations.
    pub auth: AuthConfig,

    /// Drive API base URL. Default: [`DEFAULT_DRIVE_API_BASE`].
    pub drive_api_base: String,

    /// Per-request timeout for Drive API calls in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Optional progress callback for stage / diagram / upload events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: None,
            render_diagrams: true,
            diagram_background: "white".to_string(),
            diagram_scale: 2,
            mmdc_timeout_secs: 30,
            npx_timeout_secs: 60,
            auth: AuthConfig::default(),
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("render_diagrams", &self.render_diagrams)
            .field("diagram_background", &self.diagram_background)
            .field("diagram_scale", &self.diagram_scale)
            .field("mmdc_timeout_secs", &self.mmdc_timeout_secs)
            .field("npx_timeout_secs", &self.npx_timeout_secs)
            .field("auth", &self.auth)
            .field("drive_api_base", &self.drive_api_base)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn render_diagrams(mut self, v: bool) -> Self {
        self.config.render_diagrams = v;
        self
    }

    pub fn diagram_background(mut self, colour: impl Into<String>) -> Self {
        self.config.diagram_background = colour.into();
        self
    }

    pub fn diagram_scale(mut self, scale: u32) -> Self {
        self.config.diagram_scale = scale;
        self
    }

    pub fn mmdc_timeout_secs(mut self, secs: u64) -> Self {
        self.config.mmdc_timeout_secs = secs;
        self
    }

    pub fn npx_timeout_secs(mut self, secs: u64) -> Self {
        self.config.npx_timeout_secs = secs;
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.auth.token_path = path.into();
        self
    }

    pub fn client_secret(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.auth.client_secret_override = Some(path.into());
        self
    }

    pub fn drive_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.drive_api_base = base.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2DocsError> {
        let c = &self.config;
        if !(1..=8).contains(&c.diagram_scale) {
            return Err(Md2DocsError::InvalidConfig(format!(
                "Diagram scale must be 1–8, got {}",
                c.diagram_scale
            )));
        }
        if c.mmdc_timeout_secs == 0 || c.npx_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(Md2DocsError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Md2DocsError::InvalidConfig("Title must not be empty".into()));
        }
        if !c.drive_api_base.starts_with("http://") && !c.drive_api_base.starts_with("https://") {
            return Err(Md2DocsError::InvalidConfig(format!(
                "Drive API base must be an HTTP(S) URL, got '{}'",
                c.drive_api_base
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert!(c.render_diagrams);
        assert_eq!(c.diagram_background, "white");
        assert_eq!(c.diagram_scale, 2);
        assert_eq!(c.mmdc_timeout_secs, 30);
        assert_eq!(c.npx_timeout_secs, 60);
        assert_eq!(c.drive_api_base, DEFAULT_DRIVE_API_BASE);
    }

    #[test]
    fn builder_sets_auth_paths() {
        let c = ConversionConfig::builder()
            .token_path("/tmp/md2docs-test/token.json")
            .client_secret("/tmp/md2docs-test/secret.json")
            .build()
            .unwrap();
        assert_eq!(c.auth.token_path, PathBuf::from("/tmp/md2docs-test/token.json"));
        assert_eq!(
            c.auth.client_secret_override,
            Some(PathBuf::from("/tmp/md2docs-test/secret.json"))
        );
    }

    #[test]
    fn rejects_zero_scale() {
        let err = ConversionConfig::builder().diagram_scale(0).build().unwrap_err();
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ConversionConfig::builder().mmdc_timeout_secs(0).build().is_err());
        assert!(ConversionConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn rejects_blank_title() {
        assert!(ConversionConfig::builder().title("   ").build().is_err());
    }

    #[test]
    fn rejects_non_http_drive_base() {
        assert!(ConversionConfig::builder()
            .drive_api_base("ftp://example")
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let s = format!("{:?}", ConversionConfig::default());
        assert!(s.contains("progress_callback: None"));
    }
}
