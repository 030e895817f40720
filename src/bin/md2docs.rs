//! CLI binary for md2docs.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2docs::{
    convert, open_in_browser, render_file, ConversionConfig, ConversionProgressCallback,
    ProgressCallback, Stage,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner for the running stage plus one log
/// line per stage and per diagram. In quiet mode the spinner is hidden and
/// only the sign-in prompt is printed.
struct CliProgressCallback {
    bar: ProgressBar,
    quiet: bool,
}

impl CliProgressCallback {
    fn new(quiet: bool) -> Arc<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Starting");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        };

        Arc::new(Self { bar, quiet })
    }

    /// Print a line above the spinner; works with a hidden bar too.
    fn notice(&self, line: String) {
        self.bar.suspend(|| eprintln!("{line}"));
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        if self.quiet {
            return;
        }
        self.bar.println(format!("{} {}...", cyan("◆"), bold(&stage.to_string())));
        let prefix = match stage {
            Stage::Authenticating => "Signing in",
            Stage::Rendering => "Rendering",
            Stage::Uploading { .. } => "Uploading",
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message("");
    }

    fn on_authorization_required(&self, url: &str) {
        self.bar.set_message("waiting for browser sign-in…");
        self.notice(format!(
            "  Sign in to Google in your browser. If it did not open, visit:\n  {}",
            cyan(url)
        ));
        open_in_browser(url);
    }

    fn on_diagram_rendered(&self, index: usize, png_len: usize) {
        if !self.quiet {
            self.bar.println(format!(
                "  {} Diagram {:>2}  {}",
                green("✓"),
                index + 1,
                dim(&format!("{:.1} KB", png_len as f64 / 1024.0)),
            ));
        }
    }

    fn on_diagram_failed(&self, index: usize, error: &str) {
        if self.quiet {
            return;
        }
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Diagram {:>2}  kept as code  {}",
            red("✗"),
            index + 1,
            dim(&msg),
        ));
    }

    fn on_upload_complete(&self, url: &str) {
        self.bar.finish_and_clear();
        if !self.quiet {
            eprintln!("{} Doc created: {}", green("✔"), bold(url));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and open the new doc
  md2docs notes.md

  # Custom title, don't open a browser
  md2docs --title "Q3 Launch Plan" --no-open plan.md

  # Use a client secret stored elsewhere
  md2docs --client-secret ~/Downloads/client_secret_123.json notes.md

  # Preview the styled HTML without signing in
  md2docs --html-only notes.md -o notes.html

ENVIRONMENT VARIABLES:
  MD2DOCS_CLIENT_SECRET   Path to the OAuth client secret JSON
  MD2DOCS_TOKEN_PATH      Token cache location (default ~/.md2docs/token.json)
  MD2DOCS_TITLE           Default document title
  MD2DOCS_NO_OPEN         Don't open the doc in a browser
  RUST_LOG                Log filter (overrides -v / -q)

SETUP:
  1. Google Cloud console → APIs & Services → enable the Google Drive API
  2. Credentials → Create OAuth client ID → Desktop app → download JSON
  3. Save it as ~/.md2docs/client_secret.json
  4. md2docs notes.md   (the first run opens a browser to sign in)

  Mermaid diagrams need `mmdc` (npm i -g @mermaid-js/mermaid-cli) or `npx`
  on PATH; without either they stay as code blocks.
"#;

/// Convert Markdown files to formatted Google Docs.
#[derive(Parser, Debug)]
#[command(
    name = "md2docs",
    version,
    about = "Convert Markdown files to formatted Google Docs",
    long_about = "Convert a Markdown file (GFM tables, code blocks, nested lists, Mermaid \
diagrams) into a native Google Doc with formatting that survives Google's HTML importer.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert.
    file: PathBuf,

    /// Google Doc title (default: file name without extension, title-cased).
    #[arg(long, env = "MD2DOCS_TITLE")]
    title: Option<String>,

    /// Don't open the doc in a browser.
    #[arg(long, env = "MD2DOCS_NO_OPEN")]
    no_open: bool,

    /// OAuth client secret JSON (searched before ~/.md2docs/client_secret.json).
    #[arg(long, env = "MD2DOCS_CLIENT_SECRET")]
    client_secret: Option<PathBuf>,

    /// Token cache file.
    #[arg(long, env = "MD2DOCS_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    /// Leave ```mermaid blocks as code instead of rendering them.
    #[arg(long)]
    no_diagrams: bool,

    /// Per-diagram render timeout in seconds (the npx fallback gets twice this).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=600))]
    diagram_timeout: Option<u64>,

    /// Write the styled HTML instead of uploading (no sign-in).
    #[arg(long)]
    html_only: bool,

    /// Output file for --html-only (default: stdout).
    #[arg(short, long, requires = "html_only")]
    output: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the final link.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = log_filter(cli.verbose, cli.quiet);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── HTML-only mode ───────────────────────────────────────────────────
    if cli.html_only {
        let config = build_config(&cli, None)?;
        let doc = render_file(&cli.file, &config)
            .await
            .context("Rendering failed")?;

        match cli.output {
            Some(ref path) => {
                tokio::fs::write(path, &doc.html)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} bytes, {}/{} diagrams  →  {}",
                        green("✔"),
                        doc.html.len(),
                        doc.diagrams_rendered,
                        doc.diagrams_found,
                        bold(&path.display().to_string()),
                    );
                }
            }
            None => {
                io::stdout()
                    .lock()
                    .write_all(doc.html.as_bytes())
                    .context("Failed to write to stdout")?;
            }
        }
        return Ok(());
    }

    // ── Full conversion ──────────────────────────────────────────────────
    let progress = CliProgressCallback::new(cli.quiet);
    let config = build_config(&cli, Some(progress.clone() as ProgressCallback))?;

    let output = match convert(&cli.file, &config).await {
        Ok(output) => output,
        Err(e) => {
            progress.bar.finish_and_clear();
            return Err(e).context("Conversion failed");
        }
    };
    let url = &output.document.url;

    if !cli.quiet && output.stats.diagrams_failed > 0 {
        eprintln!(
            "   {} {} diagram(s) kept as code blocks",
            cyan("⚠"),
            output.stats.diagrams_failed
        );
    }

    if !cli.no_open {
        if !cli.quiet {
            eprintln!("Opening in browser...");
        }
        open_in_browser(url);
    }

    println!("\n{url}");
    Ok(())
}

/// Default tracing filter when `RUST_LOG` is unset.
fn log_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder().render_diagrams(!cli.no_diagrams);

    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref path) = cli.client_secret {
        builder = builder.client_secret(path.clone());
    }
    if let Some(ref path) = cli.token_path {
        builder = builder.token_path(path.clone());
    }
    if let Some(secs) = cli.diagram_timeout {
        builder = builder.mmdc_timeout_secs(secs).npx_timeout_secs(secs * 2);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
