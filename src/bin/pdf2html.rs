//! CLI binary for edgequake-pdf2html.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, writes the HTML, and optionally runs the upload
//! server.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2html::server::{self, DEFAULT_MAX_UPLOAD_BYTES};
use edgequake_pdf2html::{
    convert, convert_to_file, inspect, resolve_generator, ConversionConfig,
    ConversionProgressCallback, ErrorKind, HtmlArtifact, Pdf2HtmlError, ProgressCallback, Stage,
    DOWNLOAD_FILE_NAME,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner whose message follows the current stage,
/// plus a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, duration_ms: u64) {
        self.bar.println(format!(
            "  {} {:<28} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", duration_ms as f64 / 1000.0)),
        ));
    }

    fn on_extraction_complete(&self, tables: usize, images: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracted {tables} tables and {images} images!"))
        ));
    }

    fn on_generation_attempt(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.bar.set_message(format!(
                "{}… retry {}/{}",
                Stage::Generation,
                attempt - 1,
                max_attempts - 1
            ));
        }
    }

    fn on_conversion_complete(&self, html_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Generated {} of HTML",
            green("✔"),
            bold(&format!("{html_len} bytes"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a datasheet (writes converted_datasheet.html)
  pdf2html datasheet.pdf

  # Choose the output file and also write a preview page
  pdf2html datasheet.pdf -o sheet.html --preview sheet.preview.html

  # Print the HTML to stdout
  pdf2html datasheet.pdf --stdout > sheet.html

  # Use a specific model
  pdf2html --provider openai --model gpt-4.1-mini datasheet.pdf

  # Show what would be sent to the model (no API key needed)
  pdf2html --extract-only datasheet.pdf

  # Convert from URL
  pdf2html https://example.com/datasheet.pdf

  # Run the upload / preview / download web page
  pdf2html --serve 127.0.0.1:8080

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Log filter, e.g. edgequake_pdf2html=debug

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Convert:         pdf2html datasheet.pdf

  PDFium (~30 MB) is downloaded automatically on first run and cached.
"#;

/// Convert PDF datasheets to structured HTML with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2html",
    version,
    about = "Convert PDF datasheets to styled HTML with an LLM",
    long_about = "Extract text, tables and embedded images from a PDF and let an LLM \
lay them out as a semantic, inline-styled HTML page. Supports Google Gemini, OpenAI, \
Anthropic and any provider edgequake-llm knows about.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "serve")]
    input: Option<String>,

    /// Write the HTML to this file.
    #[arg(short, long, env = "PDF2HTML_OUTPUT", default_value = DOWNLOAD_FILE_NAME)]
    output: PathBuf,

    /// Print the HTML to stdout instead of writing a file.
    #[arg(long, env = "PDF2HTML_STDOUT")]
    stdout: bool,

    /// Also write a standalone preview page (summary, sandboxed frame, download link).
    #[arg(long, env = "PDF2HTML_PREVIEW")]
    preview: Option<PathBuf>,

    /// Output structured JSON (ConversionOutput) instead of HTML.
    #[arg(long, env = "PDF2HTML_JSON")]
    json: bool,

    /// Extract and print the prompt only; no LLM call.
    #[arg(long, env = "PDF2HTML_EXTRACT_ONLY")]
    extract_only: bool,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "PDF2HTML_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "PDF2HTML_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2HTML_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2HTML_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "PDF2HTML_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2HTML_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries after a transient LLM failure.
    #[arg(long, env = "PDF2HTML_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-attempt LLM call timeout in seconds.
    #[arg(long, env = "PDF2HTML_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2HTML_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Remove scripts and inline event handlers from previews.
    #[arg(long, env = "PDF2HTML_STRIP_SCRIPTS")]
    strip_scripts: bool,

    /// Run the upload web server instead of converting one file.
    #[arg(
        long,
        env = "PDF2HTML_SERVE",
        num_args = 0..=1,
        default_missing_value = "127.0.0.1:8080",
        value_name = "ADDR"
    )]
    serve: Option<SocketAddr>,

    /// Request body limit for the web server, in MiB.
    #[arg(long, env = "PDF2HTML_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_BYTES / (1024 * 1024))]
    max_upload_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2HTML_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs in interactive runs.
    let show_progress = !cli.quiet && !cli.json && cli.serve.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ───────────────────────────────────
    if !pdfium_auto::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.set_message("Connecting…");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    // ── Server mode ──────────────────────────────────────────────────────
    if let Some(addr) = cli.serve {
        let mut config = build_config(&cli, None).await?;
        // Resolve once so every request shares the same client.
        let generator = resolve_generator(&config).unwrap_or_else(|e| fail(e));
        config.generator = Some(generator);
        if !cli.quiet {
            eprintln!("{} Serving on {}", cyan("◆"), bold(&format!("http://{addr}")));
        }
        let limit = cli.max_upload_mb.saturating_mul(1024 * 1024);
        return server::serve(addr, config, limit).await.map_err(anyhow::Error::from);
    }

    let input = cli
        .input
        .clone()
        .context("An input PDF path or URL is required")?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let config = build_config(&cli, None).await?;
        let extraction = inspect(&input, &config).await.unwrap_or_else(|e| fail(e));
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&extraction).context("Failed to serialise output")?
            );
        } else {
            if !cli.quiet {
                eprintln!("{} {}", cyan("◆"), bold(&extraction.extraction_summary()));
                for w in extraction
                    .text
                    .warnings
                    .iter()
                    .chain(extraction.images.warnings.iter())
                {
                    eprintln!("  {} {}", cyan("⚠"), dim(&w.to_string()));
                }
            }
            println!("{}", extraction.prompt);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = if cli.json || cli.stdout {
        convert(&input, &config).await
    } else {
        convert_to_file(&input, &cli.output, &config).await
    }
    .unwrap_or_else(|e| fail(e));

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.html.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if let Some(ref preview_path) = cli.preview {
        let page = HtmlArtifact::new(output.html.as_str()).preview_page(
            &output.extraction_summary(),
            config.preview_height,
            config.strip_preview_scripts,
        );
        HtmlArtifact::new(page)
            .write_to(preview_path)
            .unwrap_or_else(|e| fail(e));
    }

    if !cli.quiet {
        for w in output.warnings() {
            eprintln!("  {} {}", cyan("⚠"), dim(&w.to_string()));
        }
        if !cli.json && !cli.stdout {
            eprintln!(
                "{}  {}  {}ms  →  {}",
                green("✔"),
                output.extraction_summary(),
                output.stats.total_duration_ms,
                bold(&cli.output.display().to_string()),
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {} attempt(s)",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.attempts,
        );
    }

    Ok(())
}

/// Print the user-facing message and exit with a code per error kind.
fn fail(e: Pdf2HtmlError) -> ! {
    eprintln!("{} {}", red("✘"), e.user_message());
    let code = match e.kind() {
        ErrorKind::Input => 2,
        ErrorKind::Generation => 3,
        ErrorKind::Output => 4,
        ErrorKind::Config | ErrorKind::Internal => 1,
    };
    std::process::exit(code)
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .strip_preview_scripts(cli.strip_scripts);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
