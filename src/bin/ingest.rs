//! CLI binary for edgequake-ingest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, submits every input as one batch and prints the
//! downstream context.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ingest::dispatch::{classify, DocumentKind};
use edgequake_ingest::pipeline::density::needs_ocr;
use edgequake_ingest::{
    resolve_input, BorderMode, FileId, FileStatus, IngestConfig, IngestionSession,
    OcrFailurePolicy, PdfBackend, PdfiumBackend, SessionListener, SourceFile, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
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

// ── CLI listener using indicatif ─────────────────────────────────────────────

/// Terminal listener: one bar over the batch, one log line per finished file.
struct CliListener {
    bar: ProgressBar,
    /// Files whose result line has already been printed.
    reported: Mutex<HashSet<FileId>>,
    /// Name of the file currently being transcribed, for OCR messages.
    current: Mutex<Option<(FileId, String)>>,
}

impl CliListener {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Ingesting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            reported: Mutex::new(HashSet::new()),
            current: Mutex::new(None),
        })
    }

    fn print_result(&self, file: &UploadedFile) {
        let line = match file.status() {
            FileStatus::Ready => {
                let pages = match (file.page_count, file.ocr_pages) {
                    (Some(n), 0) => format!("{n} pages, text layer"),
                    (Some(n), _) => format!("{n} pages, OCR"),
                    (None, 0) => "text".to_string(),
                    (None, _) => "image, OCR".to_string(),
                };
                format!(
                    "  {} {:<40}  {}  {}",
                    green("✓"),
                    file.name,
                    dim(&format!("{:>7} chars", file.content().chars().count())),
                    dim(&pages),
                )
            }
            FileStatus::Error => {
                let msg = file.error().unwrap_or("unknown error");
                let msg = if msg.chars().count() > 80 {
                    format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
                } else {
                    msg.to_string()
                };
                format!("  {} {:<40}  {}", red("✗"), file.name, red(&msg))
            }
            _ => return,
        };
        self.bar.println(line);
    }
}

impl SessionListener for CliListener {
    fn on_change(&self, files: &[UploadedFile]) {
        let mut reported = self.reported.lock().unwrap_or_else(|e| e.into_inner());
        for file in files.iter().filter(|f| f.status().is_terminal()) {
            if reported.insert(file.id) {
                self.print_result(file);
                self.bar.inc(1);
            }
        }

        let processing = files
            .iter()
            .find(|f| f.status() == FileStatus::Processing);
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        match processing {
            Some(file) => {
                if current.as_ref().map(|(id, _)| *id) != Some(file.id) {
                    self.bar.set_message(file.name.clone());
                    *current = Some((file.id, file.name.clone()));
                }
            }
            None => {
                self.bar.set_message("");
                *current = None;
            }
        }
    }

    fn on_ocr_progress(&self, id: FileId, percent: u8) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((current_id, name)) = current.as_ref() {
            if *current_id == id {
                self.bar.set_message(format!("{name}  OCR {percent:>3}%"));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest a few files, print the context blob to stdout
  ingest notes.txt scan.pdf receipt.jpg memo.docx

  # Write the context to a file
  ingest *.pdf -o context.txt

  # Per-file status and content as JSON
  ingest --json report.pdf > report.json

  # Fail the whole file when any page cannot be transcribed
  ingest --ocr-failure fail scan.pdf

  # Classify inputs and check PDF text layers (no API key needed)
  ingest --inspect-only *.pdf

  # Ingest from URL
  ingest https://example.com/invoice.pdf

HOW PDFs ARE READ:
  The embedded text layer is used when it holds at least
  --density-threshold characters per page on average. Otherwise every
  page is rendered at --render-scale, converted to high-contrast black and
  white, and transcribed by the vision model.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (default: ./ then system search path)
"#;

/// Extract plaintext from PDFs, images, DOCX and text files.
#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    version,
    about = "Extract plaintext from PDFs, scanned images, DOCX and text files",
    long_about = "Extract clean plaintext from heterogeneous documents. PDFs with a sparse \
text layer and standalone images are enhanced and transcribed by a vision model. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs, processed in order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the context to this file instead of stdout.
    #[arg(short, long, env = "INGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Output per-file records and the batch summary as JSON.
    #[arg(long, env = "INGEST_JSON")]
    json: bool,

    /// Minimum average text-layer characters per PDF page.
    #[arg(long, env = "INGEST_DENSITY_THRESHOLD", default_value_t = 50)]
    density_threshold: usize,

    /// Page render scale for OCR (1.0–6.0).
    #[arg(long, env = "INGEST_RENDER_SCALE", default_value_t = 3.0)]
    render_scale: f32,

    /// Stretched values below this become black.
    #[arg(long, env = "INGEST_CLIP_LOW", default_value_t = 50)]
    clip_low: u8,

    /// Stretched values above this become white.
    #[arg(long, env = "INGEST_CLIP_HIGH", default_value_t = 200)]
    clip_high: u8,

    /// Sharpen border handling: skip or renormalize.
    #[arg(long, env = "INGEST_BORDER", value_enum, default_value = "skip")]
    border: BorderArg,

    /// What a failed page transcription does: blank the page, or fail the file.
    #[arg(long, env = "INGEST_OCR_FAILURE", value_enum, default_value = "blank")]
    ocr_failure: OcrFailureArg,

    /// Per-page transcription timeout in seconds.
    #[arg(long, env = "INGEST_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Vision model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INGEST_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom transcription prompt.
    #[arg(long, env = "INGEST_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max output tokens per transcribed page.
    #[arg(long, env = "INGEST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Classify inputs and report PDF text-layer density only.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INGEST_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrFailureArg {
    Blank,
    Fail,
}

impl From<OcrFailureArg> for OcrFailurePolicy {
    fn from(v: OcrFailureArg) -> Self {
        match v {
            OcrFailureArg::Blank => OcrFailurePolicy::BlankPage,
            OcrFailureArg::Fail => OcrFailurePolicy::FailFile,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BorderArg {
    Skip,
    Renormalize,
}

impl From<BorderArg> for BorderMode {
    fn from(v: BorderArg) -> Self {
        match v {
            BorderArg::Skip => BorderMode::Skip,
            BorderArg::Renormalize => BorderMode::Renormalize,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let config = build_config(&cli).await?;

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut sources = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        match resolve_input(input, config.download_timeout_secs).await {
            Ok(source) => sources.push(source),
            Err(e) => eprintln!("{} {}: {}", red("✗"), input, e),
        }
    }
    if sources.is_empty() {
        anyhow::bail!("None of the {} input(s) could be read", cli.inputs.len());
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect(&sources, &config, cli.json).await;
    }

    // ── Run the batch ────────────────────────────────────────────────────
    let session = IngestionSession::with_defaults(config)
        .context("Failed to set up the transcription provider")?;

    if show_progress {
        session.subscribe(CliListener::new(sources.len()));
    }

    let summary = session.submit(sources).await;

    if cli.json {
        let body = serde_json::json!({
            "summary": summary,
            "files": session.files(),
        });
        let json = serde_json::to_string_pretty(&body).context("Failed to serialise output")?;
        write_output(cli.output.as_ref(), &json)?;
    } else {
        write_output(cli.output.as_ref(), &session.context())?;
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} files ready  {}ms{}",
            if summary.failed == 0 {
                green("✔")
            } else if summary.ready == 0 {
                red("✘")
            } else {
                cyan("⚠")
            },
            summary.ready,
            summary.ids.len(),
            summary.elapsed_ms,
            cli.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }

    if summary.ready == 0 {
        anyhow::bail!("No file could be ingested");
    }
    Ok(())
}

/// Write to `path`, or stdout with a trailing newline.
fn write_output(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(text.as_bytes())
                .context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
            Ok(())
        }
    }
}

/// Print each input's kind and, for PDFs, whether OCR would be used.
async fn inspect(sources: &[SourceFile], config: &IngestConfig, json: bool) -> Result<()> {
    let backend: Arc<dyn PdfBackend> = Arc::new(PdfiumBackend::from_env());
    let mut rows = Vec::with_capacity(sources.len());

    for source in sources {
        let kind = classify(&source.declared_type, &source.name);
        let mut row = serde_json::json!({
            "name": source.name,
            "kind": kind,
            "bytes": source.bytes.len(),
        });

        if kind == DocumentKind::Pdf {
            let layer = edgequake_ingest::pipeline::pdf::extract_text_layer(
                Arc::clone(&backend),
                Arc::clone(&source.bytes),
                config.password.clone(),
            )
            .await;
            match layer {
                Ok(layer) => {
                    let text = layer.full_text();
                    row["pages"] = layer.page_count().into();
                    row["text_chars"] = text.trim().chars().count().into();
                    row["needs_ocr"] =
                        needs_ocr(&text, layer.page_count(), config.density_threshold).into();
                }
                Err(e) => row["error"] = e.to_string().into(),
            }
        }
        rows.push(row);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise inspection")?
        );
        return Ok(());
    }

    for row in &rows {
        println!("File:       {}", row["name"].as_str().unwrap_or_default());
        println!("Kind:       {}", row["kind"].as_str().unwrap_or_default());
        println!("Size:       {} bytes", row["bytes"]);
        if let Some(pages) = row.get("pages") {
            println!("Pages:      {}", pages);
            println!("Text chars: {}", row["text_chars"]);
            println!("Needs OCR:  {}", row["needs_ocr"]);
        }
        if let Some(err) = row.get("error").and_then(|e| e.as_str()) {
            println!("Error:      {}", err);
        }
        println!();
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
async fn build_config(cli: &Cli) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .density_threshold(cli.density_threshold)
        .render_scale(cli.render_scale)
        .clip_thresholds(cli.clip_low, cli.clip_high)
        .border_mode(cli.border.into())
        .ocr_failure(cli.ocr_failure.into())
        .ocr_timeout_secs(cli.ocr_timeout)
        .max_tokens(cli.max_tokens)
        .download_timeout_secs(cli.download_timeout);

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

    builder.build().context("Invalid configuration")
}
