//! CLI binary for edgequake-statement2tsv.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the transaction table.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_statement2tsv::extract::{collect_submissions, resolve_provider, write_atomic};
use edgequake_statement2tsv::{
    table, ExtractionConfig, LlmExtractor, Pipeline, ProgressCallback, RunProgressCallback,
    Transaction,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
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

/// Terminal progress callback: a live progress bar plus one log line per
/// document. Documents complete out of order, so timings are keyed by name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us the document count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_for(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting transactions from {total_files} documents…"))
        ));
    }

    fn on_file_start(&self, name: &str, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, name: &str, completed: usize, total: usize, transactions: usize) {
        let secs = self.elapsed_for(name);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<32}  {}  {}",
            green("✓"),
            completed,
            total,
            name,
            dim(&format!("{transactions:>4} transactions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(completed as u64);
    }

    fn on_file_error(&self, name: &str, error: &str) {
        let secs = self.elapsed_for(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_run_complete(&self, total_files: usize, transactions: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} transactions from {} documents",
            green("✔"),
            bold(&transactions.to_string()),
            total_files
        );
    }
}

impl CliProgressCallback {
    /// Clear the bar after a failed run; `on_run_complete` only fires on success.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
        if self.errors.load(Ordering::SeqCst) > 0 {
            eprintln!("{} run failed, no transactions kept", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one statement to stdout
  stmt2tsv january.pdf

  # Several documents merged into one date-sorted table
  stmt2tsv jan.pdf feb.pdf receipt.jpg -o 2024-q1.tsv

  # Put the table on the clipboard, ready to paste into a spreadsheet
  stmt2tsv --copy statements/*.pdf

  # Use a specific model
  stmt2tsv --model gpt-4.1 --provider openai scan.png

  # From a URL
  stmt2tsv https://bank.example/statements/2024-03.pdf

  # JSON instead of TSV
  stmt2tsv --json receipt.heic > receipt.json

  # List what would be submitted (no API key needed)
  stmt2tsv --list-only statements/*

SUPPORTED DOCUMENTS:
  JPEG, PNG, WEBP, HEIC, PDF. Other files are skipped. Files with the same
  name and size are submitted once. PDF pages are rendered to PNG with pdfium
  before upload. HEIC is only read by Gemini (--provider gemini).

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Override log filter (e.g. edgequake_statement2tsv=debug)
"#;

/// Extract bank statement and receipt transactions into a spreadsheet-ready table.
#[derive(Parser, Debug)]
#[command(
    name = "stmt2tsv",
    version,
    about = "Extract transactions from statements and receipts into a TSV table using Vision LLMs",
    long_about = "Send scanned bank statements, receipts and invoices (images or PDFs) to a \
Vision Language Model, validate every extracted transaction, merge all documents and sort them \
by date. The result is a tab-separated table that pastes cleanly into any spreadsheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local files, HTTP/HTTPS URLs or data URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the table to this file instead of stdout.
    #[arg(short, long, env = "STMT2TSV_OUTPUT")]
    output: Option<PathBuf>,

    /// Also copy the table to the system clipboard.
    #[arg(long, env = "STMT2TSV_COPY")]
    copy: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Number of documents sent to the model at once.
    #[arg(short, long, env = "STMT2TSV_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Path to a text file with custom extraction rules.
    #[arg(long, env = "STMT2TSV_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per document.
    #[arg(long, env = "STMT2TSV_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STMT2TSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Output the transactions as JSON instead of TSV.
    #[arg(long, env = "STMT2TSV_JSON")]
    json: bool,

    /// Print the documents that would be submitted, then exit.
    #[arg(long)]
    list_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "STMT2TSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STMT2TSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STMT2TSV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "STMT2TSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-document LLM call timeout in seconds.
    #[arg(long, env = "STMT2TSV_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Longest edge of a rendered PDF page, in pixels.
    #[arg(long, env = "STMT2TSV_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_only;
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

    let progress_cb = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        &cli,
        progress_cb.clone().map(|cb| cb as ProgressCallback),
    )
    .await?;

    // ── Resolve inputs ───────────────────────────────────────────────────
    let submissions = collect_submissions(&cli.inputs, &config)
        .await
        .context("Failed to read input documents")?;

    if cli.list_only {
        if let Some(ref cb) = progress_cb {
            cb.bar.finish_and_clear();
        }
        for doc in submissions.iter() {
            println!("{:<40} {:<16} {:>10} bytes", doc.name, doc.media_type.mime(), doc.size);
        }
        eprintln!(
            "{} of {} inputs would be submitted ({} bytes)",
            submissions.len(),
            cli.inputs.len(),
            submissions.total_bytes()
        );
        return Ok(());
    }

    let skipped = cli.inputs.len().saturating_sub(submissions.len());
    if skipped > 0 && !cli.quiet {
        eprintln!(
            "{} skipped {} unsupported or duplicate inputs",
            cyan("⚠"),
            skipped
        );
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let transactions: Vec<Transaction> = if submissions.is_empty() {
        if let Some(ref cb) = progress_cb {
            cb.bar.finish_and_clear();
        }
        Vec::new()
    } else {
        let provider = resolve_provider(&config).context("No LLM provider available")?;
        let pipeline = Pipeline::new(Arc::new(LlmExtractor::new(provider, &config)), &config);
        match pipeline.run(&submissions.snapshot()).await {
            Ok(txs) => txs,
            Err(e) => {
                if let Some(ref cb) = progress_cb {
                    cb.abandon();
                }
                return Err(e).context("Extraction failed");
            }
        }
    };

    // ── Render output ────────────────────────────────────────────────────
    let tsv = table::serialize(&transactions);
    let rendered = if cli.json {
        serde_json::to_string_pretty(&transactions).context("Failed to serialise output")?
    } else {
        tsv.clone()
    };

    if let Some(ref output_path) = cli.output {
        write_atomic(output_path, &rendered)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} transactions  →  {}",
                green("✔"),
                transactions.len(),
                bold(&output_path.display().to_string()),
            );
        }
    } else if !rendered.is_empty() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    if transactions.is_empty() && !cli.quiet {
        eprintln!("{}", dim("No transactions found"));
    }

    if cli.copy {
        copy_to_clipboard(&tsv, cli.quiet);
    }

    Ok(())
}

#[cfg(feature = "clipboard")]
fn copy_to_clipboard(tsv: &str, quiet: bool) {
    use edgequake_statement2tsv::{ClipboardSink, SystemClipboard};

    let copied = SystemClipboard.copy(tsv);
    if !quiet {
        if copied {
            eprintln!("{} table copied to clipboard", green("✔"));
        } else {
            eprintln!("{} clipboard unavailable, table not copied", red("✗"));
        }
    }
}

#[cfg(not(feature = "clipboard"))]
fn copy_to_clipboard(_tsv: &str, quiet: bool) {
    if !quiet {
        eprintln!(
            "{} built without the `clipboard` feature, table not copied",
            red("✗")
        );
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .max_rendered_pixels(cli.max_pixels);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
