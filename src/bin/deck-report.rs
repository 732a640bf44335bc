//! CLI binary for deck-report.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReportConfig`, runs the pipeline and writes the exports.

use anyhow::{Context, Result};
use clap::Parser;
use deck_report::{
    generate_report, generate_report_from_images, inspect, write_exports, AnalysisStage,
    ExtractionPolicy, ItemError, ProgressCallback, ReportConfig, ReportOutput,
    ReportProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Cut long error messages so log lines stay on one row.
fn clip(msg: &str) -> String {
    match msg.char_indices().nth(79) {
        Some((i, _)) => format!("{}\u{2026}", &msg[..i]),
        None => msg.to_string(),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner during extraction, then a bar over
/// the Initial batches, then one line per report stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the call currently in flight.
    call_start: Mutex<Option<Instant>>,
    batch_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Extracting");
        bar.set_message("Reading slides…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            call_start: Mutex::new(None),
            batch_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analysing");
    }

    fn start_call(&self) {
        if let Ok(mut t) = self.call_start.lock() {
            *t = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> String {
        let secs = self
            .call_start
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ReportProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, images: usize, tables: usize, warnings: usize) {
        let dropped = if warnings > 0 {
            format!("  {}", yellow(&format!("{warnings} dropped")))
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}{}",
            cyan("◆"),
            bold(&format!("Extracted {images} image(s), {tables} table(s)")),
            dropped
        ));
    }

    fn on_item_warning(&self, warning: &ItemError) {
        self.bar
            .println(format!("  {} {}", yellow("!"), dim(&clip(&warning.to_string()))));
    }

    fn on_batch_start(&self, batch: usize, total: usize) {
        if batch == 1 {
            self.activate_bar(total);
        }
        self.start_call();
        self.bar.set_message(format!("batch {batch}"));
    }

    fn on_batch_complete(&self, batch: usize, total: usize, output_len: usize) {
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {:<8}  {}",
            green("✓"),
            batch,
            total,
            dim(&format!("{output_len:>5} chars")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_batch_error(&self, batch: usize, total: usize, error: &str) {
        self.batch_errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {}  {}",
            red("✗"),
            batch,
            total,
            red(&clip(error)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_stage_start(&self, stage: AnalysisStage) {
        self.start_call();
        self.bar.set_prefix("Writing");
        self.bar.set_message(format!("{stage} report"));
    }

    fn on_stage_complete(&self, stage: AnalysisStage, output_len: usize) {
        self.bar.println(format!(
            "  {} {:<13}  {:<8}  {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{output_len:>5} chars")),
            self.elapsed(),
        ));
    }

    fn on_stage_error(&self, stage: AnalysisStage, error: &str) {
        self.bar.println(format!(
            "  {} {:<13}  {}  {}",
            red("✗"),
            stage.to_string(),
            red(&clip(error)),
            self.elapsed(),
        ));
    }

    fn on_report_complete(&self, stage: AnalysisStage, _report_len: usize) {
        self.bar.finish_and_clear();
        let failed = self.batch_errors.load(Ordering::SeqCst);
        let mark = if failed == 0 && stage == AnalysisStage::Comprehensive {
            green("✔")
        } else {
            cyan("⚠")
        };
        let mut line = format!("{} Report written by the {} stage", mark, bold(stage.as_str()));
        if failed > 0 {
            line.push_str(&format!("  ({} batch(es) failed)", red(&failed.to_string())));
        }
        eprintln!("{line}");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Report for a deck, printed to stdout
  deck-report ohi-results.pptx

  # Write {stem}.txt, {stem}.md and {stem}_complete.md into ./reports
  deck-report ohi-results.pptx -o reports

  # Report from chart screenshots instead of a deck
  deck-report --images chart1.png chart2.png chart3.png -o reports

  # Report in another language
  deck-report --language "Bahasa Indonesia" ohi-results.pptx -o reports

  # Scan every slide and keep up to 13 images overall
  deck-report --policy global-cap ohi-results.pptx

  # Inspect what would be extracted (no API key needed)
  deck-report --inspect-only ohi-results.pptx

  # JSON output with per-call results and stats
  deck-report --json ohi-results.pptx > run.json

BACKENDS:
  Default: Groq's OpenAI-compatible endpoint with
  meta-llama/llama-4-maverick-17b-128e-instruct. Any OpenAI-compatible
  server works via --base-url. Providers known to edgequake-llm
  (openai, anthropic, gemini, ollama, …) are selected with --provider.

ENVIRONMENT VARIABLES:
  GROQ_API_KEY            API key for the default endpoint
  EDGEQUAKE_LLM_PROVIDER  Provider name (with EDGEQUAKE_MODEL)
  EDGEQUAKE_MODEL         Model ID for that provider
  RUST_LOG                Log filter, overrides --verbose/--quiet
"#;

/// Turn presentation decks and chart screenshots into narrative reports.
#[derive(Parser, Debug)]
#[command(
    name = "deck-report",
    version,
    about = "Turn presentation decks and chart screenshots into narrative reports using multimodal LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local .pptx path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "images", conflicts_with = "images")]
    input: Option<String>,

    /// Analyse these image files (paths or URLs) instead of a deck.
    #[arg(long, num_args = 1..)]
    images: Vec<String>,

    /// Write the three export files into this directory instead of printing.
    #[arg(short, long, env = "DECK_REPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Base name of the export files (default: input file name without extension).
    #[arg(long)]
    name: Option<String>,

    /// Model ID.
    #[arg(long, env = "DECK_REPORT_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider name (openai, anthropic, gemini, ollama, …).
    #[arg(long, env = "DECK_REPORT_PROVIDER")]
    provider: Option<String>,

    /// OpenAI-compatible base URL.
    #[arg(long, env = "DECK_REPORT_BASE_URL")]
    base_url: Option<String>,

    /// API key for the OpenAI-compatible endpoint.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Images per Initial call.
    #[arg(long, env = "DECK_REPORT_BATCH_SIZE", default_value_t = 4)]
    batch_size: usize,

    /// Image selection: per-slide (first image of each of the first slides)
    /// or global-cap (every image until the cap).
    #[arg(long, env = "DECK_REPORT_POLICY", value_enum, default_value = "per-slide")]
    policy: PolicyArg,

    /// Language the report is written in.
    #[arg(long, env = "DECK_REPORT_LANGUAGE", default_value = "English")]
    language: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "DECK_REPORT_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Output structured JSON (ReportOutput) instead of the report text.
    #[arg(long, env = "DECK_REPORT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DECK_REPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Print what would be extracted, no model calls.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECK_REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECK_REPORT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DECK_REPORT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "DECK_REPORT_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PolicyArg {
    PerSlide,
    GlobalCap,
}

impl From<PolicyArg> for ExtractionPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::PerSlide => ExtractionPolicy::PerSlide,
            PolicyArg::GlobalCap => ExtractionPolicy::GlobalCap,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.inspect_only {
        Some(CliProgressCallback::new() as Arc<dyn ReportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = cli
            .input
            .as_deref()
            .context("--inspect-only needs a .pptx input")?;
        let found = inspect(input, &config)
            .await
            .context("Failed to inspect presentation")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&found).context("Failed to serialise inspection")?
            );
        } else {
            let meta = &found.metadata;
            let ex = &found.extraction;
            println!("File:         {input}");
            if let Some(ref t) = meta.title {
                println!("Title:        {t}");
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {a}");
            }
            println!("Slides:       {} ({} scanned)", meta.slide_count, ex.slides_scanned);
            println!("Images:       {}", ex.image_count);
            println!("Tables:       {}", ex.table_count());
            for img in ex.images() {
                println!(
                    "  slide {:>3}  {}x{}  {:.0} KB",
                    img.slide, img.width, img.height, img.size_kb
                );
            }
            for w in &ex.warnings {
                println!("  {} {}", yellow("!"), w);
            }
        }
        return Ok(());
    }

    // ── Run the pipeline ─────────────────────────────────────────────────
    let output = match cli.input.as_deref() {
        Some(input) => generate_report(input, &config).await,
        None => generate_report_from_images(&cli.images, &config).await,
    }
    .context("Report generation failed")?;

    if let Some(ref dir) = cli.output {
        let stem = export_stem(&cli, &output);
        let paths = write_exports(&output, dir, &stem)
            .await
            .context("Failed to write exports")?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&paths.complete.display().to_string()));
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.report.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.report.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        let s = &output.stats;
        eprintln!(
            "   {} call(s)  {} tokens in  /  {} tokens out  —  {}ms total",
            s.model_calls,
            dim(&s.total_input_tokens.to_string()),
            dim(&s.total_output_tokens.to_string()),
            s.total_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .batch_size(cli.batch_size)
        .extraction_policy(cli.policy.clone().into())
        .report_language(cli.language.clone())
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--name`, else the input's file name without extension.
fn export_stem(cli: &Cli, output: &ReportOutput) -> String {
    if let Some(ref name) = cli.name {
        return name.clone();
    }
    if cli.input.is_none() {
        return "images_report".to_string();
    }
    Path::new(&output.source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("report")
        .to_string()
}
