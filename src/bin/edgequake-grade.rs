//! CLI binary for edgequake-grade.
//!
//! A thin shim over the library crate: maps flags to `GraderConfig`, then
//! either serves the HTTP API or runs one grading/extraction locally.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_grade::{
    AppState, GraderConfig, GraderConfigBuilder, GradingPipeline, PdfiumRasteriser, Submission,
    TesseractEngine, TextExtractor,
};
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the grading API on :5000
  edgequake-grade serve

  # Grade one answer sheet locally
  edgequake-grade grade answers.pdf --rubric-file rubric.txt

  # JSON output, same shape as POST /grade
  edgequake-grade grade answers.pdf --rubric-file rubric.txt --json

  # See what the OCR stage reads (no API key needed)
  edgequake-grade extract answers.pdf

  # Smoke-test the server
  curl -F student_answer_pdf=@answers.pdf -F rubric="Q1: 5pts ..." \
       http://localhost:5000/grade

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required for serve/grade)
  GRADER_MODEL            Override model ID
  GRADER_DPI              Rendering DPI
  GRADER_OCR_LANGUAGE     Tesseract language profile
  TESSERACT_CMD           Tesseract executable
  GEMINI_API_BASE_URL     Override the Gemini REST endpoint
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                tracing filter, overrides --verbose

  A .env file in the working directory is loaded first.
"#;

/// Grade scanned PDF answer sheets against a rubric.
#[derive(Parser, Debug)]
#[command(
    name = "edgequake-grade",
    version,
    about = "Grade scanned PDF answer sheets against a rubric with OCR + Gemini",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Gemini model ID.
    #[arg(long, global = true, env = "GRADER_MODEL")]
    model: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, global = true, env = "GRADER_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,

    /// Tesseract language profile (e.g. eng, eng+fra).
    #[arg(long, global = true, env = "GRADER_OCR_LANGUAGE")]
    ocr_language: Option<String>,

    /// Tesseract executable.
    #[arg(long, global = true, env = "TESSERACT_CMD")]
    tesseract_cmd: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, global = true, env = "GEMINI_API_BASE_URL", hide = true)]
    api_base_url: Option<String>,

    /// Client-side timeout for the model call, in seconds.
    #[arg(long, global = true, env = "GRADER_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "GRADER_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (POST /grade, GET /health).
    Serve {
        /// Address to bind.
        #[arg(long, env = "GRADER_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to bind.
        #[arg(short, long, env = "GRADER_PORT", default_value_t = 5000)]
        port: u16,

        /// Maximum upload size in MiB.
        #[arg(long, env = "GRADER_MAX_UPLOAD_MB", default_value_t = 50)]
        max_upload_mb: usize,
    },

    /// Grade one local PDF and print the evaluation.
    Grade {
        /// Answer sheet PDF.
        pdf: PathBuf,

        /// File holding the rubric text.
        #[arg(short, long)]
        rubric_file: PathBuf,

        /// Print `{"evaluation": ...}` instead of plain text.
        #[arg(long)]
        json: bool,
    },

    /// OCR a local PDF and print the annotated page text.
    Extract {
        /// PDF to read.
        pdf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; the environment may already be populated.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    // First run downloads the library (~30 MB) into the pdfium-auto cache;
    // later runs only check the path.
    if !pdfium_auto::is_pdfium_cached() {
        info!("Downloading PDFium engine (first run)...");
    }
    tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
        .context("Failed to download PDFium engine")?;

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload_mb,
        } => {
            let config = config_builder(&cli.global)
                .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024))
                .build()
                .context("Invalid configuration")?;
            info!(model = %config.model, dpi = config.dpi, "Starting grading server");

            let pipeline = GradingPipeline::from_config(&config)
                .context("Failed to initialise grading pipeline")?;
            let state = AppState::new(pipeline);

            edgequake_grade::serve(SocketAddr::new(host, port), state, config.max_upload_bytes)
                .await
                .context("Server error")?;
        }

        Command::Grade {
            pdf,
            rubric_file,
            json,
        } => {
            let config = config_builder(&cli.global)
                .build()
                .context("Invalid configuration")?;
            let pipeline = GradingPipeline::from_config(&config)
                .context("Failed to initialise grading pipeline")?;

            let submission = Submission::from_files(&pdf, &rubric_file)
                .await
                .with_context(|| {
                    format!(
                        "Failed to read {} / {}",
                        pdf.display(),
                        rubric_file.display()
                    )
                })?;
            let evaluation = pipeline.grade(submission).await.context("Grading failed")?;

            if json {
                let out = serde_json::to_string_pretty(&evaluation)
                    .context("Failed to serialise evaluation")?;
                println!("{out}");
            } else {
                write_stdout(&evaluation.evaluation)?;
            }
        }

        Command::Extract { pdf } => {
            let config = config_builder(&cli.global)
                .build_for_extraction()
                .context("Invalid configuration")?;
            let rasteriser =
                PdfiumRasteriser::bind(&config).context("Failed to bind PDFium engine")?;
            let extractor = TextExtractor::new(
                Arc::new(rasteriser),
                Arc::new(TesseractEngine::from_config(&config)),
            );

            let bytes = tokio::fs::read(&pdf)
                .await
                .with_context(|| format!("Failed to read {}", pdf.display()))?;
            let text = extractor.extract(bytes).await.context("Extraction failed")?;

            if text.is_blank() {
                eprintln!(
                    "warning: no text detected across {} pages",
                    text.page_count()
                );
            }
            write_stdout(&text.annotated())?;
        }
    }

    Ok(())
}

/// Map global flags onto a builder. The API key always comes from the
/// environment.
fn config_builder(args: &GlobalArgs) -> GraderConfigBuilder {
    let mut builder = GraderConfig::builder();

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(dpi) = args.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(ref lang) = args.ocr_language {
        builder = builder.ocr_language(lang);
    }
    if let Some(ref cmd) = args.tesseract_cmd {
        builder = builder.tesseract_cmd(cmd);
    }
    if let Some(ref url) = args.api_base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }

    builder
}

fn write_stdout(text: &str) -> Result<()> {
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
