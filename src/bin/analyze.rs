//! One-shot command-line analysis of a local PDF.
//!
//! Summarizes the document, or answers `--query` with map-reduce, using the same pipeline and
//! configuration as the HTTP and MCP servers. The result goes to stdout; logs go to the log file.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use docanalyzer::{
    config::{self, ChainOverrides, ModelProvider},
    document::PageRange,
    logging,
    processing::{AnalysisMode, AnalysisRequest, AnalysisService, Upload},
};

#[derive(Parser)]
#[command(
    name = "analyze",
    about = "Summarize a PDF or answer a question about it"
)]
struct Cli {
    /// PDF to analyze.
    file: PathBuf,
    /// Question to answer; summarizes the document when omitted.
    #[arg(long)]
    query: Option<String>,
    /// First page to include (0-based; negative counts from the end).
    #[arg(long, allow_negative_numbers = true)]
    start_page: Option<i64>,
    /// Page after the last one to include (exclusive; -1 drops the last page).
    #[arg(long, allow_negative_numbers = true)]
    end_page: Option<i64>,
    /// Chat model override.
    #[arg(long)]
    model: Option<String>,
    /// Sampling temperature override (0.0 to 1.0).
    #[arg(long)]
    temperature: Option<f32>,
    /// Endpoint base URL override.
    #[arg(long)]
    base_url: Option<String>,
    /// Endpoint protocol override (`openai` or `ollama`).
    #[arg(long, value_parser = parse_provider)]
    provider: Option<ModelProvider>,
}

fn parse_provider(value: &str) -> Result<ModelProvider, String> {
    value
        .parse()
        .map_err(|()| format!("unknown provider '{value}' (expected 'openai' or 'ollama')"))
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing(logging::LogTarget::FileOnly);

    let service = AnalysisService::new(config::get_config())
        .context("failed to initialize the chat model client")?;
    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let file_name = cli
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let mode = match cli.query {
        Some(query) => AnalysisMode::Query { query },
        None => AnalysisMode::Summarize,
    };
    let request = AnalysisRequest {
        upload: Upload { file_name, bytes },
        mode,
        page_range: PageRange::new(cli.start_page, cli.end_page),
        overrides: ChainOverrides {
            provider: cli.provider,
            model: cli.model,
            temperature: cli.temperature,
            base_url: cli.base_url,
            api_key: None,
        },
    };

    let outcome = service.run(request).await.context("analysis failed")?;
    println!("{}", outcome.text);
    println!();
    println!(
        "Processing time: {:.2} seconds ({} pages, {} model calls)",
        outcome.elapsed.as_secs_f64(),
        outcome.pages,
        outcome.model_calls
    );
    Ok(())
}
