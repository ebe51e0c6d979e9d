//! tex2pdf - compile a LaTeX document to PDF with structured diagnostics.
//!
//! Thin wrapper over `tex2pdf-core`. Exit codes:
//! - `0` — success, PDF produced
//! - `1` — usage/environment error (bad input, engine unresolvable)
//! - `2` — compilation failed (including timeout)

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tex2pdf_core::{init_tracing, CompileResult, Compiler, Engine, EngineConfig, Severity};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tex2pdf")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile LaTeX documents to PDF with structured error reporting", long_about = None)]
struct Cli {
    /// Path to the input .tex file
    input: PathBuf,

    /// Output directory for generated files
    #[arg(short, long, default_value = "./output")]
    outdir: PathBuf,

    /// LaTeX engine to use (tectonic or latexmk); auto-detected when omitted
    #[arg(short, long, value_parser = parse_engine)]
    engine: Option<Engine>,

    /// Emit the compile result as a single JSON object
    #[arg(long)]
    json: bool,

    /// Maximum compilation time in seconds
    #[arg(short, long, default_value_t = 120)]
    timeout: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit log lines as JSON (logs always go to stderr)
    #[arg(long)]
    log_json: bool,
}

fn parse_engine(s: &str) -> Result<Engine, String> {
    s.parse().map_err(|e: tex2pdf_core::UnknownEngine| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.log_json, level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let compiler = Compiler::new();
    let result = compiler
        .compile(
            &cli.input,
            &cli.outdir,
            cli.engine.map(EngineConfig::new),
            Duration::from_secs(cli.timeout),
        )
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_human(&result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn print_human(result: &CompileResult) {
    if result.success {
        if let Some(pdf) = &result.pdf_path {
            println!("OK: {}", pdf.display());
        }
        for diag in &result.diagnostics {
            print_diagnostic(diag);
        }
    } else {
        eprintln!(
            "Compilation failed ({}, exit code {}).",
            result.engine, result.return_code
        );
        for diag in &result.diagnostics {
            print_diagnostic(diag);
        }
    }
}

fn print_diagnostic(diag: &tex2pdf_core::Diagnostic) {
    let marker = match diag.level {
        Severity::Error => "ERROR",
        Severity::Warning => "WARNING",
    };
    eprintln!("{marker} [{}]: {}", diag.code, diag.message);

    let excerpt: String = diag.raw.chars().take(200).collect();
    if !excerpt.is_empty() {
        eprintln!("  raw: {excerpt}");
    }
}
