//! docex - extract structured data from document images.
//!
//! ```text
//! docex --config docex.yaml --kind receipt scans/*.jpg
//! ```
//!
//! Prints one JSON object per file, in argument order, and exits non-zero if
//! any file failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use docex::{DocexConfig, Document, DocumentKind, PipelineError, ProcessingResult};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "docex", version, about = "Extract structured data from document images")]
struct Cli {
    /// YAML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document kind: check, receipt, or any kind registered by the caller.
    #[arg(short, long, default_value = "receipt")]
    kind: DocumentKind,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,

    /// Image files to process.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match &cli.config {
        Some(path) => DocexConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut config = DocexConfig::default();
            config.apply_overrides_from(|key| std::env::var(key).ok());
            config.validate()?
        }
    };
    let processor = config
        .http_processor()
        .context("building service clients")?;

    let mut outputs: Vec<Option<Value>> = vec![None; cli.files.len()];
    let mut items = Vec::with_capacity(cli.files.len());
    let mut slots = Vec::with_capacity(cli.files.len());
    for (index, path) in cli.files.iter().enumerate() {
        match Document::from_path(path) {
            Ok(document) => {
                items.push((document, cli.kind.clone()));
                slots.push(index);
            }
            Err(err) => {
                outputs[index] = Some(json!({
                    "file": path.display().to_string(),
                    "status": "error",
                    "stage": "input",
                    "error": err.to_string(),
                }));
            }
        }
    }

    let results = processor.process_batch(&items).await;
    for (index, result) in slots.into_iter().zip(results) {
        outputs[index] = Some(render(&cli.files[index], result));
    }

    let mut failed = false;
    for output in outputs.into_iter().flatten() {
        failed |= output["status"] != "success";
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docex=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn render(path: &std::path::Path, result: Result<ProcessingResult, PipelineError>) -> Value {
    let file = path.display().to_string();
    match result {
        Ok(result) => json!({
            "file": file,
            "status": "success",
            "result": result,
        }),
        Err(err) => json!({
            "file": file,
            "status": "error",
            "stage": err.stage_label(),
            "error": err.to_string(),
            "issues": err.issues(),
        }),
    }
}
