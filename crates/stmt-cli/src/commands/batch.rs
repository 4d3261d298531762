//! Batch processing command for multiple statement files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use stmt_core::{DocumentFormat, PipelineReport, Stage};

use super::process::{OutputFormat, format_table};
use super::{CliPipeline, build_pipeline, load_config, load_document};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Treat every document as scanned
    #[arg(long)]
    scanned: bool,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,
}

/// Outcome for one file.
struct FileResult {
    path: PathBuf,
    report: Option<PipelineReport>,
    error: Option<String>,
    output: Option<PathBuf>,
}

impl FileResult {
    /// Pipeline finished and the output, if requested, was written.
    fn succeeded(&self) -> bool {
        self.error.is_none() && matches!(&self.report, Some(r) if r.stage == Stage::Done)
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| DocumentFormat::from_path(p).is_supported())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pipeline = build_pipeline(&config)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files",
            )?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let result = process_file(&pipeline, &path, &args).await;
        if let Some(error) = &result.error {
            warn!("Failed to process {}: {}", path.display(), error);
        }
        results.push(result);
        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let (successful, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.succeeded());

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            let reason = result
                .error
                .as_deref()
                .or_else(|| result.report.as_ref().and_then(|r| r.failure.as_deref()))
                .unwrap_or("unknown error");
            println!("  - {}: {}", result.path.display(), reason);
        }
    }

    Ok(())
}

/// Run one file through the pipeline and write its table.
async fn process_file(pipeline: &CliPipeline, path: &Path, args: &BatchArgs) -> FileResult {
    let mut result = FileResult {
        path: path.to_path_buf(),
        report: None,
        error: None,
        output: None,
    };

    let document = match load_document(path, args.scanned) {
        Ok(document) => document,
        Err(e) => {
            result.error = Some(format!("{:#}", e));
            return result;
        }
    };

    let (table, report) = pipeline.process_with_report(&document, args.scanned).await;
    result.report = Some(report);

    if let Some(output_dir) = &args.output_dir {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("statement");
        let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));

        let written = format_table(&table, args.format)
            .and_then(|content| Ok(fs::write(&output_path, content)?));
        match written {
            Ok(()) => {
                debug!("Wrote output to {}", output_path.display());
                result.output = Some(output_path);
            }
            Err(e) => {
                result.error = Some(format!("failed to write {}: {}", output_path.display(), e));
            }
        }
    }

    result
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let processed_at = Local::now().to_rfc3339();

    wtr.write_record([
        "filename",
        "status",
        "acquisition",
        "source",
        "rows",
        "fallback_reason",
        "error",
        "output",
        "processing_time_ms",
        "processed_at",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let output = result
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match &result.report {
            Some(report) => {
                let status = if result.succeeded() { "done" } else { "failed" };
                let error = result
                    .error
                    .as_deref()
                    .or(report.failure.as_deref())
                    .unwrap_or("");
                wtr.write_record([
                    filename,
                    status,
                    &label(&report.acquisition),
                    &label(&report.source),
                    &report.rows.to_string(),
                    report.fallback_reason.as_deref().unwrap_or(""),
                    error,
                    &output,
                    &report.elapsed_ms.to_string(),
                    &processed_at,
                ])?;
            }
            None => {
                wtr.write_record([
                    filename,
                    "error",
                    "",
                    "",
                    "0",
                    "",
                    result.error.as_deref().unwrap_or(""),
                    "",
                    "",
                    &processed_at,
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Snake-case serde name of an optional enum value.
fn label<T: serde::Serialize>(value: &Option<T>) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
