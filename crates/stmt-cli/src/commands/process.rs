//! Process command - extract transactions from a single statement file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use stmt_core::{NormalizedTable, PipelineReport, Stage};

use super::{build_pipeline, load_config, load_document};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or spreadsheet)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Mark the document as scanned
    #[arg(long)]
    scanned: bool,

    /// Print how the table was produced
    #[arg(long)]
    show_report: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON array of rows
    Json,
    /// CSV with a header row
    Csv,
    /// Aligned plain-text table
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Reading document...");

    let document = load_document(&args.input, args.scanned)?;
    let pipeline = build_pipeline(&config)?;

    pb.set_message("Extracting transactions...");
    let (table, report) = pipeline.process_with_report(&document, args.scanned).await;
    pb.finish_and_clear();

    let output = format_table(&table, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} rows written to {}",
            style("✓").green(),
            table.len(),
            output_path.display()
        );
    } else {
        print!("{}", output);
    }

    if args.show_report {
        print_report(&report);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn print_report(report: &PipelineReport) {
    let stage = match report.stage {
        Stage::Failed => style("failed").red(),
        _ if report.failure.is_some() => style("done (empty)").yellow(),
        _ => style("done").green(),
    };

    eprintln!();
    eprintln!("{} Stage: {}", style("ℹ").blue(), stage);
    eprintln!("{} Format: {}", style("ℹ").blue(), report.format);
    if let Some(method) = report.acquisition {
        eprintln!("{} Text: {:?}, {} characters", style("ℹ").blue(), method, report.text_length);
    }
    if let Some(source) = report.source {
        eprintln!("{} Rows: {} from {:?}", style("ℹ").blue(), report.rows, source);
    }
    if let Some(reason) = &report.fallback_reason {
        eprintln!("{} Fallback reason: {}", style("⚠").yellow(), reason);
    }
    if let Some(failure) = &report.failure {
        eprintln!("{} {}", style("✗").red(), failure);
    }
    eprintln!("{} Processing time: {}ms", style("ℹ").blue(), report.elapsed_ms);
}

pub fn format_table(table: &NormalizedTable, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(table)?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Csv => format_csv(table),
        OutputFormat::Text => Ok(format_text(table)),
    }
}

fn format_csv(table: &NormalizedTable) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.values())?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(table: &NormalizedTable) -> String {
    let columns = table.columns();
    let mut widths = columns.map(|c| c.chars().count());
    for row in table.rows() {
        for (width, value) in widths.iter_mut().zip(row.values()) {
            *width = (*width).max(value.chars().count());
        }
    }

    let line = |cells: [&str; 7]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut output = line(columns);
    output.push_str(&line(widths.map(|w| "-".repeat(w)).each_ref().map(String::as_str)));
    for row in table.rows() {
        output.push_str(&line(row.values()));
    }
    output.push_str(&format!("\n{} transactions\n", table.len()));

    output
}
