use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use sqlite_scavenger::page::CellLayout;
use sqlite_scavenger::writer::{self, WriteOptions};
use sqlite_scavenger::{recover, RecoveryReport};
use std::path::PathBuf;
use std::process::ExitCode;

/// Forensic recovery of tabular records from a SQLite 3 database image.
#[derive(Debug, Parser)]
#[command(name = "sqlite-scavenger", version, about)]
struct Cli {
    /// Path to the (possibly damaged) SQLite database image.
    input: PathBuf,

    /// Path to write the recovered output to.
    output: PathBuf,

    /// Output format: a fresh SQLite database, or delimited text.
    #[arg(long, value_enum, default_value_t = OutputFormatArg::Sqlite)]
    format: OutputFormatArg,

    /// Field delimiter used by the text output format.
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Sniff recovered blobs for recognized image formats and write them out
    /// to this directory, replacing the column value with the file name.
    #[arg(long, value_name = "DIR")]
    extract_images: Option<PathBuf>,

    /// Read table-interior cells using the canonical SQLite layout (bare
    /// left-child pointer + key, no payload) instead of the default
    /// heuristic that treats them like leaf cells.
    #[arg(long)]
    canonical_interior_cells: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Sqlite,
    Text,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let image = std::fs::read(&cli.input)
        .with_context(|| format!("reading input image {}", cli.input.display()))?;

    let layout = if cli.canonical_interior_cells {
        CellLayout::Canonical
    } else {
        CellLayout::Heuristic
    };

    let report = recover(&image, layout)
        .with_context(|| format!("parsing header of {}", cli.input.display()))?;

    print_summary(&report);

    let options = WriteOptions {
        extract_images: cli.extract_images,
    };

    match cli.format {
        OutputFormatArg::Sqlite => writer::write_sqlite_image(&cli.output, &report.records, &options)
            .with_context(|| format!("writing recovered SQLite image to {}", cli.output.display()))?,
        OutputFormatArg::Text => writer::write_text(&cli.output, &report.records, cli.delimiter, &options)
            .with_context(|| format!("writing recovered text output to {}", cli.output.display()))?,
    }

    if report.is_empty() {
        eprintln!("no records recovered");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &RecoveryReport) {
    println!(
        "recovered {} record(s) across {} page(s) swept, {} page(s) visited via the free list",
        report.records.len(),
        report.pages_swept,
        report.freelist_pages_visited.len()
    );
    for diagnostic in &report.diagnostics {
        println!("diagnostic: {diagnostic}");
    }
}
