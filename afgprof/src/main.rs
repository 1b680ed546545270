//! # afgprof - Main Entry Point
//!
//! Reads a profile directory (`maps` + call log), symbolizes every call
//! address and writes the JSON call-count report to stdout or `--output`.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter};

use afgprof::cli::Args;
use afgprof::pipeline;
use afgprof::preflight::run_preflight_checks;

// Exit codes (usage errors exit with 2 from clap)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.run_config();

    run_preflight_checks(&config)?;
    info!(
        "afgprof v{}: {} ({:?} backend, {} workers per object)",
        env!("CARGO_PKG_VERSION"),
        config.input_dir.display(),
        config.backend,
        config.concurrency
    );

    let report = pipeline::run(&config)?;
    info!(
        "{} call pairs, {} of {} addresses symbolized, {} misses",
        report.calls.len(),
        report.resolved_count(),
        report.index.len(),
        report.misses
    );

    match args.output {
        Some(ref path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create report file {}", path.display()))?;
            report.write_json(BufWriter::new(file), args.pretty).context("Failed to export report")?;
            info!("saved: {}", path.display());
        }
        None => {
            report.write_json(io::stdout().lock(), args.pretty).context("Failed to export report")?;
        }
    }

    Ok(())
}
