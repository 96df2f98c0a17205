#![deny(clippy::nursery, clippy::pedantic)]
//! `ftselect`: pick a diverse subset of bidirectional flow traces.
//!
//! Reads one or more files of bidirectional traces (JSON or `MessagePack`), keeps at most
//! `--max-traces` of them, and writes the selection to a timestamped directory under
//! `--output-dir`. See `ftselect --help`.
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ft_core::logging;
use ft_select::{
    run,
    SelectionConfig,
    DEFAULT_MAX_TRACES,
};
use tracing::info;

/// Select a diverse subset of bidirectional flow traces for presentation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files of bidirectional traces, serialized as JSON or `MessagePack`.
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Maximum number of traces to keep.
    #[arg(short, long, default_value_t = DEFAULT_MAX_TRACES)]
    max_traces: usize,

    /// Directory under which the timestamped run directory is created.
    #[arg(short, long, default_value = "runs")]
    output_dir: PathBuf,

    /// Logging verbosity level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    /// Print the selected traces in human-readable form.
    #[arg(long)]
    render: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup(&cli.verbosity);

    let config = SelectionConfig { inputs: cli.input, max_traces: cli.max_traces, output_dir: cli.output_dir };
    let outcome = run(&config)?;
    info!(
        "kept {} of {} traces ({} distinct outcomes) in {}",
        outcome.selected.len(),
        outcome.loaded,
        outcome.distinct_keys,
        outcome.output_dir.display()
    );

    if cli.render {
        for (i, trace) in outcome.selected.iter().enumerate() {
            println!("=== trace {} ===\n{trace}\n", i + 1);
        }
    }
    Ok(())
}
