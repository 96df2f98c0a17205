//! The end-to-end selection run: load, deduplicate, prune, write.
use std::path::PathBuf;

use anyhow::Result;
use ft_core::BidirectionalTrace;
use itertools::Itertools;
use tracing::{
    info,
    instrument,
};

use crate::io::{
    create_timestamped_output_dir,
    load_traces,
    write_selected_traces,
};
use crate::pruner::BidirectionalTracePruner;

/// Options for one selection run.
#[derive(Clone, Debug)]
pub struct SelectionConfig {
    /// Trace files to read, JSON or `MessagePack`.
    pub inputs: Vec<PathBuf>,
    /// Upper bound on the number of traces kept.
    pub max_traces: usize,
    /// Directory the timestamped run directory is created under.
    pub output_dir: PathBuf,
}

/// What a selection run produced.
#[derive(Debug)]
pub struct SelectionOutcome {
    /// The run's timestamped output directory.
    pub output_dir: PathBuf,
    /// Traces read, before deduplication.
    pub loaded: usize,
    /// Distinct logical outcomes (trace keys) among the loaded traces.
    pub distinct_keys: usize,
    /// The traces kept, in input order.
    pub selected: Vec<BidirectionalTrace>,
}

/// Loads every input, drops exact duplicates, keeps a diverse subset of at most
/// `config.max_traces` traces, and writes it to a fresh output directory.
///
/// # Errors
///
/// Fails if an input cannot be loaded or the output cannot be written.
#[instrument(skip_all, fields(inputs = config.inputs.len(), max_traces = config.max_traces))]
pub fn run(config: &SelectionConfig) -> Result<SelectionOutcome> {
    let mut traces = Vec::new();
    for path in &config.inputs {
        traces.extend(load_traces(path)?);
    }
    let loaded = traces.len();
    let traces: Vec<_> = traces.into_iter().unique().collect();
    let distinct_keys = traces.iter().map(BidirectionalTrace::key).unique().count();
    info!(loaded, unique = traces.len(), distinct_keys, "traces loaded");

    let selected = BidirectionalTracePruner::new().prune(traces, config.max_traces);
    info!(selected = selected.len(), "traces selected");

    let output_dir = create_timestamped_output_dir(&config.output_dir)?;
    let path = write_selected_traces(&output_dir, &selected)?;
    info!("selection written to {}", path.display());

    Ok(SelectionOutcome { output_dir, loaded, distinct_keys, selected })
}
