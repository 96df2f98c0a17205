//! Greedy diversity sampling over a fixed, prioritized list of projections.
//!
//! Given more candidates than can be shown, the [`Pruner`] picks a bounded subset that covers as
//! many distinct projection values as it can:
//!
//! 1. If there are no more candidates than the bound, all of them are kept.
//! 2. For each projection in priority order, candidates are scanned in input order and any
//!    candidate whose value for that projection has not been seen yet is selected. Selecting a
//!    candidate marks all of its projection values as seen.
//! 3. Remaining slots are filled with unselected candidates in input order.
//!
//! The output keeps the candidates' relative input order. This is a coverage heuristic, not an
//! exact set cover; candidates earlier in the input win ties. Running one pass per projection
//! differs from a single pass that takes any candidate with some unseen value: higher-priority
//! projections are covered before lower ones get a slot.
mod bidirectional;

use std::collections::HashSet;
use std::hash::Hash;

use tracing::{
    debug,
    instrument,
};

pub use self::bidirectional::{
    BidirectionalTracePruner,
    TraceFeature,
    DEFAULT_MAX_TRACES,
};

/// Maps a candidate to one of the values the pruner tries to diversify.
pub type Projection<T, V> = Box<dyn Fn(&T) -> V + Send + Sync>;

/// Selects a diverse, bounded subset of candidates.
pub struct Pruner<T, V> {
    projections: Vec<Projection<T, V>>,
}

impl<T, V: Hash + Eq> Pruner<T, V> {
    /// Creates a pruner over `projections`, highest priority first.
    #[must_use]
    pub fn new(projections: Vec<Projection<T, V>>) -> Self {
        Self { projections }
    }

    /// Keeps at most `max_size` of `candidates`.
    #[instrument(skip_all, fields(candidates = candidates.len(), max_size = max_size))]
    pub fn prune(&self, candidates: Vec<T>, max_size: usize) -> Vec<T> {
        if candidates.len() <= max_size {
            debug!("nothing to prune");
            return candidates;
        }

        let values: Vec<Vec<V>> = candidates
            .iter()
            .map(|candidate| self.projections.iter().map(|project| project(candidate)).collect())
            .collect();
        let mut seen: Vec<HashSet<&V>> = self.projections.iter().map(|_| HashSet::new()).collect();
        let mut selected = vec![false; candidates.len()];
        let mut count = 0;

        for priority in 0..self.projections.len() {
            for (i, candidate_values) in values.iter().enumerate() {
                if count == max_size {
                    break;
                }
                if selected[i] || seen[priority].contains(&candidate_values[priority]) {
                    continue;
                }
                selected[i] = true;
                count += 1;
                for (seen_values, value) in seen.iter_mut().zip(candidate_values) {
                    seen_values.insert(value);
                }
            }
            debug!(priority, count, distinct = seen[priority].len(), "coverage pass done");
        }

        for is_selected in selected.iter_mut().filter(|s| !**s) {
            if count == max_size {
                break;
            }
            *is_selected = true;
            count += 1;
        }

        candidates
            .into_iter()
            .zip(selected)
            .filter_map(|(candidate, keep)| keep.then_some(candidate))
            .collect()
    }
}

#[cfg(test)]
mod tests;
