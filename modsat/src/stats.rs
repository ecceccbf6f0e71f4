//! Solving statistics.

/// Counters exposed through the solver API.
#[derive(Copy, Clone, Default, Debug)]
pub struct Stats {
    /// Iterations of the main solving loop.
    pub iterations: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    /// Conflicts where no explainer could eliminate the pivot variable
    /// and a weaker lemma was learned instead.
    pub bailouts: u64,
}
