//! Solver configuration.

/// Configurable parameters used during solving.
pub struct SolverConfig {
    /// Abort `check_sat` with an indeterminate answer after this many
    /// conflicts.
    pub max_conflicts: u64,

    /// Abort `check_sat` with an indeterminate answer after this many
    /// decisions.
    pub max_decisions: u64,

    /// Widths up to this many bits may be narrowed by evaluating a
    /// univariate constraint over the whole domain.
    pub enum_bits: u32,

    /// Bound on the number of ranges materialized when the solution set
    /// of a linear congruence is intersected into a viable set.
    pub max_linear_ranges: usize,

    /// Multiplicative decay for variable activities.
    pub activity_decay: f32,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            max_conflicts: u64::max_value(),
            max_decisions: u64::max_value(),
            enum_bits: 12,
            max_linear_ranges: 64,
            activity_decay: 0.95,
        }
    }
}
