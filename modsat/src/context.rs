//! Central solver data structure.
use partial_ref::{part, PartialRefTarget};

use crate::bool_vars::BoolVars;
use crate::clause::ClauseDb;
use crate::config::SolverConfig;
use crate::conflict::ConflictCore;
use crate::constraint::Constraints;
use crate::decision::activity::VarQueue;
use crate::search::Search;
use crate::state::SolverState;
use crate::stats::Stats;
use crate::vars::Vars;
use crate::viable::Viable;

/// Part declarations for the [`Context`] struct.
mod parts {
    use super::*;

    part!(pub BoolVarsP: BoolVars);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ConfigP: SolverConfig);
    part!(pub ConflictP: ConflictCore);
    part!(pub ConstraintsP: Constraints);
    part!(pub SearchP: Search);
    part!(pub SolverStateP: SolverState);
    part!(pub StatsP: Stats);
    part!(pub VarQueueP: VarQueue);
    part!(pub VarsP: Vars);
    part!(pub ViableP: Viable);
}

pub use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Most functions
/// operating on multiple fields of the context use partial references
/// provided by the `partial_ref` crate. This documents the data
/// dependencies and makes the borrow checker happy without the overhead
/// of passing individual references.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(BoolVarsP)]
    bool_vars: BoolVars,
    #[part(ClauseDbP)]
    clause_db: ClauseDb,
    #[part(ConfigP)]
    config: SolverConfig,
    #[part(ConflictP)]
    conflict: ConflictCore,
    #[part(ConstraintsP)]
    constraints: Constraints,
    #[part(SearchP)]
    search: Search,
    #[part(SolverStateP)]
    solver_state: SolverState,
    #[part(StatsP)]
    stats: Stats,
    #[part(VarQueueP)]
    var_queue: VarQueue,
    #[part(VarsP)]
    vars: Vars,
    #[part(ViableP)]
    viable: Viable,
}
