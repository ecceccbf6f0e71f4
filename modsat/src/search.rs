//! Search stack and undo trail.
//!
//! The search stack is the interleaved sequence of integer assignments
//! and boolean assignments in solver order; the trail logs every
//! reversible operation. `pop_levels` replays the trail backwards until
//! the requested number of level bumps has been undone, then re-queues
//! boolean assignments whose reasons survived the backjump.
use partial_ref::{partial, PartialRef};

use log::{debug, trace};

use modsat_poly::{PVar, Val, ValSet};

use crate::context::{
    BoolVarsP, ClauseDbP, ConfigP, ConflictP, ConstraintsP, Context, SearchP, StatsP, VarQueueP,
    VarsP, ViableP,
};
use crate::lit::BLit;
use crate::prop;

/// One entry of the search stack.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchItem {
    Assignment { var: PVar, val: Val },
    Boolean { lit: BLit },
}

/// One reversible operation on the trail.
pub enum TrailInstr {
    IncLevel,
    AddVar,
    Assign,
    AssignBool,
    Viable { var: PVar, prev: ValSet },
    Cjust { var: PVar },
    QHead { prev: usize },
}

#[derive(Default)]
pub struct Search {
    items: Vec<SearchItem>,
    /// The integer assignments of `items`, in order, for substitution.
    asn: Vec<(PVar, Val)>,
    /// Next item to propagate.
    qhead: usize,
    trail: Vec<TrailInstr>,
    level: u32,
    /// User scopes; conflicts below the innermost entry are final.
    base_levels: Vec<u32>,
}

impl Search {
    pub fn items(&self) -> &[SearchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn base_level(&self) -> u32 {
        self.base_levels.last().cloned().unwrap_or(0)
    }

    pub fn at_base_level(&self) -> bool {
        self.level == self.base_level()
    }

    /// The current integer assignment in stack order.
    pub fn assignment(&self) -> &[(PVar, Val)] {
        &self.asn
    }

    /// The assignment with one variable masked out, as used when
    /// explaining a conflict pivoting on that variable.
    pub fn assignment_without(&self, v: PVar) -> Vec<(PVar, Val)> {
        self.asn.iter().cloned().filter(|&(u, _)| u != v).collect()
    }

    pub fn push_level(&mut self) {
        self.level += 1;
        self.trail.push(TrailInstr::IncLevel);
    }

    /// Open a user scope; conflicts at or below the new level are final.
    pub fn push_user_scope(&mut self) {
        self.push_level();
        self.base_levels.push(self.level);
    }

    /// Close `num` user scopes, returning the level to pop back to.
    pub fn pop_user_scopes(&mut self, num: usize) -> u32 {
        debug_assert!(num >= 1 && num <= self.base_levels.len());
        let target = self.base_levels[self.base_levels.len() - num];
        self.base_levels.truncate(self.base_levels.len() - num);
        target - 1
    }

    pub fn push_assignment(&mut self, var: PVar, val: Val) {
        self.items.push(SearchItem::Assignment { var, val });
        self.asn.push((var, val));
        self.trail.push(TrailInstr::Assign);
    }

    pub fn push_boolean(&mut self, lit: BLit) {
        self.items.push(SearchItem::Boolean { lit });
        self.trail.push(TrailInstr::AssignBool);
    }

    pub fn log_add_var(&mut self) {
        self.trail.push(TrailInstr::AddVar);
    }

    pub fn log_viable(&mut self, var: PVar, prev: ValSet) {
        self.trail.push(TrailInstr::Viable { var, prev });
    }

    pub fn log_cjust(&mut self, var: PVar) {
        self.trail.push(TrailInstr::Cjust { var });
    }

    pub fn can_propagate(&self) -> bool {
        self.qhead < self.items.len()
    }

    /// Log the queue head once per propagation round.
    pub fn log_qhead(&mut self) {
        self.trail.push(TrailInstr::QHead { prev: self.qhead });
    }

    pub fn next_queued(&mut self) -> Option<SearchItem> {
        let item = self.items.get(self.qhead).cloned();
        if item.is_some() {
            self.qhead += 1;
        }
        item
    }
}

/// Undo `num_levels` levels of the trail.
///
/// Boolean assignments whose constraint's storage level survives the
/// backjump keep their value and are replayed at the target level: their
/// reason clauses are still valid, only the narrowing they performed was
/// lost with the popped viable snapshots.
pub fn pop_levels(
    mut ctx: partial!(
        Context,
        mut BoolVarsP,
        mut ClauseDbP,
        mut ConflictP,
        mut ConstraintsP,
        mut SearchP,
        mut StatsP,
        mut VarQueueP,
        mut VarsP,
        mut ViableP,
        ConfigP,
    ),
    num_levels: u32,
) {
    let target = ctx.part(SearchP).level - num_levels;
    debug!(
        "pop {} levels (lvl {} -> {})",
        num_levels,
        ctx.part(SearchP).level,
        target
    );
    let mut replay = vec![];
    let mut remaining = num_levels;
    while remaining > 0 {
        let instr = ctx
            .part_mut(SearchP)
            .trail
            .pop()
            .expect("trail underflow while popping levels");
        match instr {
            TrailInstr::QHead { prev } => {
                ctx.part_mut(SearchP).qhead = prev;
            }
            TrailInstr::AddVar => {
                ctx.part_mut(VarsP).del_var();
                ctx.part_mut(ViableP).pop();
                let count = ctx.part(VarsP).var_count();
                ctx.part_mut(VarQueueP).truncate(count);
            }
            TrailInstr::IncLevel => {
                ctx.part_mut(SearchP).level -= 1;
                remaining -= 1;
            }
            TrailInstr::Viable { var, prev } => {
                ctx.part_mut(ViableP).restore(var, prev);
            }
            TrailInstr::Assign => {
                let item = ctx.part_mut(SearchP).items.pop();
                ctx.part_mut(SearchP).asn.pop();
                match item {
                    Some(SearchItem::Assignment { var, .. }) => {
                        trace!("undo assignment of {}", var);
                        ctx.part_mut(VarsP).unassign(var);
                        ctx.part_mut(VarQueueP).make_available(var);
                    }
                    _ => unreachable!("trail out of sync with search stack"),
                }
            }
            TrailInstr::AssignBool => {
                let item = ctx.part_mut(SearchP).items.pop();
                let lit = match item {
                    Some(SearchItem::Boolean { lit }) => lit,
                    _ => unreachable!("trail out of sync with search stack"),
                };
                trace!("undo boolean assignment {}", lit);
                let sc = ctx
                    .part(ConstraintsP)
                    .lookup(lit)
                    .expect("assigned literal without constraint");
                if ctx.part(ConstraintsP).data(sc.cref).level <= target {
                    replay.push(lit);
                } else {
                    prop::erase_watches(ctx.borrow(), sc);
                    ctx.part_mut(BoolVarsP).unassign(lit);
                }
            }
            TrailInstr::Cjust { var } => {
                ctx.part_mut(VarsP).pop_cjust(var);
            }
        }
    }
    // Constraint activations above the target level are gone for good.
    let stale = {
        let constraints = ctx.part_mut(ConstraintsP);
        let mut stale = constraints.pop_original_above(target);
        stale.extend(constraints.pop_redundant_above(target));
        stale
    };
    for sc in stale {
        prop::erase_watches(ctx.borrow(), sc);
    }
    {
        let (constraints, mut ctx) = ctx.split_part_mut(ConstraintsP);
        constraints.release_level(target + 1, ctx.part_mut(BoolVarsP));
    }
    ctx.part_mut(ClauseDbP).release_level(target + 1);
    debug_assert_eq!(ctx.part(SearchP).level, target);
    // Replay the surviving boolean assignments at the target level. After
    // a backjump the queue is fully drained and the watches are still
    // registered, so the item is marked processed and narrowed directly;
    // with a queue backlog the item goes through activation again, so its
    // watches are dropped first.
    for lit in replay.into_iter().rev() {
        trace!("replay {}", lit);
        let level = ctx.part(SearchP).level;
        ctx.part_mut(BoolVarsP).set_level(lit.var(), level);
        let sc = ctx
            .part(ConstraintsP)
            .lookup(lit)
            .expect("replayed literal without constraint");
        let drained = ctx.part(SearchP).qhead == ctx.part(SearchP).items.len();
        ctx.part_mut(SearchP).push_boolean(lit);
        if drained {
            ctx.part_mut(SearchP).qhead += 1;
            prop::narrow(ctx.borrow(), sc);
        } else {
            prop::erase_watches(ctx.borrow(), sc);
        }
    }
}
