//! Assignment table for the boolean variables naming constraints.
use crate::clause::ClauseRef;
use crate::lit::{BLit, BVar};

/// Per-variable boolean assignment state.
///
/// A variable is a decision when it is assigned without a reason clause;
/// decisions additionally remember the learned clause they were guessed
/// from. Marks use a clock so clearing them in bulk is O(1).
#[derive(Default)]
pub struct BoolVars {
    /// Assigned polarity of the variable, if any.
    value: Vec<Option<bool>>,
    level: Vec<u32>,
    reason: Vec<Option<ClauseRef>>,
    lemma: Vec<Option<ClauseRef>>,
    marks: Vec<u32>,
    clock: u32,
    free: Vec<BVar>,
}

impl BoolVars {
    pub fn var_count(&self) -> usize {
        self.value.len()
    }

    pub fn new_var(&mut self) -> BVar {
        match self.free.pop() {
            Some(var) => var,
            None => {
                let var = BVar::from_index(self.value.len());
                self.value.push(None);
                self.level.push(0);
                self.reason.push(None);
                self.lemma.push(None);
                self.marks.push(0);
                var
            }
        }
    }

    /// Release a variable for reuse. It must be unassigned.
    pub fn del_var(&mut self, var: BVar) {
        debug_assert!(self.value[var.index()].is_none());
        self.marks[var.index()] = 0;
        self.free.push(var);
    }

    pub fn value(&self, lit: BLit) -> Option<bool> {
        self.value[lit.index()].map(|polarity| polarity ^ lit.is_negative())
    }

    pub fn is_true(&self, lit: BLit) -> bool {
        self.value(lit) == Some(true)
    }

    pub fn is_false(&self, lit: BLit) -> bool {
        self.value(lit) == Some(false)
    }

    pub fn is_assigned(&self, var: BVar) -> bool {
        self.value[var.index()].is_some()
    }

    pub fn assign(&mut self, lit: BLit, level: u32, reason: Option<ClauseRef>, lemma: Option<ClauseRef>) {
        debug_assert!(!self.is_assigned(lit.var()));
        self.value[lit.index()] = Some(lit.is_positive());
        self.level[lit.index()] = level;
        self.reason[lit.index()] = reason;
        self.lemma[lit.index()] = lemma;
    }

    pub fn unassign(&mut self, lit: BLit) {
        debug_assert!(self.is_assigned(lit.var()));
        self.value[lit.index()] = None;
        self.reason[lit.index()] = None;
        self.lemma[lit.index()] = None;
    }

    pub fn is_decision(&self, var: BVar) -> bool {
        self.is_assigned(var) && self.reason[var.index()].is_none()
    }

    pub fn is_propagation(&self, var: BVar) -> bool {
        self.is_assigned(var) && self.reason[var.index()].is_some()
    }

    pub fn level(&self, var: BVar) -> u32 {
        self.level[var.index()]
    }

    /// Adjust the recorded level, as when an assignment is replayed at a
    /// lower level after a backjump.
    pub fn set_level(&mut self, var: BVar, level: u32) {
        debug_assert!(self.is_assigned(var));
        self.level[var.index()] = level;
    }

    pub fn reason(&self, var: BVar) -> Option<ClauseRef> {
        self.reason[var.index()]
    }

    /// The learned clause a decision was guessed from.
    pub fn lemma(&self, var: BVar) -> Option<ClauseRef> {
        self.lemma[var.index()]
    }

    pub fn set_mark(&mut self, var: BVar) {
        self.marks[var.index()] = self.clock;
    }

    pub fn is_marked(&self, var: BVar) -> bool {
        self.marks[var.index()] == self.clock && self.clock != 0
    }

    pub fn reset_marks(&mut self) {
        self.clock += 1;
        if self.clock == 0 {
            self.clock = 1;
            for m in &mut self.marks {
                *m = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_roundtrip() {
        let mut bvars = BoolVars::default();
        let var = bvars.new_var();
        let lit = BLit::from_var(var, true);

        assert_eq!(bvars.value(lit), None);
        bvars.assign(lit, 3, None, None);
        assert!(bvars.is_true(lit));
        assert!(bvars.is_false(!lit));
        assert!(bvars.is_decision(var));
        assert!(!bvars.is_propagation(var));
        assert_eq!(bvars.level(var), 3);
        bvars.unassign(lit);
        assert_eq!(bvars.value(lit), None);

        bvars.del_var(var);
        assert_eq!(bvars.new_var(), var);
    }

    #[test]
    fn marks_clear_in_bulk() {
        let mut bvars = BoolVars::default();
        let a = bvars.new_var();
        let b = bvars.new_var();
        bvars.reset_marks();
        bvars.set_mark(a);
        assert!(bvars.is_marked(a));
        assert!(!bvars.is_marked(b));
        bvars.reset_marks();
        assert!(!bvars.is_marked(a));
    }
}
