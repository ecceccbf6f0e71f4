//! Per-variable solver state.
use modsat_poly::{PVar, Poly, Val};

use crate::constraint::SignedCRef;

/// Why and when an arithmetic variable got its value.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Justification {
    Unassigned,
    Decision { level: u32 },
    Propagation { level: u32 },
}

impl Justification {
    pub fn is_unassigned(self) -> bool {
        self == Justification::Unassigned
    }

    pub fn is_decision(self) -> bool {
        match self {
            Justification::Decision { .. } => true,
            _ => false,
        }
    }

    pub fn is_propagation(self) -> bool {
        match self {
            Justification::Propagation { .. } => true,
            _ => false,
        }
    }

    pub fn level(self) -> u32 {
        match self {
            Justification::Unassigned => 0,
            Justification::Decision { level } => level,
            Justification::Propagation { level } => level,
        }
    }
}

/// Attribute vectors for all arithmetic variables.
#[derive(Default)]
pub struct Vars {
    width: Vec<u32>,
    /// Current value when assigned; retained afterwards as a decision
    /// hint.
    value: Vec<Val>,
    justification: Vec<Justification>,
    /// Constraints that last narrowed or fixed the variable.
    cjust: Vec<Vec<SignedCRef>>,
    /// Constraints watching the variable.
    watch: Vec<Vec<SignedCRef>>,
    /// The polynomial standing for the variable.
    poly: Vec<Poly>,
    marks: Vec<u32>,
    clock: u32,
    num_assigned: usize,
}

impl Vars {
    pub fn var_count(&self) -> usize {
        self.width.len()
    }

    pub fn add_var(&mut self, width: u32) -> PVar {
        let v = PVar::from_index(self.width.len());
        self.width.push(width);
        self.value.push(0);
        self.justification.push(Justification::Unassigned);
        self.cjust.push(vec![]);
        self.watch.push(vec![]);
        self.poly.push(Poly::var(v, width));
        self.marks.push(0);
        v
    }

    /// Remove the most recently added variable. It must be unassigned.
    pub fn del_var(&mut self) {
        debug_assert!(self
            .justification
            .last()
            .map(|j| j.is_unassigned())
            .unwrap_or(false));
        self.width.pop();
        self.value.pop();
        self.justification.pop();
        self.cjust.pop();
        self.watch.pop();
        self.poly.pop();
        self.marks.pop();
    }

    pub fn width(&self, v: PVar) -> u32 {
        self.width[v.index()]
    }

    pub fn poly(&self, v: PVar) -> &Poly {
        &self.poly[v.index()]
    }

    pub fn value(&self, v: PVar) -> Val {
        self.value[v.index()]
    }

    pub fn justification(&self, v: PVar) -> Justification {
        self.justification[v.index()]
    }

    pub fn is_assigned(&self, v: PVar) -> bool {
        !self.justification[v.index()].is_unassigned()
    }

    pub fn num_assigned(&self) -> usize {
        self.num_assigned
    }

    pub fn all_assigned(&self) -> bool {
        self.num_assigned == self.var_count()
    }

    pub fn assign(&mut self, v: PVar, val: Val, j: Justification) {
        debug_assert!(!self.is_assigned(v));
        debug_assert!(!j.is_unassigned());
        self.value[v.index()] = val;
        self.justification[v.index()] = j;
        self.num_assigned += 1;
    }

    pub fn unassign(&mut self, v: PVar) {
        debug_assert!(self.is_assigned(v));
        self.justification[v.index()] = Justification::Unassigned;
        self.num_assigned -= 1;
    }

    pub fn cjust(&self, v: PVar) -> &[SignedCRef] {
        &self.cjust[v.index()]
    }

    pub fn push_cjust(&mut self, v: PVar, sc: SignedCRef) {
        self.cjust[v.index()].push(sc);
    }

    pub fn pop_cjust(&mut self, v: PVar) {
        self.cjust[v.index()].pop();
    }

    pub fn watch(&self, v: PVar) -> &[SignedCRef] {
        &self.watch[v.index()]
    }

    pub fn watch_mut(&mut self, v: PVar) -> &mut Vec<SignedCRef> {
        &mut self.watch[v.index()]
    }

    pub fn set_mark(&mut self, v: PVar) {
        self.marks[v.index()] = self.clock;
    }

    pub fn is_marked(&self, v: PVar) -> bool {
        self.marks[v.index()] == self.clock && self.clock != 0
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
