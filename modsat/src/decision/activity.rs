//! Activity-ordered queue of free variables.
//!
//! Keeps an activity value for each arithmetic variable. Variables in the
//! current conflict are bumped, and all activities decay multiplicatively
//! per conflict. Decisions branch on the unassigned variable with the
//! highest activity.
//!
//! As an optimization, instead of decaying all activities each conflict,
//! the bump value is divided by the decay factor each conflict. When this
//! would cause a value to overflow, all activities and the bump value are
//! scaled down. Apart from a scaling factor that is the same for all
//! involved values this is equivalent to the naive implementation, and
//! only the order of activities matters.
use ordered_float::OrderedFloat;

use modsat_poly::PVar;

use crate::config::SolverConfig;

/// Max-activity heap of variables.
pub struct VarQueue {
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f32>>,
    /// A binary heap of the variables.
    heap: Vec<PVar>,
    /// The position in the binary heap for each variable.
    position: Vec<Option<usize>>,
    /// The value to add on bumping.
    bump: f32,
    /// The inverse of the decay factor.
    inv_decay: f32,
}

impl Default for VarQueue {
    fn default() -> VarQueue {
        VarQueue {
            activity: vec![],
            heap: vec![],
            position: vec![],
            bump: 1.0,
            inv_decay: 1.0 / SolverConfig::default().activity_decay,
        }
    }
}

impl VarQueue {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        let old_count = self.activity.len();
        self.activity.resize(count, OrderedFloat(0.0));
        self.position.resize(count, None);

        for i in old_count..count {
            self.make_available(PVar::from_index(i));
        }
    }

    /// Drop variables at and above `count`, as when variable creation is
    /// undone by a pop.
    pub fn truncate(&mut self, count: usize) {
        self.heap.retain(|v| v.index() < count);
        self.activity.truncate(count);
        self.position.truncate(count);
        for pos in 0..self.heap.len() {
            self.position[self.heap[pos].index()] = Some(pos);
        }
        for pos in (0..self.heap.len()).rev() {
            self.sift_down(pos);
        }
    }

    /// Rescale activities if any value exceeds this value.
    fn rescale_limit() -> f32 {
        std::f32::MAX / 16.0
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f32) {
        assert!(decay < 1.0);
        assert!(decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// Bump a variable by increasing its activity.
    pub fn bump(&mut self, var: PVar) {
        let rescale = {
            let value = &mut self.activity[var.index()];
            value.0 += self.bump;
            value.0 >= Self::rescale_limit()
        };
        if rescale {
            self.rescale();
        }
        if let Some(pos) = self.position[var.index()] {
            self.sift_up(pos);
        }
    }

    /// Decay all variable activities.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= Self::rescale_limit() {
            self.rescale();
        }
    }

    /// Rescale all values to avoid an overflow.
    fn rescale(&mut self) {
        let rescale_factor = 1.0 / Self::rescale_limit();
        for activity in &mut self.activity {
            activity.0 *= rescale_factor;
        }
        self.bump *= rescale_factor;
    }

    /// Insert a variable into the heap if not already present.
    pub fn make_available(&mut self, var: PVar) {
        if self.position[var.index()].is_none() {
            let position = self.heap.len();
            self.position[var.index()] = Some(position);
            self.heap.push(var);
            self.sift_up(position);
        }
    }

    /// Move a variable closer to the root until the heap property is
    /// satisfied.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            if pos == 0 {
                return;
            }
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if self.activity[parent_var.index()] >= self.activity[var.index()] {
                return;
            }
            self.position[var.index()] = Some(parent_pos);
            self.heap[parent_pos] = var;
            self.position[parent_var.index()] = Some(pos);
            self.heap[pos] = parent_var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property is
    /// satisfied.
    fn sift_down(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        loop {
            let mut largest_pos = pos;
            let mut largest_var = var;

            let left_pos = pos * 2 + 1;
            if left_pos < self.heap.len() {
                let left_var = self.heap[left_pos];

                if self.activity[largest_var.index()] < self.activity[left_var.index()] {
                    largest_pos = left_pos;
                    largest_var = left_var;
                }
            }

            let right_pos = pos * 2 + 2;
            if right_pos < self.heap.len() {
                let right_var = self.heap[right_pos];

                if self.activity[largest_var.index()] < self.activity[right_var.index()] {
                    largest_pos = right_pos;
                    largest_var = right_var;
                }
            }

            if largest_pos == pos {
                return;
            }

            self.position[var.index()] = Some(largest_pos);
            self.heap[largest_pos] = var;
            self.position[largest_var.index()] = Some(pos);
            self.heap[pos] = largest_var;
            pos = largest_pos;
        }
    }
}

impl Iterator for VarQueue {
    type Item = PVar;

    fn next(&mut self) -> Option<PVar> {
        if self.heap.is_empty() {
            None
        } else {
            let var = self.heap.swap_remove(0);
            if !self.heap.is_empty() {
                let top_var = self.heap[0];
                self.position[top_var.index()] = Some(0);
                self.sift_down(0);
            }
            self.position[var.index()] = None;
            Some(var)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_sorts() {
        let mut queue = VarQueue::default();
        queue.set_var_count(8);

        for _ in 0..8 {
            queue.next();
        }

        for i in 0..8 {
            for _ in 0..i {
                queue.bump(PVar::from_index(i));
            }
        }

        for i in 0..8 {
            queue.make_available(PVar::from_index((i * 5) % 8));
        }

        for i in (0..8).rev() {
            assert_eq!(queue.next(), Some(PVar::from_index(i)));
        }
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn decay_keeps_relative_order() {
        let mut queue = VarQueue::default();
        queue.set_var_count(4);
        queue.set_decay(1.0 / 8.0);

        for _ in 0..4 {
            queue.next();
        }

        for i in 0..4 {
            for _ in 0..i {
                queue.bump(PVar::from_index(i));
            }
        }

        for _ in 0..60 {
            queue.decay();
        }

        // decay is a power of two so these values are exact
        assert_eq!(queue.activity[0].0, 0.0);
        assert_eq!(queue.activity[2].0, queue.activity[1].0 * 2.0);
        assert_eq!(queue.activity[3].0, queue.activity[1].0 * 3.0);
    }

    #[test]
    fn truncate_rebuilds_the_heap() {
        let mut queue = VarQueue::default();
        queue.set_var_count(6);
        for i in 0..6 {
            for _ in 0..i {
                queue.bump(PVar::from_index(i));
            }
        }
        queue.truncate(4);
        for i in (0..4).rev() {
            assert_eq!(queue.next(), Some(PVar::from_index(i)));
        }
        assert_eq!(queue.next(), None);
    }
}
