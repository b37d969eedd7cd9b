use crate::tensor::{ActionBatch, TensorBuffer};
use std::ops::Range;

/// Contiguous `(slot, env, width)` storage for one buffer field.
#[derive(Debug, Clone)]
pub(crate) struct SlotArena {
    data: Vec<f32>,
    slots: usize,
    num_envs: usize,
    width: usize,
}

impl SlotArena {
    pub fn new(slots: usize, num_envs: usize, width: usize, fill: f32) -> Self {
        Self {
            data: vec![fill; slots * num_envs * width],
            slots,
            num_envs,
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn slot_range(&self, slot: usize) -> Range<usize> {
        debug_assert!(slot < self.slots);
        let len = self.num_envs * self.width;
        slot * len..(slot + 1) * len
    }

    fn cell_range(&self, slot: usize, env: usize) -> Range<usize> {
        debug_assert!(env < self.num_envs);
        let start = (slot * self.num_envs + env) * self.width;
        start..start + self.width
    }

    pub fn slot(&self, slot: usize) -> &[f32] {
        &self.data[self.slot_range(slot)]
    }

    /// The first `slots` slots as one flat slice.
    pub fn leading(&self, slots: usize) -> &[f32] {
        &self.data[..slots * self.num_envs * self.width]
    }

    pub fn write_slot(&mut self, slot: usize, values: &[f32]) {
        let range = self.slot_range(slot);
        self.data[range].copy_from_slice(values);
    }

    pub fn copy_slot(&mut self, from: usize, to: usize) {
        let src = self.slot_range(from);
        let dst = self.slot_range(to).start;
        self.data.copy_within(src, dst);
    }

    pub fn at(&self, slot: usize, env: usize) -> &[f32] {
        &self.data[self.cell_range(slot, env)]
    }

    /// Scalar read for width-one fields.
    pub fn get(&self, slot: usize, env: usize) -> f32 {
        self.data[self.cell_range(slot, env).start]
    }

    pub fn set(&mut self, slot: usize, env: usize, value: f32) {
        let idx = self.cell_range(slot, env).start;
        self.data[idx] = value;
    }

    /// Copies the given `(slot, env)` cells into a `(cells.len(), *trailing)` buffer.
    pub fn gather(&self, cells: &[(usize, usize)], trailing: &[usize]) -> TensorBuffer {
        let mut data = Vec::with_capacity(cells.len() * self.width);
        for &(slot, env) in cells {
            data.extend_from_slice(self.at(slot, env));
        }
        let mut shape = Vec::with_capacity(trailing.len() + 1);
        shape.push(cells.len());
        shape.extend_from_slice(trailing);
        TensorBuffer::new(data, shape)
    }
}

/// Action storage, `(T, N)` integers or `(T, N, dim)` reals.
#[derive(Debug, Clone)]
pub(crate) enum ActionStorage {
    Discrete { data: Vec<i64>, num_envs: usize },
    Continuous(SlotArena),
}

impl ActionStorage {
    /// Callers validate `actions` against the storage kind and size first.
    pub fn write(&mut self, step: usize, actions: &ActionBatch) {
        match (self, actions) {
            (Self::Discrete { data, num_envs }, ActionBatch::Discrete(actions)) => {
                let start = step * *num_envs;
                data[start..start + *num_envs].copy_from_slice(actions);
            }
            (Self::Continuous(arena), ActionBatch::Continuous(actions)) => {
                arena.write_slot(step, &actions.data);
            }
            _ => unreachable!("action batch validated against storage kind"),
        }
    }

    pub fn gather(&self, cells: &[(usize, usize)]) -> ActionBatch {
        match self {
            Self::Discrete { data, num_envs } => ActionBatch::Discrete(
                cells
                    .iter()
                    .map(|&(step, env)| data[step * num_envs + env])
                    .collect(),
            ),
            Self::Continuous(arena) => {
                ActionBatch::Continuous(arena.gather(cells, &[arena.width()]))
            }
        }
    }

    pub fn slot(&self, step: usize) -> ActionBatch {
        match self {
            Self::Discrete { data, num_envs } => {
                ActionBatch::Discrete(data[step * num_envs..(step + 1) * num_envs].to_vec())
            }
            Self::Continuous(arena) => ActionBatch::Continuous(TensorBuffer::new(
                arena.slot(step).to_vec(),
                vec![arena.num_envs, arena.width],
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SlotArena;

    #[test]
    fn slot_arena_layout() {
        let mut arena = SlotArena::new(3, 2, 2, 0.);
        arena.write_slot(2, &[1., 2., 3., 4.]);
        assert_eq!(arena.at(2, 1), &[3., 4.]);
        arena.copy_slot(2, 0);
        assert_eq!(arena.slot(0), &[1., 2., 3., 4.]);
        assert_eq!(arena.slot(1), &[0.; 4]);
        let gathered = arena.gather(&[(2, 1), (0, 0)], &[2]);
        assert_eq!(gathered.shape, vec![2, 2]);
        assert_eq!(gathered.data, vec![3., 4., 1., 2.]);
    }
}
