#[cfg(feature = "candle")]
mod candle_tensor;

use crate::env::ActionKind;

/// Row-major `f32` data with its shape. This is what the rollout buffer hands
/// out, converting it into a framework tensor is left to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorBuffer {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { data, shape }
    }

    /// Size of the leading dimension.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// The `row`-th slice along the leading dimension.
    pub fn row(&self, row: usize) -> &[f32] {
        let width = self.data.len() / self.rows().max(1);
        &self.data[row * width..(row + 1) * width]
    }
}

/// A batch of actions, one entry per environment (on `insert`) or per
/// transition (in a minibatch).
#[derive(Debug, Clone, PartialEq)]
pub enum ActionBatch {
    Discrete(Vec<i64>),
    Continuous(TensorBuffer),
}

impl ActionBatch {
    pub fn len(&self) -> usize {
        match self {
            Self::Discrete(actions) => actions.len(),
            Self::Continuous(actions) => actions.rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, kind: ActionKind) -> bool {
        matches!(
            (self, kind),
            (Self::Discrete(_), ActionKind::Discrete)
                | (Self::Continuous(_), ActionKind::Continuous { .. })
        )
    }
}
