use super::RolloutBuffer;
use crate::{
    advantages::Advantages,
    error::{Error, Result},
    rng::RNG,
    tensor::{ActionBatch, TensorBuffer},
};
use rand::seq::SliceRandom;
use tracing::trace;

/// How a feed-forward pass splits the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinibatchSpec {
    /// Split into this many minibatches of `T * N / count` transitions.
    Count(usize),
    /// Minibatches of exactly this many transitions.
    Size(usize),
}

/// One minibatch of transitions.
///
/// `indices` are the flat time-major positions (`t * N + env`) of the rows.
/// For the feed-forward generator `recurrent_states` has one row per
/// transition, for the recurrent generator it holds the initial state of each
/// trajectory in the minibatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Minibatch {
    pub indices: Vec<usize>,
    pub observations: TensorBuffer,
    pub recurrent_states: TensorBuffer,
    pub actions: ActionBatch,
    pub value_preds: TensorBuffer,
    pub returns: TensorBuffer,
    pub masks: TensorBuffer,
    pub old_action_log_probs: TensorBuffer,
    pub advantages: TensorBuffer,
}

impl Minibatch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn gather(
        buffer: &RolloutBuffer,
        advantages: &Advantages,
        cells: &[(usize, usize)],
        recurrent_states: TensorBuffer,
    ) -> Self {
        let num_envs = buffer.num_envs;
        let indices: Vec<usize> = cells.iter().map(|&(t, env)| t * num_envs + env).collect();
        let advantages = indices.iter().map(|&i| advantages[i]).collect();
        Self {
            observations: buffer.observations.gather(cells, &buffer.obs_shape),
            recurrent_states,
            actions: buffer.actions.gather(cells),
            value_preds: buffer.value_preds.gather(cells, &[1]),
            returns: buffer.returns.gather(cells, &[1]),
            masks: buffer.done_masks.gather(cells, &[1]),
            old_action_log_probs: buffer.action_log_probs.gather(cells, &[1]),
            advantages: TensorBuffer::new(advantages, vec![cells.len(), 1]),
            indices,
        }
    }
}

fn check_advantages(buffer: &RolloutBuffer, advantages: &Advantages) -> Result<()> {
    Error::check_len(
        "advantages",
        buffer.rollout_steps * buffer.num_envs,
        advantages.len(),
    )
}

/// Shuffled minibatches of individual transitions.
///
/// Every transition is visited at most once and the trailing partial
/// minibatch is dropped. The generator is single use.
pub struct FeedForwardGenerator<'a> {
    buffer: &'a RolloutBuffer,
    advantages: &'a Advantages,
    permutation: Vec<usize>,
    minibatch_size: usize,
    position: usize,
}

impl<'a> FeedForwardGenerator<'a> {
    pub fn new(
        buffer: &'a RolloutBuffer,
        advantages: &'a Advantages,
        spec: MinibatchSpec,
    ) -> Result<Self> {
        check_advantages(buffer, advantages)?;
        let batch_size = buffer.rollout_steps * buffer.num_envs;
        let minibatch_size = match spec {
            MinibatchSpec::Count(0) => {
                return Err(Error::Config("num_minibatches must be positive".into()));
            }
            MinibatchSpec::Count(num_minibatches) if batch_size < num_minibatches => {
                return Err(Error::TooFewTransitions {
                    num_envs: buffer.num_envs,
                    rollout_steps: buffer.rollout_steps,
                    batch_size,
                    num_minibatches,
                });
            }
            MinibatchSpec::Count(num_minibatches) => batch_size / num_minibatches,
            MinibatchSpec::Size(0) => {
                return Err(Error::Config("minibatch_size must be positive".into()));
            }
            MinibatchSpec::Size(size) => size,
        };
        let mut permutation: Vec<usize> = (0..batch_size).collect();
        RNG.with_borrow_mut(|rng| permutation.shuffle(rng));
        trace!(batch_size, minibatch_size, "feed forward generator");
        Ok(Self {
            buffer,
            advantages,
            permutation,
            minibatch_size,
            position: 0,
        })
    }

    pub fn minibatch_size(&self) -> usize {
        self.minibatch_size
    }
}

impl Iterator for FeedForwardGenerator<'_> {
    type Item = Minibatch;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.position + self.minibatch_size;
        if end > self.permutation.len() {
            return None;
        }
        let num_envs = self.buffer.num_envs;
        let cells: Vec<(usize, usize)> = self.permutation[self.position..end]
            .iter()
            .map(|&i| (i / num_envs, i % num_envs))
            .collect();
        self.position = end;
        let recurrent_states = self
            .buffer
            .recurrent_states
            .gather(&cells, &[self.buffer.recurrent_state_size]);
        Some(Minibatch::gather(
            self.buffer,
            self.advantages,
            &cells,
            recurrent_states,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.permutation.len() - self.position) / self.minibatch_size;
        (left, Some(left))
    }
}

/// Minibatches of whole environment trajectories.
///
/// Environments are shuffled and split into `num_minibatches` equal groups.
/// Rows of a minibatch are time-major (`t * group_size + j`) so a recurrent
/// policy can unroll them. The generator is single use.
pub struct RecurrentGenerator<'a> {
    buffer: &'a RolloutBuffer,
    advantages: &'a Advantages,
    env_permutation: Vec<usize>,
    envs_per_minibatch: usize,
    position: usize,
}

impl<'a> RecurrentGenerator<'a> {
    pub fn new(
        buffer: &'a RolloutBuffer,
        advantages: &'a Advantages,
        num_minibatches: usize,
    ) -> Result<Self> {
        check_advantages(buffer, advantages)?;
        let num_envs = buffer.num_envs;
        if num_minibatches == 0 {
            return Err(Error::Config("num_minibatches must be positive".into()));
        }
        if num_envs < num_minibatches {
            return Err(Error::TooFewEnvs {
                num_envs,
                num_minibatches,
            });
        }
        if num_envs % num_minibatches != 0 {
            return Err(Error::UnevenEnvSplit {
                num_envs,
                num_minibatches,
            });
        }
        let mut env_permutation: Vec<usize> = (0..num_envs).collect();
        RNG.with_borrow_mut(|rng| env_permutation.shuffle(rng));
        let envs_per_minibatch = num_envs / num_minibatches;
        trace!(num_envs, envs_per_minibatch, "recurrent generator");
        Ok(Self {
            buffer,
            advantages,
            env_permutation,
            envs_per_minibatch,
            position: 0,
        })
    }
}

impl Iterator for RecurrentGenerator<'_> {
    type Item = Minibatch;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.position + self.envs_per_minibatch;
        if end > self.env_permutation.len() {
            return None;
        }
        let envs = &self.env_permutation[self.position..end];
        self.position = end;
        let cells: Vec<(usize, usize)> = (0..self.buffer.rollout_steps)
            .flat_map(|t| envs.iter().map(move |&env| (t, env)))
            .collect();
        let initial: Vec<(usize, usize)> = envs.iter().map(|&env| (0, env)).collect();
        let recurrent_states = self
            .buffer
            .recurrent_states
            .gather(&initial, &[self.buffer.recurrent_state_size]);
        Some(Minibatch::gather(
            self.buffer,
            self.advantages,
            &cells,
            recurrent_states,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.env_permutation.len() - self.position) / self.envs_per_minibatch;
        (left, Some(left))
    }
}
