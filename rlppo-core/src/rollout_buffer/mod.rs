mod generators;
mod returns;
mod storage;

pub use generators::{FeedForwardGenerator, Minibatch, MinibatchSpec, RecurrentGenerator};

use crate::{
    advantages::Advantages,
    env::{ActionKind, EnvironmentDescription, Space},
    error::{Error, Result},
    tensor::{ActionBatch, TensorBuffer},
};
use storage::{ActionStorage, SlotArena};

/// Fixed capacity, time-major storage for one rollout of `rollout_steps` steps
/// collected from `num_envs` environments in lockstep.
///
/// State-like fields (observations, recurrent states, masks) have
/// `rollout_steps + 1` slots, slot 0 holding the boundary state carried over
/// from the previous rollout. Action-like fields (actions, log-probs, rewards)
/// have `rollout_steps` slots. Value predictions and returns have
/// `rollout_steps + 1` slots so the last one can hold the bootstrap.
#[derive(Debug, Clone)]
pub struct RolloutBuffer {
    rollout_steps: usize,
    num_envs: usize,
    obs_shape: Vec<usize>,
    action_kind: ActionKind,
    recurrent_state_size: usize,
    observations: SlotArena,
    recurrent_states: SlotArena,
    rewards: SlotArena,
    value_preds: SlotArena,
    returns: SlotArena,
    action_log_probs: SlotArena,
    actions: ActionStorage,
    done_masks: SlotArena,
    time_limit_masks: SlotArena,
    write_cursor: usize,
}

impl RolloutBuffer {
    pub fn new(
        rollout_steps: usize,
        num_envs: usize,
        obs_shape: &[usize],
        action_space: &Space,
        recurrent_state_size: usize,
    ) -> Result<Self> {
        if rollout_steps == 0 {
            return Err(Error::Config("rollout_steps must be positive".into()));
        }
        if num_envs == 0 {
            return Err(Error::Config("num_envs must be positive".into()));
        }
        let action_kind = ActionKind::try_from(action_space)?;
        let obs_size = obs_shape.iter().product();
        let actions = match action_kind {
            ActionKind::Discrete => ActionStorage::Discrete {
                data: vec![0; rollout_steps * num_envs],
                num_envs,
            },
            ActionKind::Continuous { dim } => {
                ActionStorage::Continuous(SlotArena::new(rollout_steps, num_envs, dim, 0.))
            }
        };
        let state_slots = rollout_steps + 1;
        Ok(Self {
            rollout_steps,
            num_envs,
            obs_shape: obs_shape.to_vec(),
            action_kind,
            recurrent_state_size,
            observations: SlotArena::new(state_slots, num_envs, obs_size, 0.),
            recurrent_states: SlotArena::new(state_slots, num_envs, recurrent_state_size, 0.),
            rewards: SlotArena::new(rollout_steps, num_envs, 1, 0.),
            value_preds: SlotArena::new(state_slots, num_envs, 1, 0.),
            returns: SlotArena::new(state_slots, num_envs, 1, 0.),
            action_log_probs: SlotArena::new(rollout_steps, num_envs, 1, 0.),
            actions,
            done_masks: SlotArena::new(state_slots, num_envs, 1, 1.),
            time_limit_masks: SlotArena::new(state_slots, num_envs, 1, 1.),
            write_cursor: 0,
        })
    }

    pub fn from_description(
        rollout_steps: usize,
        num_envs: usize,
        env_description: &EnvironmentDescription,
        recurrent_state_size: usize,
    ) -> Result<Self> {
        Self::new(
            rollout_steps,
            num_envs,
            &env_description.observation_space.shape(),
            &env_description.action_space,
            recurrent_state_size,
        )
    }

    /// Writes the observations returned by the first environment reset into
    /// slot 0.
    pub fn set_initial_observations(&mut self, observations: &[f32]) -> Result<()> {
        Error::check_len(
            "observations",
            self.num_envs * self.observations.width(),
            observations.len(),
        )?;
        self.observations.write_slot(0, observations);
        Ok(())
    }

    /// Records one step of all environments.
    ///
    /// The observation, recurrent state and masks are the ones *after* the
    /// step and land in slot `write_cursor + 1`. The action, its log-prob, the
    /// value prediction and the reward belong to the step itself and land in
    /// slot `write_cursor`. Every argument is validated before anything is
    /// written.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        observations: &[f32],
        recurrent_states: &[f32],
        actions: &ActionBatch,
        action_log_probs: &[f32],
        value_preds: &[f32],
        rewards: &[f32],
        done_masks: &[f32],
        time_limit_masks: &[f32],
    ) -> Result<()> {
        let n = self.num_envs;
        Error::check_len("observations", n * self.observations.width(), observations.len())?;
        Error::check_len(
            "recurrent_states",
            n * self.recurrent_state_size,
            recurrent_states.len(),
        )?;
        self.check_actions(actions)?;
        Error::check_len("action_log_probs", n, action_log_probs.len())?;
        Error::check_len("value_preds", n, value_preds.len())?;
        Error::check_len("rewards", n, rewards.len())?;
        Error::check_len("done_masks", n, done_masks.len())?;
        Error::check_len("time_limit_masks", n, time_limit_masks.len())?;

        let step = self.write_cursor;
        self.observations.write_slot(step + 1, observations);
        self.recurrent_states.write_slot(step + 1, recurrent_states);
        self.done_masks.write_slot(step + 1, done_masks);
        self.time_limit_masks.write_slot(step + 1, time_limit_masks);
        self.actions.write(step, actions);
        self.action_log_probs.write_slot(step, action_log_probs);
        self.value_preds.write_slot(step, value_preds);
        self.rewards.write_slot(step, rewards);

        self.write_cursor = (step + 1) % self.rollout_steps;
        Ok(())
    }

    fn check_actions(&self, actions: &ActionBatch) -> Result<()> {
        if !actions.matches(self.action_kind) {
            return Err(Error::ActionKindMismatch {
                expected: self.action_kind.name(),
            });
        }
        match actions {
            ActionBatch::Discrete(actions) => {
                Error::check_len("actions", self.num_envs, actions.len())
            }
            ActionBatch::Continuous(actions) => Error::check_len(
                "actions",
                self.num_envs * self.action_kind.width(),
                actions.data.len(),
            ),
        }
    }

    /// Carries the last slot over to slot 0 for the next rollout.
    pub fn after_update(&mut self) {
        let last = self.rollout_steps;
        self.observations.copy_slot(last, 0);
        self.recurrent_states.copy_slot(last, 0);
        self.done_masks.copy_slot(last, 0);
        self.time_limit_masks.copy_slot(last, 0);
    }

    /// `returns - value_preds` over the first `rollout_steps` slots, time-major.
    pub fn advantages(&self) -> Advantages {
        let returns = self.returns.leading(self.rollout_steps);
        let values = self.value_preds.leading(self.rollout_steps);
        Advantages(returns.iter().zip(values).map(|(r, v)| r - v).collect())
    }

    pub fn feed_forward_generator<'a>(
        &'a self,
        advantages: &'a Advantages,
        spec: MinibatchSpec,
    ) -> Result<FeedForwardGenerator<'a>> {
        FeedForwardGenerator::new(self, advantages, spec)
    }

    pub fn recurrent_generator<'a>(
        &'a self,
        advantages: &'a Advantages,
        num_minibatches: usize,
    ) -> Result<RecurrentGenerator<'a>> {
        RecurrentGenerator::new(self, advantages, num_minibatches)
    }

    pub fn rollout_steps(&self) -> usize {
        self.rollout_steps
    }

    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    pub fn obs_shape(&self) -> &[usize] {
        &self.obs_shape
    }

    pub fn action_kind(&self) -> ActionKind {
        self.action_kind
    }

    pub fn recurrent_state_size(&self) -> usize {
        self.recurrent_state_size
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn observation(&self, slot: usize, env: usize) -> &[f32] {
        self.observations.at(slot, env)
    }

    pub fn recurrent_state(&self, slot: usize, env: usize) -> &[f32] {
        self.recurrent_states.at(slot, env)
    }

    pub fn actions_at(&self, step: usize) -> ActionBatch {
        self.actions.slot(step)
    }

    pub fn action_log_prob(&self, step: usize, env: usize) -> f32 {
        self.action_log_probs.get(step, env)
    }

    pub fn value_pred(&self, slot: usize, env: usize) -> f32 {
        self.value_preds.get(slot, env)
    }

    pub fn reward(&self, step: usize, env: usize) -> f32 {
        self.rewards.get(step, env)
    }

    pub fn return_at(&self, slot: usize, env: usize) -> f32 {
        self.returns.get(slot, env)
    }

    pub fn done_mask(&self, slot: usize, env: usize) -> f32 {
        self.done_masks.get(slot, env)
    }

    pub fn time_limit_mask(&self, slot: usize, env: usize) -> f32 {
        self.time_limit_masks.get(slot, env)
    }

    /// Observations of the last slot, `(N, *obs_shape)`.
    pub fn last_observations(&self) -> TensorBuffer {
        let mut shape = vec![self.num_envs];
        shape.extend_from_slice(&self.obs_shape);
        TensorBuffer::new(self.observations.slot(self.rollout_steps).to_vec(), shape)
    }

    /// Recurrent states of the last slot, `(N, recurrent_state_size)`.
    pub fn last_recurrent_states(&self) -> TensorBuffer {
        TensorBuffer::new(
            self.recurrent_states.slot(self.rollout_steps).to_vec(),
            vec![self.num_envs, self.recurrent_state_size],
        )
    }

    /// Done masks of the last slot, `(N, 1)`.
    pub fn last_done_masks(&self) -> TensorBuffer {
        TensorBuffer::new(
            self.done_masks.slot(self.rollout_steps).to_vec(),
            vec![self.num_envs, 1],
        )
    }
}
