use crate::tensor::ActionBatch;
use anyhow::Result;

/// Output of [`ActorCritic::act`].
#[derive(Debug, Clone)]
pub struct ActOutput<T> {
    pub value: T,
    pub action: ActionBatch,
    pub log_prob: T,
    pub recurrent_state: T,
}

/// Output of [`ActorCritic::evaluate_actions`].
#[derive(Debug, Clone)]
pub struct Evaluation<T> {
    /// `(B, 1)`
    pub value: T,
    /// `(B, 1)`
    pub log_prob: T,
    /// Scalar, mean entropy over the batch.
    pub entropy: T,
    pub recurrent_state: T,
}

/// The policy contract the PPO engine trains.
///
/// Recurrent states are `(B, recurrent_state_size)`, masks `(B, 1)`. Stateless
/// implementations report `is_recurrent() == false` and still expect a state of
/// width [`ActorCritic::recurrent_state_size`], which they pass through.
pub trait ActorCritic {
    type Tensor;

    fn act(
        &self,
        observations: &Self::Tensor,
        recurrent_states: &Self::Tensor,
        masks: &Self::Tensor,
        deterministic: bool,
    ) -> Result<ActOutput<Self::Tensor>>;

    fn evaluate_actions(
        &self,
        observations: &Self::Tensor,
        recurrent_states: &Self::Tensor,
        masks: &Self::Tensor,
        actions: &ActionBatch,
    ) -> Result<Evaluation<Self::Tensor>>;

    fn get_value(
        &self,
        observations: &Self::Tensor,
        recurrent_states: &Self::Tensor,
        masks: &Self::Tensor,
    ) -> Result<Self::Tensor>;

    fn is_recurrent(&self) -> bool;

    fn recurrent_state_size(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    Actor,
    Critic,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 2] = [ParamGroup::Actor, ParamGroup::Critic];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Critic => "critic",
        }
    }
}

/// An optimizer over the two named parameter groups of an actor-critic.
pub trait GroupedOptimizer {
    type Tensor;
    type Gradients;

    /// Gradients are produced fresh by every `backward`, so most implementations
    /// have nothing to reset.
    fn zero_grad(&mut self) -> Result<()> {
        Ok(())
    }

    fn backward(&mut self, loss: &Self::Tensor) -> Result<Self::Gradients>;

    /// Rescales the gradients of `group` so that their joint L2 norm does not
    /// exceed `max_norm`. Returns the norm before clipping.
    fn clip_grad_norm(
        &self,
        grads: &mut Self::Gradients,
        group: ParamGroup,
        max_norm: f32,
    ) -> Result<f32>;

    fn step(&mut self, grads: &Self::Gradients) -> Result<()>;

    fn learning_rate(&self, group: ParamGroup) -> f64;

    fn set_learning_rate(&mut self, group: ParamGroup, lr: f64);
}
