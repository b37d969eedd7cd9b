use crate::{
    distributions::{ActionDistribution, DistributionKind},
    mlp::{Mlp, MlpActivation},
};
use anyhow::Result;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{VarBuilder, VarMap};
use rlppo_core::{
    env::{ActionKind, EnvironmentDescription, Space},
    policies::{ActOutput, ActorCritic, Evaluation},
    tensor::ActionBatch,
};
use std::fmt::Debug;

pub const DEFAULT_HIDDEN_LAYERS: [usize; 2] = [64, 64];

/// Feed-forward actor-critic with separate tanh MLPs for the actor and the
/// critic. Actor and critic parameters live in separate var maps so they can
/// be optimized as separate groups.
///
/// It carries no memory: recurrent states are passed through untouched and are
/// one wide.
#[derive(Clone)]
pub struct StatelessActorCritic {
    actor: Mlp,
    distribution: DistributionKind,
    critic: Mlp,
    actor_varmap: VarMap,
    critic_varmap: VarMap,
    action_kind: ActionKind,
    device: Device,
}

impl Debug for StatelessActorCritic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatelessActorCritic")
            .field("actor", &self.actor)
            .field("distribution", &self.distribution)
            .field("critic", &self.critic)
            .field("action_kind", &self.action_kind)
            .finish()
    }
}

impl StatelessActorCritic {
    pub fn new(observation_size: usize, action_space: &Space, device: &Device) -> Result<Self> {
        Self::with_hidden_layers(observation_size, action_space, &DEFAULT_HIDDEN_LAYERS, device)
    }

    pub fn from_description(
        env_description: &EnvironmentDescription,
        device: &Device,
    ) -> Result<Self> {
        Self::new(
            env_description.observation_size(),
            &env_description.action_space,
            device,
        )
    }

    pub fn with_hidden_layers(
        observation_size: usize,
        action_space: &Space,
        hidden_layers: &[usize],
        device: &Device,
    ) -> Result<Self> {
        let actor_varmap = VarMap::new();
        let critic_varmap = VarMap::new();
        let actor_vb = VarBuilder::from_varmap(&actor_varmap, DType::F32, device);
        let critic_vb = VarBuilder::from_varmap(&critic_varmap, DType::F32, device);

        let actor = Mlp::build(
            observation_size,
            hidden_layers,
            MlpActivation::Tanh,
            true,
            &actor_vb,
            "actor",
        )?;
        let distribution =
            DistributionKind::build(actor.output_dim(), action_space, &actor_vb.pp("dist"))?;
        let mut critic_layers = hidden_layers.to_vec();
        critic_layers.push(1);
        let critic = Mlp::build(
            observation_size,
            &critic_layers,
            MlpActivation::Tanh,
            false,
            &critic_vb,
            "critic",
        )?;
        Ok(Self {
            actor,
            action_kind: distribution.action_kind(),
            distribution,
            critic,
            actor_varmap,
            critic_varmap,
            device: device.clone(),
        })
    }

    pub fn actor_varmap(&self) -> &VarMap {
        &self.actor_varmap
    }

    pub fn critic_varmap(&self) -> &VarMap {
        &self.critic_varmap
    }

    pub fn distribution(&self) -> &DistributionKind {
        &self.distribution
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn features(&self, observations: &Tensor) -> Result<Tensor> {
        let observations = observations.flatten_from(1)?;
        Ok(self.actor.forward(&observations)?)
    }

    fn value(&self, observations: &Tensor) -> Result<Tensor> {
        let observations = observations.flatten_from(1)?;
        Ok(self.critic.forward(&observations)?)
    }
}

impl ActorCritic for StatelessActorCritic {
    type Tensor = Tensor;

    fn act(
        &self,
        observations: &Tensor,
        recurrent_states: &Tensor,
        _masks: &Tensor,
        deterministic: bool,
    ) -> Result<ActOutput<Tensor>> {
        let value = self.value(observations)?.detach();
        let features = self.features(observations)?;
        let action = self.distribution.sample(&features, deterministic)?.detach();
        let log_prob = self.distribution.log_probs(&features, &action)?.detach();
        Ok(ActOutput {
            value,
            action: ActionBatch::from_candle(&action, self.action_kind)?,
            log_prob,
            recurrent_state: recurrent_states.clone(),
        })
    }

    fn evaluate_actions(
        &self,
        observations: &Tensor,
        recurrent_states: &Tensor,
        _masks: &Tensor,
        actions: &ActionBatch,
    ) -> Result<Evaluation<Tensor>> {
        let value = self.value(observations)?;
        let features = self.features(observations)?;
        let actions = actions.to_candle(&self.device)?;
        let log_prob = self.distribution.log_probs(&features, &actions)?;
        let entropy = self.distribution.entropy(&features)?.mean_all()?;
        Ok(Evaluation {
            value,
            log_prob,
            entropy,
            recurrent_state: recurrent_states.clone(),
        })
    }

    fn get_value(
        &self,
        observations: &Tensor,
        _recurrent_states: &Tensor,
        _masks: &Tensor,
    ) -> Result<Tensor> {
        Ok(self.value(observations)?.detach())
    }

    fn is_recurrent(&self) -> bool {
        false
    }

    fn recurrent_state_size(&self) -> usize {
        1
    }
}
