use super::{
    PPO, PPOCore, PPOParams,
    hooks::{EmptyPPOHooks, PPOHooksTrait},
};
use anyhow::Result;
use candle_core::Device;
use rlppo_candle_lm::{
    actor_critic::{DEFAULT_HIDDEN_LAYERS, StatelessActorCritic},
    optimizer::{ActorCriticOptimizer, GroupParams},
};
use rlppo_core::env::EnvironmentDescription;

pub type CandlePPO = PPO<StatelessActorCritic, ActorCriticOptimizer>;

pub struct PPOBuilder {
    pub params: PPOParams,
    pub hidden_layers: Vec<usize>,
}

impl Default for PPOBuilder {
    fn default() -> Self {
        Self {
            params: PPOParams::default(),
            hidden_layers: DEFAULT_HIDDEN_LAYERS.to_vec(),
        }
    }
}

impl PPOBuilder {
    pub fn new(params: PPOParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn build(
        &self,
        device: &Device,
        env_description: &EnvironmentDescription,
    ) -> Result<CandlePPO> {
        self.build_with_hooks(device, env_description, Box::new(EmptyPPOHooks))
    }

    pub fn build_with_hooks(
        &self,
        device: &Device,
        env_description: &EnvironmentDescription,
        hooks: Box<dyn PPOHooksTrait<PPOCore<StatelessActorCritic, ActorCriticOptimizer>>>,
    ) -> Result<CandlePPO> {
        let actor_critic = StatelessActorCritic::with_hidden_layers(
            env_description.observation_size(),
            &env_description.action_space,
            &self.hidden_layers,
            device,
        )?;
        let optimizer = ActorCriticOptimizer::for_actor_critic(
            &actor_critic,
            GroupParams {
                lr: self.params.actor_lr,
                eps: self.params.eps,
            },
            GroupParams {
                lr: self.params.critic_lr,
                eps: self.params.eps,
            },
        )?;
        let ppo = PPOCore::new(actor_critic, optimizer, self.params.clone(), device)?;
        Ok(PPO { ppo, hooks })
    }
}
