use rlppo_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// PPO hyperparameters, including the ones used to compute returns before an
/// update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PPOParams {
    pub clip_param: f32,
    pub num_epochs: usize,
    pub num_minibatches: usize,
    pub value_loss_coef: f32,
    pub entropy_coef: f32,
    pub actor_lr: f64,
    pub critic_lr: f64,
    pub eps: f64,
    pub max_grad_norm: Option<f32>,
    pub use_clipped_value_loss: bool,
    pub use_gae: bool,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub use_proper_time_limits: bool,
}

impl Default for PPOParams {
    fn default() -> Self {
        Self {
            clip_param: 0.2,
            num_epochs: 4,
            num_minibatches: 32,
            value_loss_coef: 0.5,
            entropy_coef: 0.01,
            actor_lr: 3e-4,
            critic_lr: 1e-3,
            eps: 1e-5,
            max_grad_norm: Some(0.5),
            use_clipped_value_loss: true,
            use_gae: true,
            gamma: 0.99,
            gae_lambda: 0.95,
            use_proper_time_limits: true,
        }
    }
}

impl PPOParams {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Config(msg.to_string()));
        if self.num_epochs == 0 {
            return fail("num_epochs must be positive");
        }
        if self.num_minibatches == 0 {
            return fail("num_minibatches must be positive");
        }
        if !(self.clip_param > 0.) {
            return fail("clip_param must be positive");
        }
        if !(self.actor_lr > 0. && self.critic_lr > 0.) {
            return fail("learning rates must be positive");
        }
        if !(self.eps > 0.) {
            return fail("eps must be positive");
        }
        if let Some(max_grad_norm) = self.max_grad_norm
            && !(max_grad_norm > 0.)
        {
            return fail("max_grad_norm must be positive when set");
        }
        if !(0. ..=1.).contains(&self.gamma) || !(0. ..=1.).contains(&self.gae_lambda) {
            return fail("gamma and gae_lambda must be in [0, 1]");
        }
        Ok(())
    }
}
