pub mod batch;
pub mod builder;
pub mod config;
pub mod hooks;
pub mod losses;

pub use builder::{CandlePPO, PPOBuilder};
pub use config::PPOParams;
pub use hooks::{EmptyPPOHooks, HookResult, PPOBatchData, PPOHooksTrait, TargetKlHooks};

use crate::tensors::{Logp, LogpDiff, ValuesPred};
use anyhow::Result;
use batch::CandleMinibatch;
use candle_core::{Device, Tensor};
use either::Either;
use rlppo_core::{
    Error,
    policies::{ActOutput, ActorCritic, GroupedOptimizer, ParamGroup},
    rollout_buffer::{Minibatch, MinibatchSpec, RolloutBuffer},
};
use tracing::{debug, info};

/// Losses and entropy of one update, summed over its optimizer steps and
/// divided by `num_epochs * num_minibatches`. An update cut short by a hook is
/// divided by the steps it took instead. `num_updates` counts the steps taken.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateStats {
    pub value_loss: f32,
    pub policy_loss: f32,
    pub entropy: f32,
    pub num_updates: usize,
}

impl UpdateStats {
    fn record(&mut self, value_loss: f32, policy_loss: f32, entropy: f32) {
        self.value_loss += value_loss;
        self.policy_loss += policy_loss;
        self.entropy += entropy;
        self.num_updates += 1;
    }

    fn finish(mut self, divisor: usize) -> Self {
        let divisor = divisor.max(1) as f32;
        self.value_loss /= divisor;
        self.policy_loss /= divisor;
        self.entropy /= divisor;
        self
    }
}

pub struct PPOCore<P, O> {
    pub actor_critic: P,
    pub optimizer: O,
    pub params: PPOParams,
    pub initial_actor_lr: f64,
    pub device: Device,
}

impl<P, O> PPOCore<P, O>
where
    P: ActorCritic<Tensor = Tensor>,
    O: GroupedOptimizer<Tensor = Tensor>,
{
    /// Validates `params` and sets both group learning rates from them.
    pub fn new(
        actor_critic: P,
        mut optimizer: O,
        params: PPOParams,
        device: &Device,
    ) -> Result<Self> {
        params.validate()?;
        optimizer.set_learning_rate(ParamGroup::Actor, params.actor_lr);
        optimizer.set_learning_rate(ParamGroup::Critic, params.critic_lr);
        Ok(Self {
            actor_critic,
            optimizer,
            initial_actor_lr: params.actor_lr,
            params,
            device: device.clone(),
        })
    }

    /// Decays the actor learning rate linearly to zero over `total_epochs`.
    /// The critic learning rate is left alone.
    pub fn update_linear_schedule(
        &mut self,
        current_epoch: usize,
        total_epochs: usize,
    ) -> Result<()> {
        if total_epochs == 0 {
            return Err(Error::Config("total_epochs must be positive".into()).into());
        }
        let lr = self.initial_actor_lr
            - self.initial_actor_lr * (current_epoch as f64 / total_epochs as f64);
        debug!(current_epoch, total_epochs, lr, "actor learning rate");
        self.optimizer.set_learning_rate(ParamGroup::Actor, lr);
        Ok(())
    }

    pub fn act(
        &self,
        observations: &Tensor,
        recurrent_states: &Tensor,
        masks: &Tensor,
        deterministic: bool,
    ) -> Result<ActOutput<Tensor>> {
        self.actor_critic
            .act(observations, recurrent_states, masks, deterministic)
    }

    /// Value estimate of the buffer's last slot, one entry per environment.
    pub fn bootstrap_value(&self, buffer: &RolloutBuffer) -> Result<Vec<f32>> {
        let observations = buffer.last_observations().to_candle(&self.device)?;
        let recurrent_states = buffer.last_recurrent_states().to_candle(&self.device)?;
        let masks = buffer.last_done_masks().to_candle(&self.device)?;
        let value = self
            .actor_critic
            .get_value(&observations, &recurrent_states, &masks)?;
        Ok(value.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Bootstraps from the last slot and fills the buffer's returns with the
    /// configured estimator.
    pub fn compute_returns(&self, buffer: &mut RolloutBuffer) -> Result<()> {
        let bootstrap = self.bootstrap_value(buffer)?;
        buffer.compute_returns(
            &bootstrap,
            self.params.use_gae,
            self.params.gamma,
            self.params.gae_lambda,
            self.params.use_proper_time_limits,
        )?;
        Ok(())
    }
}

pub struct PPO<P, O> {
    pub ppo: PPOCore<P, O>,
    pub hooks: Box<dyn PPOHooksTrait<PPOCore<P, O>>>,
}

impl<P, O> PPO<P, O>
where
    P: ActorCritic<Tensor = Tensor>,
    O: GroupedOptimizer<Tensor = Tensor>,
{
    pub fn new(ppo: PPOCore<P, O>) -> Self {
        Self {
            ppo,
            hooks: Box::new(EmptyPPOHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn PPOHooksTrait<PPOCore<P, O>>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Runs `num_epochs` passes of clipped PPO over the buffer. Returns must
    /// already be computed.
    pub fn update(&mut self, buffer: &RolloutBuffer) -> Result<UpdateStats> {
        let mut advantages = buffer.advantages();
        advantages.normalize();
        let mut stats = UpdateStats::default();

        if self.hooks.before_learning_hook(&mut self.ppo, &mut advantages)? == HookResult::Break {
            return Ok(stats.finish(0));
        }

        let num_epochs = self.ppo.params.num_epochs;
        let num_minibatches = self.ppo.params.num_minibatches;
        let mut stopped_early = false;
        'epochs: for epoch in 0..num_epochs {
            let generator = if self.ppo.actor_critic.is_recurrent() {
                Either::Left(buffer.recurrent_generator(&advantages, num_minibatches)?)
            } else {
                let spec = MinibatchSpec::Count(num_minibatches);
                Either::Right(buffer.feed_forward_generator(&advantages, spec)?)
            };
            for minibatch in generator {
                if self.batch_step(&minibatch, &mut stats)? == HookResult::Break {
                    stopped_early = true;
                    break 'epochs;
                }
            }
            debug!(epoch, updates = stats.num_updates, "finished epoch");
            if self.hooks.epoch_hook(&mut self.ppo, epoch)? == HookResult::Break {
                stopped_early = epoch + 1 < num_epochs;
                break;
            }
        }

        let divisor = if stopped_early {
            stats.num_updates
        } else {
            num_epochs * num_minibatches
        };
        let stats = stats.finish(divisor);
        info!(
            value_loss = stats.value_loss,
            policy_loss = stats.policy_loss,
            entropy = stats.entropy,
            num_updates = stats.num_updates,
            "ppo update"
        );
        Ok(stats)
    }

    fn batch_step(
        &mut self,
        minibatch: &Minibatch,
        stats: &mut UpdateStats,
    ) -> Result<HookResult> {
        let ppo = &mut self.ppo;
        let params = &ppo.params;
        let batch = CandleMinibatch::new(minibatch, &ppo.device)?;
        let eval = ppo.actor_critic.evaluate_actions(
            &batch.observations,
            &batch.recurrent_states,
            &batch.masks,
            &batch.actions,
        )?;
        let logp = Logp(eval.log_prob);
        let values_pred = ValuesPred(eval.value);
        let logp_diff = LogpDiff((&*logp - &batch.old_action_log_probs)?);
        let ratio = logp_diff.exp()?;
        let mut policy_loss = losses::policy_loss(&ratio, &batch.advantages, params.clip_param)?;
        let value_clip = params.use_clipped_value_loss.then_some(params.clip_param);
        let mut value_loss =
            losses::value_loss(&values_pred, &batch.value_preds, &batch.returns, value_clip)?;
        let data = PPOBatchData {
            logp,
            values_pred,
            logp_diff,
            ratio,
            entropy: eval.entropy,
        };

        let hook_result =
            self.hooks
                .batch_hook(ppo, minibatch, &mut policy_loss, &mut value_loss, &data)?;

        let params = &ppo.params;
        let loss = ((value_loss.affine(params.value_loss_coef as f64, 0.)? + &policy_loss.0)?
            - data.entropy.affine(params.entropy_coef as f64, 0.)?)?;
        ppo.optimizer.zero_grad()?;
        let mut grads = ppo.optimizer.backward(&loss)?;
        if let Some(max_grad_norm) = params.max_grad_norm {
            for group in ParamGroup::ALL {
                ppo.optimizer.clip_grad_norm(&mut grads, group, max_grad_norm)?;
            }
        }
        ppo.optimizer.step(&grads)?;

        stats.record(
            value_loss.to_scalar::<f32>()?,
            policy_loss.to_scalar::<f32>()?,
            data.entropy.to_scalar::<f32>()?,
        );
        Ok(hook_result)
    }
}
