use crate::tensors::{Logp, LogpDiff, PolicyLoss, ValueLoss, ValuesPred};
use anyhow::Result;
use candle_core::Tensor;
use rlppo_core::{advantages::Advantages, rollout_buffer::Minibatch};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    Continue,
    Break,
}

/// What the engine computed for one minibatch.
pub struct PPOBatchData {
    pub logp: Logp,
    pub values_pred: ValuesPred,
    pub logp_diff: LogpDiff,
    pub ratio: Tensor,
    /// Scalar mean entropy of the minibatch.
    pub entropy: Tensor,
}

impl PPOBatchData {
    /// `mean(old_logp - logp)`, a cheap estimate of the KL divergence between
    /// the rollout policy and the current one.
    pub fn approx_kl(&self) -> candle_core::Result<f32> {
        Ok(-self.logp_diff.mean_all()?.to_scalar::<f32>()?)
    }
}

/// Extension points of [`super::PPO::update`]. `Break` from any hook ends the
/// update. `batch_hook` runs before the optimizer step and may replace the
/// losses, the step is still taken when it breaks.
pub trait PPOHooksTrait<A> {
    fn before_learning_hook(
        &mut self,
        _agent: &mut A,
        _advantages: &mut Advantages,
    ) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }

    fn batch_hook(
        &mut self,
        _agent: &mut A,
        _minibatch: &Minibatch,
        _policy_loss: &mut PolicyLoss,
        _value_loss: &mut ValueLoss,
        _data: &PPOBatchData,
    ) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }

    fn epoch_hook(&mut self, _agent: &mut A, _epoch: usize) -> Result<HookResult> {
        Ok(HookResult::Continue)
    }
}

pub struct EmptyPPOHooks;

impl<A> PPOHooksTrait<A> for EmptyPPOHooks {}

/// Stops the update once a minibatch drifts too far from the rollout policy.
#[derive(Debug, Clone, Copy)]
pub struct TargetKlHooks {
    pub target_kl: f32,
}

impl TargetKlHooks {
    pub fn new(target_kl: f32) -> Self {
        Self { target_kl }
    }

    pub fn check(&self, approx_kl: f32) -> HookResult {
        if approx_kl > 1.5 * self.target_kl {
            info!(approx_kl, target_kl = self.target_kl, "early stopping at target kl");
            HookResult::Break
        } else {
            HookResult::Continue
        }
    }
}

impl<A> PPOHooksTrait<A> for TargetKlHooks {
    fn batch_hook(
        &mut self,
        _agent: &mut A,
        _minibatch: &Minibatch,
        _policy_loss: &mut PolicyLoss,
        _value_loss: &mut ValueLoss,
        data: &PPOBatchData,
    ) -> Result<HookResult> {
        Ok(self.check(data.approx_kl()?))
    }
}
