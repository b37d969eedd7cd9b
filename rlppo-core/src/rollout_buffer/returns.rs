use super::RolloutBuffer;
use crate::error::{Error, Result};
use tracing::debug;

impl RolloutBuffer {
    /// Fills `returns[0..T]` backwards from the last step.
    ///
    /// With `use_gae` the bootstrap is written to `value_preds[T]` and returns
    /// are GAE advantages plus value predictions, otherwise it is written to
    /// `returns[T]` and plain discounted returns are computed. With
    /// `use_proper_time_limits` a step whose episode was cut by a time limit
    /// (`time_limit_masks[t + 1] == 0`) bootstraps from its own value
    /// prediction instead of being treated as terminal.
    pub fn compute_returns(
        &mut self,
        bootstrap_value: &[f32],
        use_gae: bool,
        gamma: f32,
        gae_lambda: f32,
        use_proper_time_limits: bool,
    ) -> Result<()> {
        Error::check_len("bootstrap_value", self.num_envs, bootstrap_value.len())?;
        let last = self.rollout_steps;
        debug!(
            rollout_steps = last,
            num_envs = self.num_envs,
            use_gae,
            use_proper_time_limits,
            gamma,
            gae_lambda,
            "computing returns"
        );
        for env in 0..self.num_envs {
            if use_gae {
                self.value_preds.set(last, env, bootstrap_value[env]);
                let mut gae = 0.;
                for t in (0..last).rev() {
                    let value = self.value_preds.get(t, env);
                    let next_value = self.value_preds.get(t + 1, env);
                    let next_done = self.done_masks.get(t + 1, env);
                    let delta = self.rewards.get(t, env) + gamma * next_value * next_done - value;
                    gae = delta + gamma * gae_lambda * next_done * gae;
                    if use_proper_time_limits {
                        gae *= self.time_limit_masks.get(t + 1, env);
                    }
                    self.returns.set(t, env, gae + value);
                }
            } else {
                self.returns.set(last, env, bootstrap_value[env]);
                for t in (0..last).rev() {
                    let next_return = self.returns.get(t + 1, env);
                    let next_done = self.done_masks.get(t + 1, env);
                    let mut ret = next_return * gamma * next_done + self.rewards.get(t, env);
                    if use_proper_time_limits {
                        let time_limit = self.time_limit_masks.get(t + 1, env);
                        ret = ret * time_limit + (1. - time_limit) * self.value_preds.get(t, env);
                    }
                    self.returns.set(t, env, ret);
                }
            }
        }
        Ok(())
    }
}
