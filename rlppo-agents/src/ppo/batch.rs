use candle_core::{Device, Result, Tensor};
use rlppo_core::{rollout_buffer::Minibatch, tensor::ActionBatch};

/// A [`Minibatch`] moved onto a candle device.
#[derive(Debug)]
pub struct CandleMinibatch {
    pub observations: Tensor,
    pub recurrent_states: Tensor,
    pub actions: ActionBatch,
    pub value_preds: Tensor,
    pub returns: Tensor,
    pub masks: Tensor,
    pub old_action_log_probs: Tensor,
    pub advantages: Tensor,
}

impl CandleMinibatch {
    pub fn new(minibatch: &Minibatch, device: &Device) -> Result<Self> {
        Ok(Self {
            observations: minibatch.observations.to_candle(device)?,
            recurrent_states: minibatch.recurrent_states.to_candle(device)?,
            actions: minibatch.actions.clone(),
            value_preds: minibatch.value_preds.to_candle(device)?,
            returns: minibatch.returns.to_candle(device)?,
            masks: minibatch.masks.to_candle(device)?,
            old_action_log_probs: minibatch.old_action_log_probs.to_candle(device)?,
            advantages: minibatch.advantages.to_candle(device)?,
        })
    }
}
