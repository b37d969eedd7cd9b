use super::ActionDistribution;
use candle_core::{DType, Error, Module, Result, Tensor};
use candle_nn::{
    Linear, VarBuilder, linear,
    ops::{log_softmax, softmax},
};
use rand::distr::{Distribution, weighted::WeightedIndex};
use rlppo_core::{env::ActionKind, rng::RNG};

#[derive(Debug, Clone)]
pub struct Categorical {
    logits: Linear,
    num_actions: usize,
}

impl Categorical {
    pub fn new(feature_dim: usize, num_actions: usize, vb: &VarBuilder) -> Result<Self> {
        let logits = linear(feature_dim, num_actions, vb.pp("logits"))?;
        Ok(Self {
            logits,
            num_actions,
        })
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }
}

impl ActionDistribution for Categorical {
    fn sample(&self, features: &Tensor, deterministic: bool) -> Result<Tensor> {
        let logits = self.logits.forward(features)?;
        if deterministic {
            return logits.argmax_keepdim(1)?.to_dtype(DType::I64);
        }
        let probs: Vec<Vec<f32>> = softmax(&logits, 1)?.to_vec2()?;
        let actions = RNG.with_borrow_mut(|rng| {
            probs
                .iter()
                .map(|p| {
                    let distribution = WeightedIndex::new(p).map_err(Error::wrap)?;
                    Ok(distribution.sample(rng) as i64)
                })
                .collect::<Result<Vec<i64>>>()
        })?;
        let batch = actions.len();
        Tensor::from_vec(actions, (batch, 1), features.device())
    }

    fn log_probs(&self, features: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let logits = self.logits.forward(features)?;
        let log_probs = log_softmax(&logits, 1)?;
        let batch = log_probs.dim(0)?;
        let actions = actions.to_dtype(DType::U32)?.reshape((batch, 1))?;
        log_probs.gather(&actions, 1)
    }

    fn entropy(&self, features: &Tensor) -> Result<Tensor> {
        let logits = self.logits.forward(features)?;
        let log_probs = log_softmax(&logits, 1)?;
        log_probs.exp()?.mul(&log_probs)?.sum(1)?.neg()
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::Discrete
    }
}
