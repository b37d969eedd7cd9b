mod categorical;
mod diag_gaussian;

pub use categorical::Categorical;
pub use diag_gaussian::DiagGaussian;

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;
use enum_dispatch::enum_dispatch;
use rlppo_core::env::{ActionKind, Space};

/// Action head on top of the actor features `(B, F)`.
#[enum_dispatch]
pub trait ActionDistribution {
    /// `(B, 1)` `i64` for discrete heads, `(B, dim)` for continuous ones. A
    /// deterministic sample is the mode.
    fn sample(&self, features: &Tensor, deterministic: bool) -> Result<Tensor>;

    /// `(B, 1)`
    fn log_probs(&self, features: &Tensor, actions: &Tensor) -> Result<Tensor>;

    /// `(B,)`
    fn entropy(&self, features: &Tensor) -> Result<Tensor>;

    fn action_kind(&self) -> ActionKind;
}

#[enum_dispatch(ActionDistribution)]
#[derive(Debug, Clone)]
pub enum DistributionKind {
    Categorical(Categorical),
    DiagGaussian(DiagGaussian),
}

impl DistributionKind {
    /// Categorical head for discrete spaces, diagonal Gaussian for boxes.
    pub fn build(
        feature_dim: usize,
        action_space: &Space,
        vb: &VarBuilder,
    ) -> anyhow::Result<Self> {
        let kind = ActionKind::try_from(action_space)?;
        let distribution: Self = match (action_space, kind) {
            (Space::Discrete(num_actions), _) => {
                Categorical::new(feature_dim, *num_actions, vb)?.into()
            }
            (_, kind) => DiagGaussian::new(feature_dim, kind.width(), vb)?.into(),
        };
        Ok(distribution)
    }
}
