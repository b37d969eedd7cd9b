use super::ActionDistribution;
use candle_core::{Module, Result, Tensor};
use candle_nn::{Init, Linear, VarBuilder, linear};
use rlppo_core::env::ActionKind;
use std::f32::consts::PI;

/// Gaussian with a learned state independent standard deviation.
#[derive(Debug, Clone)]
pub struct DiagGaussian {
    mean: Linear,
    log_std: Tensor,
    dim: usize,
}

impl DiagGaussian {
    pub fn new(feature_dim: usize, dim: usize, vb: &VarBuilder) -> Result<Self> {
        let mean = linear(feature_dim, dim, vb.pp("mean"))?;
        let log_std = vb.get_with_hints(dim, "log_std", Init::Const(0.))?;
        Ok(Self { mean, log_std, dim })
    }

    pub fn std(&self) -> Result<f32> {
        self.log_std.exp()?.mean_all()?.to_scalar::<f32>()
    }
}

impl ActionDistribution for DiagGaussian {
    fn sample(&self, features: &Tensor, deterministic: bool) -> Result<Tensor> {
        let mean = self.mean.forward(features)?;
        if deterministic {
            return Ok(mean);
        }
        let noise = Tensor::randn(0f32, 1., mean.shape(), mean.device())?;
        let std = self.log_std.exp()?;
        mean + noise.broadcast_mul(&std)?
    }

    fn log_probs(&self, features: &Tensor, actions: &Tensor) -> Result<Tensor> {
        let mean = self.mean.forward(features)?;
        let actions = actions.reshape(mean.shape())?;
        let var = self.log_std.exp()?.sqr()?;
        let log_sqrt_2pi = f32::ln(f32::sqrt(2. * PI)) as f64;
        let log_probs = (actions - &mean)?
            .sqr()?
            .broadcast_div(&(var * 2.)?)?
            .neg()?
            .broadcast_sub(&self.log_std)?
            .affine(1., -log_sqrt_2pi)?;
        log_probs.sum_keepdim(1)
    }

    fn entropy(&self, features: &Tensor) -> Result<Tensor> {
        let batch = features.dim(0)?;
        let per_dim = 0.5 + 0.5 * (2. * PI).ln();
        let entropy = self.log_std.affine(1., per_dim as f64)?.sum_all()?;
        entropy.broadcast_as(batch)
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::Continuous { dim: self.dim }
    }
}
