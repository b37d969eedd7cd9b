use crate::tensors::{PolicyLoss, ValueLoss};
use candle_core::{Result, Tensor};

/// Clipped surrogate objective, negated so it can be minimized.
pub fn policy_loss(ratio: &Tensor, advantages: &Tensor, clip_param: f32) -> Result<PolicyLoss> {
    let surr1 = (ratio * advantages)?;
    let surr2 = (ratio.clamp(1. - clip_param, 1. + clip_param)? * advantages)?;
    Ok(PolicyLoss(surr1.minimum(&surr2)?.mean_all()?.neg()?))
}

/// Half mean squared error between values and returns. With `clip_param` the
/// new values are also clipped to within `clip_param` of the stored ones and
/// the larger of the two errors is kept.
pub fn value_loss(
    values: &Tensor,
    old_values: &Tensor,
    returns: &Tensor,
    clip_param: Option<f32>,
) -> Result<ValueLoss> {
    let value_losses = (values - returns)?.sqr()?;
    let loss = match clip_param {
        Some(clip) => {
            let clipped = (old_values + (values - old_values)?.clamp(-clip, clip)?)?;
            let clipped_losses = (clipped - returns)?.sqr()?;
            value_losses.maximum(&clipped_losses)?.mean_all()?
        }
        None => value_losses.mean_all()?,
    };
    Ok(ValueLoss(loss.affine(0.5, 0.)?))
}

#[cfg(test)]
mod test {
    use super::{policy_loss, value_loss};
    use candle_core::{Device, Result, Tensor};

    fn column(values: &[f32]) -> Result<Tensor> {
        Tensor::from_slice(values, (values.len(), 1), &Device::Cpu)
    }

    #[test]
    fn unit_ratio_gives_negative_mean_advantage() -> Result<()> {
        let ratio = column(&[1., 1., 1., 1.])?;
        let advantages = column(&[1., -2., 0.5, 3.])?;
        let loss = policy_loss(&ratio, &advantages, 0.2)?.to_scalar::<f32>()?;
        assert!((loss + 0.625).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn ratio_is_clipped_pessimistically() -> Result<()> {
        // a large ratio on a positive advantage is capped at 1 + clip,
        // a small ratio on a negative advantage is floored at 1 - clip
        let ratio = column(&[2., 0.5])?;
        let advantages = column(&[1., -1.])?;
        let loss = policy_loss(&ratio, &advantages, 0.2)?.to_scalar::<f32>()?;
        let expected = -(1.2 * 1. + 0.8 * -1.) / 2.;
        assert!((loss - expected).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn clipped_and_unclipped_coincide_on_stored_values() -> Result<()> {
        let values = column(&[0.1, -0.4, 2.0])?;
        let returns = column(&[1.0, 0.0, -1.0])?;
        let clipped = value_loss(&values, &values, &returns, Some(0.2))?.to_scalar::<f32>()?;
        let plain = value_loss(&values, &values, &returns, None)?.to_scalar::<f32>()?;
        assert!((clipped - plain).abs() < 1e-6);
        let expected = 0.5 * (0.81 + 0.16 + 9.0) / 3.;
        assert!((plain - expected).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn clipped_value_loss_keeps_the_larger_error() -> Result<()> {
        let old = column(&[0.])?;
        let returns = column(&[1.])?;
        // moving 0.9 towards the return is clipped to 0.2, so the error stays large
        let values = column(&[0.9])?;
        let clipped = value_loss(&values, &old, &returns, Some(0.2))?.to_scalar::<f32>()?;
        assert!((clipped - 0.5 * 0.64).abs() < 1e-6);
        let plain = value_loss(&values, &old, &returns, None)?.to_scalar::<f32>()?;
        assert!((plain - 0.5 * 0.01).abs() < 1e-6);
        Ok(())
    }
}
