use super::{ActionBatch, TensorBuffer};
use crate::env::ActionKind;
use candle_core::{DType, Device, Result, Tensor};

impl TensorBuffer {
    pub fn to_candle(&self, device: &Device) -> Result<Tensor> {
        Tensor::from_slice(self.data.as_slice(), self.shape.clone(), device)
    }

    pub fn from_candle(tensor: &Tensor) -> Result<Self> {
        let shape = tensor.dims().to_vec();
        let data = tensor.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        Ok(Self { data, shape })
    }
}

impl ActionBatch {
    /// Discrete actions become an `(B, 1)` `i64` tensor, continuous actions keep
    /// their `(B, dim)` shape.
    pub fn to_candle(&self, device: &Device) -> Result<Tensor> {
        match self {
            Self::Discrete(actions) => {
                Tensor::from_slice(actions.as_slice(), (actions.len(), 1), device)
            }
            Self::Continuous(actions) => actions.to_candle(device),
        }
    }

    pub fn from_candle(tensor: &Tensor, kind: ActionKind) -> Result<Self> {
        match kind {
            ActionKind::Discrete => {
                let actions = tensor.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
                Ok(Self::Discrete(actions))
            }
            ActionKind::Continuous { dim } => {
                let data = tensor.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
                let rows = data.len() / dim.max(1);
                Ok(Self::Continuous(TensorBuffer::new(data, vec![rows, dim])))
            }
        }
    }
}
