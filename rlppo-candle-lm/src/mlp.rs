use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder, linear};
use either::Either;

/// Nonlinearity between linear layers. candle's `Activation` has no tanh.
#[derive(Debug, Clone, Copy)]
pub enum MlpActivation {
    Tanh,
    Candle(Activation),
}

impl From<Activation> for MlpActivation {
    fn from(activation: Activation) -> Self {
        Self::Candle(activation)
    }
}

impl Module for MlpActivation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Tanh => xs.tanh(),
            Self::Candle(activation) => activation.forward(xs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MlpLayer(pub Either<Linear, MlpActivation>);

impl MlpLayer {
    pub fn linear(linear: Linear) -> Self {
        Self(Either::Left(linear))
    }

    pub fn activation(activation: MlpActivation) -> Self {
        Self(Either::Right(activation))
    }
}

impl Module for MlpLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match &self.0 {
            Either::Left(linear) => linear.forward(xs),
            Either::Right(activation) => activation.forward(xs),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mlp {
    layers: Vec<MlpLayer>,
    output_dim: usize,
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?
        }
        Ok(xs)
    }
}

impl Mlp {
    /// Linear layers of the given sizes with `activation` in between. When
    /// `activate_output` is set the last linear layer is followed by the
    /// activation too, which is what a feature extractor feeding a separate
    /// head wants.
    pub fn build(
        input_dim: usize,
        layers: &[usize],
        activation: MlpActivation,
        activate_output: bool,
        vb: &VarBuilder,
        prefix: &str,
    ) -> Result<Self> {
        let mut last_dim = input_dim;
        let mut mlp = Self::default();
        let num_layers = layers.len();
        for (layer_idx, &layer_size) in layers.iter().enumerate() {
            let vb = vb.pp(format!("{prefix}{layer_idx}"));
            let layer = linear(last_dim, layer_size, vb)?;
            mlp = mlp.add_layer(MlpLayer::linear(layer));
            if activate_output || layer_idx + 1 < num_layers {
                mlp = mlp.add_layer(MlpLayer::activation(activation));
            }
            last_dim = layer_size;
        }
        mlp.output_dim = last_dim;
        Ok(mlp)
    }

    pub fn add_layer(mut self, layer: MlpLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Width of the output, the input width for an empty network.
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}
