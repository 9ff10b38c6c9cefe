//! Feed-forward regressor
//!
//! Architecture: Input → [Linear → ReLU → Dropout] × hidden layers → Linear(1)

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::Regressor;

/// Configuration for the MLP regressor
#[derive(Debug, Clone)]
pub struct MlpConfig {
    pub input_dim: usize,
    /// Hidden layer widths, e.g. [64, 32] for two layers
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        MlpConfig {
            input_dim: crate::features::FEATURE_NAMES.len(),
            hidden_dims: vec![64, 32],
            dropout: 0.1,
        }
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Multi-layer perceptron with a single continuous output
#[derive(Module, Debug)]
pub struct MlpRegressor<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    output: Linear<B>,
}

impl<B: Backend> MlpRegressor<B> {
    pub fn new(device: &B::Device, config: &MlpConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &width in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, width, config.dropout));
            in_dim = width;
        }

        MlpRegressor {
            hidden,
            output: LinearConfig::new(in_dim, 1).init(device),
        }
    }
}

impl<B: Backend> Regressor<B> for MlpRegressor<B> {
    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(features, |x, block| block.forward(x));
        self.output.forward(x)
    }
}
