//! Linear regression as a single dense layer

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::Regressor;

#[derive(Module, Debug)]
pub struct LinearRegressor<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LinearRegressor<B> {
    pub fn new(device: &B::Device, input_dim: usize) -> Self {
        LinearRegressor {
            linear: LinearConfig::new(input_dim, 1).init(device),
        }
    }
}

impl<B: Backend> Regressor<B> for LinearRegressor<B> {
    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = LinearRegressor::<NdArray<f32>>::new(&device, 16);
        let x = Tensor::<NdArray<f32>, 2>::ones([5, 16], &device);
        assert_eq!(model.forward(x).dims(), [5, 1]);
    }
}
