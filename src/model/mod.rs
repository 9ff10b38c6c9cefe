//! Prediction models
//!
//! - `gbdt`: boosted trees for ranking and regression
//! - `linear`, `mlp`: burn regressors on dense features

pub mod gbdt;
pub mod linear;
pub mod mlp;

pub use gbdt::{Booster, GbdtParams, Objective};
pub use linear::LinearRegressor;
pub use mlp::{MlpConfig, MlpRegressor};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::Path;

use crate::{PaceError, Result};

/// Burn model mapping a feature matrix [batch, features] to one value per row [batch, 1]
pub trait Regressor<B: Backend> {
    fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Save a module's parameters to a named MessagePack file
pub fn save_module<B, M>(module: &M, path: &Path) -> Result<()>
where
    B: Backend,
    M: Module<B>,
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(module.clone().into_record(), path.to_path_buf())
        .map_err(|e| PaceError::Model(e.to_string()))
}

/// Load parameters saved by `save_module` into a freshly built module
#[cfg(test)]
pub fn load_module<B, M>(module: M, path: &Path, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .map_err(|e| PaceError::Model(e.to_string()))?;
    Ok(module.load_record(record))
}
