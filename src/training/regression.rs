//! Relative-finish regression
//!
//! Linear regression and an MLP trained with burn, plus two boosted-tree configurations.
//! Every model predicts `relative_finish` per row; a race's predicted order sorts those
//! predictions ascending.

use burn::backend::{Autodiff, NdArray};
use burn::data::dataloader::batcher::Batcher;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use std::path::PathBuf;

use crate::features::encoding::{EncodedRow, FEATURE_NAMES};
use crate::model::gbdt::{Booster, GbdtParams, Objective};
use crate::model::{save_module, LinearRegressor, MlpConfig, MlpRegressor, Regressor};
use crate::training::metrics::{correct_positions, mse, spearman, Evaluation, TrainingHistory};
use crate::training::split::{holdout_split, validation_split, RaceSet, RowBatch, RowBatcher};
use crate::{Config, PaceError, RegressionConfig, Result};

pub type TrainBackend = Autodiff<NdArray<f32>>;

/// Share of training races used for early stopping
const VALIDATION_FRACTION: f64 = 0.15;

pub const LINEAR_FILE: &str = "linear_regression";
pub const MLP_FILE: &str = "mlp_regression";
pub const GRADIENT_BOOSTING_FILE: &str = "gradient_boosting.json";
pub const BOOSTED_TREES_FILE: &str = "boosted_trees.json";

fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).powf_scalar(2.0).mean()
}

/// Full-batch gradient descent with early stopping on validation loss
///
/// Returns the parameters of the best validation epoch.
pub fn fit_regressor<B, M, O>(
    mut model: M,
    mut optimizer: O,
    learning_rate: f64,
    epochs: usize,
    patience: usize,
    train: &RowBatch<B>,
    val: &RowBatch<B::InnerBackend>,
) -> (M, TrainingHistory)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Regressor<B>,
    M::InnerModule: Regressor<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    let mut history = TrainingHistory::new();
    let mut best = model.clone();

    for epoch in 0..epochs {
        let loss = mse_loss(model.forward(train.features.clone()), train.targets.clone());
        let train_loss: f32 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(learning_rate, model, grads);

        let val_predictions = model.valid().forward(val.features.clone());
        let val_loss: f32 = mse_loss(val_predictions, val.targets.clone()).into_scalar().elem();

        if history.record_epoch(epoch, train_loss as f64, val_loss as f64) {
            best = model.clone();
        }

        if epoch % 50 == 0 || epoch + 1 == epochs {
            log::debug!(
                "Epoch {}/{}: train_loss={:.5}, val_loss={:.5}",
                epoch + 1,
                epochs,
                train_loss,
                val_loss
            );
        }

        if history.should_early_stop(patience) {
            log::info!(
                "Early stopping at epoch {} (best was epoch {})",
                epoch + 1,
                history.best_epoch + 1
            );
            break;
        }
    }

    (best, history)
}

/// Predictions of a trained burn model, one per row
pub fn predict_rows<B: Backend, M: Regressor<B>>(model: &M, features: Tensor<B, 2>) -> Result<Vec<f64>> {
    let data = model.forward(features).into_data();
    let values: Vec<f32> = data
        .to_vec()
        .map_err(|e| PaceError::Model(format!("{:?}", e)))?;
    Ok(values.into_iter().map(f64::from).collect())
}

/// Evaluate relative-finish predictions on a test set
pub fn evaluate_regression(name: &str, test: &RaceSet, predictions: &[f64]) -> Evaluation {
    let mut evaluation = Evaluation {
        model: name.to_string(),
        mse: Some(mse(predictions, &test.relative_finish)),
        spearman: spearman(&test.relative_finish, predictions),
        ..Default::default()
    };

    for (race, members) in &test.groups {
        let actual: Vec<f64> = members.iter().map(|&i| test.relative_finish[i]).collect();
        let predicted: Vec<f64> = members.iter().map(|&i| predictions[i]).collect();
        evaluation
            .per_race
            .push((*race, correct_positions(&actual, &predicted), members.len()));
    }

    evaluation
}

fn gbdt_params(config: &RegressionConfig, max_depth: usize) -> GbdtParams {
    GbdtParams {
        objective: Objective::SquaredError,
        n_estimators: config.n_estimators,
        learning_rate: config.learning_rate,
        max_depth,
        min_samples_leaf: config.min_samples_leaf,
    }
}

/// Trains every regression model of the stage
pub struct RegressionTrainer<'a> {
    config: &'a RegressionConfig,
    seed: u64,
    model_dir: PathBuf,
    device: <TrainBackend as Backend>::Device,
}

impl<'a> RegressionTrainer<'a> {
    pub fn new(config: &'a Config) -> Self {
        RegressionTrainer {
            config: &config.regression,
            seed: config.training.seed,
            model_dir: PathBuf::from(&config.data.model_dir),
            device: Default::default(),
        }
    }

    fn batches(
        &self,
        train: &RaceSet,
    ) -> (RowBatch<TrainBackend>, RowBatch<NdArray<f32>>) {
        let (fit, val) = validation_split(train, VALIDATION_FRACTION, self.seed);
        log::debug!(
            "Validation split: {} fit races, {} validation races",
            fit.race_count(),
            val.race_count()
        );
        (
            RowBatcher.batch(fit.items(), &self.device),
            RowBatcher.batch(val.items(), &self.device),
        )
    }

    pub fn linear(&self, train: &RaceSet, test: &RaceSet) -> Result<Evaluation> {
        let (fit, val) = self.batches(train);

        log::info!("Training linear regression for {} epochs", self.config.linear_epochs);
        let model = LinearRegressor::<TrainBackend>::new(&self.device, FEATURE_NAMES.len());
        let (model, history) = fit_regressor(
            model,
            AdamConfig::new().init(),
            self.config.linear_lr,
            self.config.linear_epochs,
            self.config.early_stopping_patience,
            &fit,
            &val,
        );
        log::info!("  best validation MSE {:.5} at epoch {}", history.best_val_loss, history.best_epoch + 1);

        let model = model.valid();
        save_module(&model, &self.model_dir.join(LINEAR_FILE))?;
        let test_batch: RowBatch<NdArray<f32>> = RowBatcher.batch(test.items(), &self.device);
        let predictions = predict_rows(&model, test_batch.features)?;
        Ok(evaluate_regression("Linear Regression", test, &predictions))
    }

    pub fn mlp(&self, train: &RaceSet, test: &RaceSet) -> Result<Evaluation> {
        let (fit, val) = self.batches(train);

        let mlp_config = MlpConfig {
            input_dim: FEATURE_NAMES.len(),
            hidden_dims: self.config.mlp_hidden.clone(),
            dropout: self.config.mlp_dropout,
        };
        log::info!(
            "Training MLP {:?} for {} epochs",
            mlp_config.hidden_dims,
            self.config.mlp_epochs
        );
        let model = MlpRegressor::<TrainBackend>::new(&self.device, &mlp_config);
        let (model, history) = fit_regressor(
            model,
            AdamConfig::new().init(),
            self.config.mlp_lr,
            self.config.mlp_epochs,
            self.config.early_stopping_patience,
            &fit,
            &val,
        );
        log::info!("  best validation MSE {:.5} at epoch {}", history.best_val_loss, history.best_epoch + 1);

        let model = model.valid();
        save_module(&model, &self.model_dir.join(MLP_FILE))?;
        let test_batch: RowBatch<NdArray<f32>> = RowBatcher.batch(test.items(), &self.device);
        let predictions = predict_rows(&model, test_batch.features)?;
        Ok(evaluate_regression("MLP", test, &predictions))
    }

    /// Boosted trees at the given depth
    pub fn gbdt(
        &self,
        name: &str,
        file: &str,
        max_depth: usize,
        train: &RaceSet,
        test: &RaceSet,
    ) -> Result<Evaluation> {
        log::info!("Training {} (depth {})", name, max_depth);
        let model = Booster::fit(
            &train.features,
            &train.relative_finish,
            &[],
            &gbdt_params(self.config, max_depth),
        )?;
        model.save(self.model_dir.join(file))?;
        Ok(evaluate_regression(name, test, &model.predict(&test.features)))
    }
}

/// Train and evaluate every regression model
pub fn run(rows: &[EncodedRow], config: &Config) -> Result<Vec<Evaluation>> {
    let (train, test) = holdout_split(rows, config.training.holdout_races)?;
    let trainer = RegressionTrainer::new(config);

    let evaluations = vec![
        trainer.linear(&train, &test)?,
        trainer.mlp(&train, &test)?,
        trainer.gbdt(
            "Gradient Boosting",
            GRADIENT_BOOSTING_FILE,
            config.regression.max_depth,
            &train,
            &test,
        )?,
        trainer.gbdt(
            "Boosted Trees",
            BOOSTED_TREES_FILE,
            config.regression.boosted_trees_max_depth,
            &train,
            &test,
        )?,
    ];

    for evaluation in &evaluations {
        log::info!("{}", evaluation);
    }
    Ok(evaluations)
}
