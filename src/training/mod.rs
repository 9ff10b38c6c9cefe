//! Model training and evaluation
//!
//! Race-level splits, metrics, the boosted rankers and the regression models.

pub mod metrics;
pub mod ranking;
pub mod regression;
pub mod split;

pub use metrics::{Evaluation, TrainingHistory};
pub use split::{holdout_split, RaceSet};
