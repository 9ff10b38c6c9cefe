//! Race-weekend finishing order prediction
//!
//! A batch pipeline that turns exported timing data into per-driver-per-race feature rows,
//! repairs missing values, and trains ranking and regression models on the result.

pub mod data;
pub mod features;
pub mod impute;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::features::track::TrackInfo;
use crate::model::gbdt::Objective;

/// Race identifier in `YY-RR` form (two-digit season, two-digit round)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaceId {
    pub season: u8,
    pub round: u8,
}

impl RaceId {
    pub fn new(year: u16, round: u8) -> Self {
        RaceId {
            season: (year % 100) as u8,
            round,
        }
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.season, self.round)
    }
}

impl FromStr for RaceId {
    type Err = PaceError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PaceError::InvalidRaceId(s.to_string());
        let (season, round) = s.trim().split_once('-').ok_or_else(invalid)?;
        Ok(RaceId {
            season: season.parse().map_err(|_| invalid())?,
            round: round.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for RaceId {
    type Error = PaceError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RaceId> for String {
    fn from(id: RaceId) -> Self {
        id.to_string()
    }
}

/// Session weather label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Dry,
    Rainy,
    Unknown,
}

impl Weather {
    /// Binary rain flag; `Unknown` counts as dry
    pub fn is_rainy(&self) -> bool {
        matches!(self, Weather::Rainy)
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weather::Dry => write!(f, "dry"),
            Weather::Rainy => write!(f, "rainy"),
            Weather::Unknown => write!(f, "unknown"),
        }
    }
}

/// One driver at one race weekend
///
/// Field order is the column order of every observation CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub race_id: RaceId,
    pub driver: String,
    pub fp1_long_run: Option<f64>,
    pub fp1_weather: Option<Weather>,
    pub fp2_long_run: Option<f64>,
    pub fp2_weather: Option<Weather>,
    pub fp3_long_run: Option<f64>,
    pub fp3_weather: Option<Weather>,
    pub qualifying: Option<u32>,
    pub qualifying_weather: Option<Weather>,
    pub driver_perf: f64,
    pub team_perf: f64,
    pub track_type: String,
    pub race_weather: Option<Weather>,
    pub race_pace: Option<f64>,
    pub finishing_position: Option<u32>,
}

impl Observation {
    /// Practice long-run averages in session order
    pub fn long_runs(&self) -> [Option<f64>; 3] {
        [self.fp1_long_run, self.fp2_long_run, self.fp3_long_run]
    }

    pub fn set_long_runs(&mut self, values: [Option<f64>; 3]) {
        self.fp1_long_run = values[0];
        self.fp2_long_run = values[1];
        self.fp3_long_run = values[2];
    }

    /// Practice weather labels in session order
    pub fn practice_weather(&self) -> [Option<Weather>; 3] {
        [self.fp1_weather, self.fp2_weather, self.fp3_weather]
    }

    /// True when no practice long-run is known
    pub fn all_long_runs_missing(&self) -> bool {
        self.long_runs().iter().all(Option::is_none)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PaceError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid race id: {0} (expected YY-RR)")]
    InvalidRaceId(String),

    #[error("No track metadata for {0}")]
    UnknownTrack(String),

    #[error("Race not found: {0}")]
    RaceNotFound(RaceId),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model not trained - run `racepace {0}` first")]
    NoModel(&'static str),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, PaceError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub extract: ExtractConfig,
    pub impute: ImputeConfig,
    pub training: TrainingConfig,
    pub ranker: RankerConfig,
    pub regression: RegressionConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<TrackInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding one sub-directory of timing exports per season
    pub raw_dir: String,
    pub datasets_dir: String,
    pub model_dir: String,
    pub seasons: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Number of previous races in the rolling form indices
    pub form_window: usize,
    /// Points for a win, used to normalise driver form
    pub driver_points_max: f64,
    /// Best possible team haul in one race, used to normalise team form
    pub team_points_max: f64,
    /// Long-run laps are those within [fastest + lower, fastest + upper] seconds
    pub long_run_lower_offset: f64,
    pub long_run_upper_offset: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputeConfig {
    /// Donor rows averaged by the nearest-neighbour long-run fill
    pub neighbours: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Most recent races held out for evaluation
    pub holdout_races: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    pub objective: Objective,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub ndcg_at: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of the "gradient boosting" model
    pub max_depth: usize,
    /// Depth of the "boosted trees" model
    pub boosted_trees_max_depth: usize,
    pub min_samples_leaf: usize,
    pub linear_epochs: usize,
    pub linear_lr: f64,
    pub mlp_hidden: Vec<usize>,
    pub mlp_epochs: usize,
    pub mlp_lr: f64,
    pub mlp_dropout: f64,
    pub early_stopping_patience: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                raw_dir: "raw".to_string(),
                datasets_dir: "datasets".to_string(),
                model_dir: "models".to_string(),
                seasons: (2018..=2025).collect(),
            },
            extract: ExtractConfig {
                form_window: 5,
                driver_points_max: 25.0,
                team_points_max: 43.0,
                long_run_lower_offset: 1.5,
                long_run_upper_offset: 4.0,
            },
            impute: ImputeConfig { neighbours: 5 },
            training: TrainingConfig {
                holdout_races: 19,
                seed: 42,
            },
            ranker: RankerConfig {
                objective: Objective::LambdaRank,
                n_estimators: 200,
                learning_rate: 0.05,
                max_depth: 6,
                min_samples_leaf: 20,
                ndcg_at: vec![5, 10],
            },
            regression: RegressionConfig {
                n_estimators: 200,
                learning_rate: 0.05,
                max_depth: 5,
                boosted_trees_max_depth: 6,
                min_samples_leaf: 10,
                linear_epochs: 500,
                linear_lr: 0.05,
                mlp_hidden: vec![64, 32],
                mlp_epochs: 300,
                mlp_lr: 0.01,
                mlp_dropout: 0.1,
                early_stopping_patience: 30,
            },
            tracks: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PaceError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PaceError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PaceError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
