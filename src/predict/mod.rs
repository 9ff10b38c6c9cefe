//! Race prediction
//!
//! Load a saved ranker and order one race of the scaled dataset by its scores.

use std::fmt;
use std::path::Path;

use crate::data::dataset::{self, SCALED_FILE};
use crate::features::encoding::EncodedRow;
use crate::model::gbdt::{Booster, Objective};
use crate::training::metrics::correct_positions;
use crate::training::ranking::{rank_labels, ranker_path};
use crate::training::split::RaceSet;
use crate::{Config, PaceError, RaceId, Result};

/// One slot of a predicted finishing order
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedPlace {
    /// Predicted position, starting at 1
    pub position: usize,
    pub driver: String,
    pub score: f64,
    pub actual_rank: u32,
}

/// Predicted finishing order of one race
#[derive(Debug, Clone)]
pub struct RacePrediction {
    pub race_id: RaceId,
    pub objective: Objective,
    pub places: Vec<PredictedPlace>,
}

impl RacePrediction {
    /// Slots where the predicted driver matches the actual result
    pub fn correct(&self) -> usize {
        let actual: Vec<f64> = self.places.iter().map(|p| p.actual_rank as f64).collect();
        let predicted: Vec<f64> = self.places.iter().map(|p| p.position as f64).collect();
        correct_positions(&actual, &predicted)
    }
}

impl fmt::Display for RacePrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Race {} ({} ranker)", self.race_id, self.objective)?;
        writeln!(f, "{:>4}  {:<8} {:>9}  {:>6}", "Pos", "Driver", "Score", "Actual")?;
        for place in &self.places {
            writeln!(
                f,
                "{:>4}  {:<8} {:>9.4}  {:>6}",
                place.position, place.driver, place.score, place.actual_rank
            )?;
        }
        write!(f, "Correct positions: {}/{}", self.correct(), self.places.len())
    }
}

/// A loaded ranker
pub struct Predictor {
    model: Booster,
    objective: Objective,
}

impl Predictor {
    pub fn new(model: Booster, objective: Objective) -> Self {
        Predictor { model, objective }
    }

    /// Load the ranker saved for `objective` by the rank stage
    pub fn load(model_dir: &Path, objective: Objective) -> Result<Self> {
        let path = ranker_path(model_dir, objective);
        if !path.exists() {
            return Err(PaceError::NoModel("rank"));
        }
        log::debug!("Loading ranker from {}", path.display());
        Ok(Self::new(Booster::load(path)?, objective))
    }

    /// Predicted order of `race`, highest score first
    pub fn predict_race(&self, rows: &[EncodedRow], race: RaceId) -> Result<RacePrediction> {
        let set = RaceSet::from_rows(rows.iter().filter(|row| row.race_id == race));
        if set.is_empty() {
            return Err(PaceError::RaceNotFound(race));
        }

        let labels = rank_labels(&set);
        let scores = self.model.predict(&set.features);

        let mut order: Vec<usize> = (0..set.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let places = order
            .into_iter()
            .enumerate()
            .map(|(slot, i)| PredictedPlace {
                position: slot + 1,
                driver: set.drivers[i].clone(),
                score: scores[i],
                actual_rank: labels[i],
            })
            .collect();

        Ok(RacePrediction {
            race_id: race,
            objective: self.objective,
            places,
        })
    }
}

/// Predict one race with the configured ranker
pub fn run(config: &Config, race: RaceId) -> Result<RacePrediction> {
    if !config.ranker.objective.is_ranking() {
        return Err(PaceError::Config(format!(
            "ranker.objective must be lambdarank or pairwise, got {}",
            config.ranker.objective
        )));
    }
    let predictor = Predictor::load(Path::new(&config.data.model_dir), config.ranker.objective)?;

    let path = Path::new(&config.data.datasets_dir).join(SCALED_FILE);
    let rows: Vec<EncodedRow> = dataset::load(&path)?;
    log::info!("Loaded {} rows from {}", rows.len(), path.display());

    predictor.predict_race(&rows, race)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gbdt::GbdtParams;
    use crate::training::split::tests::encoded_rows;

    fn ranker(rows: &[EncodedRow]) -> Booster {
        let set = RaceSet::from_rows(rows);
        let labels = rank_labels(&set);
        let grades = crate::training::ranking::relevance(&set, &labels);
        let params = GbdtParams {
            objective: Objective::LambdaRank,
            n_estimators: 20,
            learning_rate: 0.2,
            max_depth: 3,
            min_samples_leaf: 2,
        };
        Booster::fit(&set.features, &grades, &set.group_indices(), &params).unwrap()
    }

    #[test]
    fn test_predict_race_orders_by_score() {
        let rows = encoded_rows(6, 5);
        let predictor = Predictor::new(ranker(&rows), Objective::LambdaRank);

        let prediction = predictor.predict_race(&rows, RaceId::new(2023, 3)).unwrap();
        assert_eq!(prediction.places.len(), 5);
        assert!(prediction
            .places
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
        assert_eq!(prediction.places[0].driver, "D00");
        assert_eq!(prediction.correct(), 5);
    }

    #[test]
    fn test_unknown_race() {
        let rows = encoded_rows(3, 4);
        let predictor = Predictor::new(ranker(&rows), Objective::LambdaRank);
        assert!(matches!(
            predictor.predict_race(&rows, RaceId::new(2024, 1)),
            Err(PaceError::RaceNotFound(_))
        ));
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Predictor::load(dir.path(), Objective::Pairwise),
            Err(PaceError::NoModel("rank"))
        ));
    }

    #[test]
    fn test_regression_objective_rejected() {
        let mut config = Config::default();
        config.ranker.objective = Objective::SquaredError;
        assert!(matches!(
            run(&config, RaceId::new(2023, 1)),
            Err(PaceError::Config(_))
        ));
    }

    #[test]
    fn test_run_from_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.model_dir = dir.path().to_string_lossy().to_string();
        config.data.datasets_dir = dir.path().to_string_lossy().to_string();

        let rows = encoded_rows(4, 4);
        dataset::save(dir.path().join(SCALED_FILE), &rows).unwrap();
        ranker(&rows)
            .save(ranker_path(dir.path(), config.ranker.objective))
            .unwrap();

        let prediction = run(&config, RaceId::new(2023, 2)).unwrap();
        assert_eq!(prediction.race_id, RaceId::new(2023, 2));
        assert!(prediction.to_string().contains("Correct positions"));
    }
}
