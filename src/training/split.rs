//! Race-level train/test split and tensor batching

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::group_by_race;
use crate::features::encoding::{EncodedRow, FEATURE_NAMES};
use crate::{PaceError, RaceId, Result};

/// Dense view of a set of races
#[derive(Debug, Clone, Default)]
pub struct RaceSet {
    pub race_ids: Vec<RaceId>,
    pub drivers: Vec<String>,
    pub features: Vec<Vec<f32>>,
    pub relative_finish: Vec<f64>,
    /// Row indices per race, races in dataset order
    pub groups: Vec<(RaceId, Vec<usize>)>,
}

impl RaceSet {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a EncodedRow>) -> Self {
        let mut set = RaceSet::default();
        for row in rows {
            set.race_ids.push(row.race_id);
            set.drivers.push(row.driver.clone());
            set.features.push(row.features());
            set.relative_finish.push(row.relative_finish);
        }
        set.groups = group_by_race(&set.race_ids, |&id| id);
        set
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn race_count(&self) -> usize {
        self.groups.len()
    }

    /// Group row indices without race ids, as the boosters take them
    pub fn group_indices(&self) -> Vec<Vec<usize>> {
        self.groups.iter().map(|(_, members)| members.clone()).collect()
    }

    /// Subset by races; `keep` is called once per race
    pub fn filter_races(&self, keep: impl Fn(RaceId) -> bool) -> Self {
        let mut rows: Vec<usize> = Vec::new();
        for (race, members) in &self.groups {
            if keep(*race) {
                rows.extend(members);
            }
        }

        let mut set = RaceSet::default();
        for &i in &rows {
            set.race_ids.push(self.race_ids[i]);
            set.drivers.push(self.drivers[i].clone());
            set.features.push(self.features[i].clone());
            set.relative_finish.push(self.relative_finish[i]);
        }
        set.groups = group_by_race(&set.race_ids, |&id| id);
        set
    }

    /// Items for the tensor batcher, target `relative_finish`
    pub fn items(&self) -> Vec<RowItem> {
        self.features
            .iter()
            .zip(&self.relative_finish)
            .map(|(features, &target)| RowItem {
                features: features.clone(),
                target: target as f32,
            })
            .collect()
    }
}

/// Hold out the last `holdout_races` races (in order of first appearance)
pub fn holdout_split(rows: &[EncodedRow], holdout_races: usize) -> Result<(RaceSet, RaceSet)> {
    let all = RaceSet::from_rows(rows);
    let races = all.race_count();
    if races <= holdout_races || holdout_races == 0 {
        return Err(PaceError::InsufficientData(format!(
            "{} races available, need more than the {} held out",
            races, holdout_races
        )));
    }

    let test_races: Vec<RaceId> = all.groups[races - holdout_races..]
        .iter()
        .map(|(race, _)| *race)
        .collect();
    let train = all.filter_races(|race| !test_races.contains(&race));
    let test = all.filter_races(|race| test_races.contains(&race));

    log::info!(
        "Split: {} train races ({} rows), {} test races ({} rows)",
        train.race_count(),
        train.len(),
        test.race_count(),
        test.len()
    );
    Ok((train, test))
}

/// Seeded random split of training races into fit and validation races
///
/// About `fraction` of the races (at least one) go to validation. With a single race
/// both sides get it.
pub fn validation_split(train: &RaceSet, fraction: f64, seed: u64) -> (RaceSet, RaceSet) {
    let mut races: Vec<RaceId> = train.groups.iter().map(|(race, _)| *race).collect();
    if races.len() < 2 {
        return (train.clone(), train.clone());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    races.shuffle(&mut rng);
    let n_val = ((races.len() as f64 * fraction).round() as usize).clamp(1, races.len() - 1);
    let val_races = &races[..n_val];

    (
        train.filter_races(|race| !val_races.contains(&race)),
        train.filter_races(|race| val_races.contains(&race)),
    )
}

/// One row for the burn regressors
#[derive(Debug, Clone)]
pub struct RowItem {
    pub features: Vec<f32>,
    pub target: f32,
}

/// Full feature matrix and targets
#[derive(Debug, Clone)]
pub struct RowBatch<B: Backend> {
    /// [batch, features]
    pub features: Tensor<B, 2>,
    /// [batch, 1]
    pub targets: Tensor<B, 2>,
}

/// Batcher stacking rows into dense tensors
#[derive(Debug, Clone, Default)]
pub struct RowBatcher;

impl<B: Backend> Batcher<B, RowItem, RowBatch<B>> for RowBatcher {
    fn batch(&self, items: Vec<RowItem>, device: &B::Device) -> RowBatch<B> {
        let batch_size = items.len();
        let dim = items
            .first()
            .map(|item| item.features.len())
            .unwrap_or(FEATURE_NAMES.len());

        let mut features = Vec::with_capacity(batch_size * dim);
        let mut targets = Vec::with_capacity(batch_size);
        for item in &items {
            features.extend_from_slice(&item.features);
            targets.push(item.target);
        }

        RowBatch {
            features: Tensor::<B, 1>::from_floats(features.as_slice(), device)
                .reshape([batch_size, dim]),
            targets: Tensor::<B, 1>::from_floats(targets.as_slice(), device)
                .reshape([batch_size, 1]),
        }
    }
}
