//! Finishing-order rankers
//!
//! Each race is a query. Drivers get a rank label 1..n by relative finish, and the rankers
//! learn relevance `n - rank_label`, so the winner is the most relevant row.

use std::path::{Path, PathBuf};

use crate::features::encoding::EncodedRow;
use crate::model::gbdt::{Booster, GbdtParams, Objective};
use crate::training::metrics::{correct_positions, ndcg, spearman, Evaluation};
use crate::training::split::{holdout_split, RaceSet};
use crate::{Config, RankerConfig, Result};

/// Saved model file for a ranking objective
pub fn ranker_path(model_dir: &Path, objective: Objective) -> PathBuf {
    model_dir.join(format!("ranker_{}.json", objective))
}

/// Rank label 1..n per race by ascending relative finish; ties keep row order
pub fn rank_labels(set: &RaceSet) -> Vec<u32> {
    let mut labels = vec![0; set.len()];
    for (_, members) in &set.groups {
        let mut order = members.clone();
        order.sort_by(|&a, &b| set.relative_finish[a].total_cmp(&set.relative_finish[b]));
        for (rank, &i) in order.iter().enumerate() {
            labels[i] = rank as u32 + 1;
        }
    }
    labels
}

/// Relevance grade `n - rank_label` per row
pub fn relevance(set: &RaceSet, labels: &[u32]) -> Vec<f64> {
    let mut grades = vec![0.0; set.len()];
    for (_, members) in &set.groups {
        let n = members.len() as f64;
        for &i in members {
            grades[i] = n - labels[i] as f64;
        }
    }
    grades
}

fn params(config: &RankerConfig, objective: Objective) -> GbdtParams {
    GbdtParams {
        objective,
        n_estimators: config.n_estimators,
        learning_rate: config.learning_rate,
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
    }
}

/// Evaluate ranking scores (higher is better) on a test set
pub fn evaluate_ranking(name: &str, test: &RaceSet, scores: &[f64], ndcg_at: &[usize]) -> Evaluation {
    let labels = rank_labels(test);
    let grades = relevance(test, &labels);
    let races = test.race_count().max(1) as f64;

    let mut evaluation = Evaluation {
        model: name.to_string(),
        ..Default::default()
    };

    let mut mean_ndcg = 0.0;
    let mut at_k = vec![0.0; ndcg_at.len()];
    for (race, members) in &test.groups {
        let rel: Vec<f64> = members.iter().map(|&i| grades[i]).collect();
        let race_scores: Vec<f64> = members.iter().map(|&i| scores[i]).collect();

        mean_ndcg += ndcg(&rel, &race_scores, None);
        for (sum, &k) in at_k.iter_mut().zip(ndcg_at) {
            *sum += ndcg(&rel, &race_scores, Some(k));
        }

        let actual: Vec<f64> = members.iter().map(|&i| labels[i] as f64).collect();
        let predicted: Vec<f64> = race_scores.iter().map(|s| -s).collect();
        evaluation.per_race.push((*race, correct_positions(&actual, &predicted), members.len()));
    }

    evaluation.mean_ndcg = Some(mean_ndcg / races);
    evaluation.ndcg_at = ndcg_at.iter().copied().zip(at_k.into_iter().map(|s| s / races)).collect();

    let true_rank: Vec<f64> = labels.iter().map(|&l| l as f64).collect();
    let predicted_finish: Vec<f64> = scores.iter().map(|s| -s).collect();
    evaluation.spearman = spearman(&true_rank, &predicted_finish);

    evaluation
}

/// Train one ranker on the training races
pub fn train_ranker(train: &RaceSet, config: &RankerConfig, objective: Objective) -> Result<Booster> {
    let labels = rank_labels(train);
    let grades = relevance(train, &labels);
    log::info!(
        "Training {} ranker on {} races ({} rows)",
        objective,
        train.race_count(),
        train.len()
    );
    Booster::fit(&train.features, &grades, &train.group_indices(), &params(config, objective))
}

/// Train and evaluate both rankers, saving them under the model directory
pub fn run(rows: &[EncodedRow], config: &Config) -> Result<Vec<Evaluation>> {
    let (train, test) = holdout_split(rows, config.training.holdout_races)?;
    let model_dir = Path::new(&config.data.model_dir);

    let mut evaluations = Vec::new();
    for objective in [Objective::LambdaRank, Objective::Pairwise] {
        let model = train_ranker(&train, &config.ranker, objective)?;
        let scores = model.predict(&test.features);
        let evaluation = evaluate_ranking(
            &format!("GBDT ranker ({})", objective),
            &test,
            &scores,
            &config.ranker.ndcg_at,
        );
        log::info!("{}", evaluation);
        model.save(ranker_path(model_dir, objective))?;
        evaluations.push(evaluation);
    }

    Ok(evaluations)
}
