//! Evaluation metrics and training history

use std::fmt;

use crate::model::gbdt::dcg;
use crate::RaceId;

/// Row order that sorts `values` ascending; ties keep row order
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// NDCG of one query, optionally cut at `k`
///
/// Rows are ranked by descending score; gain is linear in relevance. A query whose ideal
/// DCG is zero scores 1.
pub fn ndcg(relevance: &[f64], scores: &[f64], k: Option<usize>) -> f64 {
    let cut = k.unwrap_or(relevance.len()).min(relevance.len());

    let negated: Vec<f64> = scores.iter().map(|s| -s).collect();
    let ranked: Vec<f64> = argsort(&negated).iter().map(|&i| relevance[i]).collect();
    let mut ideal = relevance.to_vec();
    ideal.sort_by(|a, b| b.total_cmp(a));

    let ideal_dcg = dcg(&ideal[..cut]);
    if ideal_dcg <= 0.0 {
        return 1.0;
    }
    dcg(&ranked[..cut]) / ideal_dcg
}

/// Ranks starting at 1; tied values share their average rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let order = argsort(values);
    let mut ranks = vec![0.0; values.len()];

    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share the mean of ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }

    ranks
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.len() < 2 {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a == 0.0 || var_b == 0.0 {
        0.0
    } else {
        cov / (var_a * var_b).sqrt()
    }
}

/// Spearman rank correlation; 0 when either side is constant
pub fn spearman(a: &[f64], b: &[f64]) -> f64 {
    pearson(&average_ranks(a), &average_ranks(b))
}

pub fn mse(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.is_empty() {
        return 0.0;
    }
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / predicted.len() as f64
}

/// Positions where the predicted finishing order puts the right driver
///
/// `predicted_finish` is lower-is-better. The true order sorts `actual_finish`; the
/// predicted order sorts `predicted_finish`; both are compared slot by slot on the
/// actual value.
pub fn correct_positions(actual_finish: &[f64], predicted_finish: &[f64]) -> usize {
    let true_order: Vec<f64> = argsort(actual_finish).iter().map(|&i| actual_finish[i]).collect();
    let predicted_order: Vec<f64> = argsort(predicted_finish)
        .iter()
        .map(|&i| actual_finish[i])
        .collect();

    true_order
        .iter()
        .zip(&predicted_order)
        .filter(|(a, b)| a == b)
        .count()
}

/// Test-set evaluation of one model
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub model: String,
    pub mse: Option<f64>,
    /// Mean NDCG@k over races
    pub ndcg_at: Vec<(usize, f64)>,
    /// Mean full-list NDCG over races
    pub mean_ndcg: Option<f64>,
    pub spearman: f64,
    /// (race, correct positions, drivers)
    pub per_race: Vec<(RaceId, usize, usize)>,
}

impl Evaluation {
    pub fn total_correct(&self) -> usize {
        self.per_race.iter().map(|&(_, correct, _)| correct).sum()
    }

    pub fn total_rows(&self) -> usize {
        self.per_race.iter().map(|&(_, _, n)| n).sum()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.model)?;
        if let Some(mse) = self.mse {
            write!(f, " MSE {:.4}", mse)?;
        }
        for (k, value) in &self.ndcg_at {
            write!(f, " NDCG@{} {:.4}", k, value)?;
        }
        if let Some(ndcg) = self.mean_ndcg {
            write!(f, " NDCG {:.4}", ndcg)?;
        }
        write!(
            f,
            " Spearman {:.4} | correct {}/{}",
            self.spearman,
            self.total_correct(),
            self.total_rows()
        )
    }
}

/// Loss curves for the burn trainers
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record an epoch; returns true when validation loss improved
    pub fn record_epoch(&mut self, epoch: usize, train_loss: f64, val_loss: f64) -> bool {
        self.train_losses.push(train_loss);
        self.val_losses.push(val_loss);

        if val_loss < self.best_val_loss {
            self.best_val_loss = val_loss;
            self.best_epoch = epoch;
            true
        } else {
            false
        }
    }

    /// Check if we should early stop
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if patience == 0 || self.val_losses.len() < patience {
            return false;
        }
        let current_epoch = self.val_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }

    pub fn epochs(&self) -> usize {
        self.val_losses.len()
    }
}
