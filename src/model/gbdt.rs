//! Gradient-boosted regression trees
//!
//! Each round fits an exact-greedy CART tree to the per-row gradient and hessian of the
//! objective. Split gain is `GL²/HL + GR²/HR - GP²/HP` and a leaf predicts `-G/H`, scaled
//! by the learning rate when added to the ensemble.
//!
//! Ranking objectives read the target as a relevance grade (higher is better) and only
//! compare rows inside the same group.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::{PaceError, Result};

/// Keeps `-G/H` finite for leaves whose hessian vanishes
const HESSIAN_EPS: f64 = 1e-6;

/// Training objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    /// Least squares regression
    SquaredError,
    /// RankNet logistic loss over every ordered pair in a group
    Pairwise,
    /// Pair loss weighted by the NDCG change of swapping the pair
    LambdaRank,
}

impl Objective {
    pub fn is_ranking(&self) -> bool {
        !matches!(self, Objective::SquaredError)
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::SquaredError => write!(f, "squarederror"),
            Objective::Pairwise => write!(f, "pairwise"),
            Objective::LambdaRank => write!(f, "lambdarank"),
        }
    }
}

/// Boosting hyperparameters
#[derive(Debug, Clone)]
pub struct GbdtParams {
    pub objective: Objective,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for GbdtParams {
    fn default() -> Self {
        GbdtParams {
            objective: Objective::SquaredError,
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 6,
            min_samples_leaf: 20,
        }
    }
}

/// Tree node; leaves carry a value, internal nodes a split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature: usize,
    /// Rows with `x[feature] <= threshold` go left
    pub threshold: f32,
    pub left: usize,
    pub right: usize,
    pub value: Option<f64>,
}

impl Node {
    fn leaf(value: f64) -> Self {
        Node {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

/// One regression tree, root at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, features: &[f32]) -> f64 {
        let mut idx = 0;
        while let Some(node) = self.nodes.get(idx) {
            if let Some(value) = node.value {
                return value;
            }
            idx = match features.get(node.feature) {
                Some(&x) if x <= node.threshold => node.left,
                Some(_) => node.right,
                None => return 0.0,
            };
        }
        0.0
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, idx: usize) -> usize {
            match tree.nodes.get(idx) {
                Some(node) if node.value.is_none() => 1 + walk(tree, node.left).max(walk(tree, node.right)),
                _ => 0,
            }
        }
        walk(self, 0)
    }
}

struct Split {
    feature: usize,
    threshold: f32,
    gain: f64,
}

/// Exact-greedy CART on gradient/hessian sums
struct TreeBuilder<'a> {
    features: &'a [Vec<f32>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    max_depth: usize,
    min_samples_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    fn build(&self) -> Tree {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.features.len()).collect();
        self.build_node(&indices, 0, &mut nodes);
        Tree { nodes }
    }

    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }

    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let current = nodes.len();
        let (g, h) = self.sums(indices);
        let leaf_value = -g / (h + HESSIAN_EPS);

        if depth >= self.max_depth || indices.len() < 2 * self.min_samples_leaf.max(1) {
            nodes.push(Node::leaf(leaf_value));
            return current;
        }

        let split = match self.find_best_split(indices, g, h) {
            Some(split) => split,
            None => {
                nodes.push(Node::leaf(leaf_value));
                return current;
            }
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature] <= split.threshold);

        // Reserve the slot, children are appended after it
        nodes.push(Node {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });
        let left_idx = self.build_node(&left, depth + 1, nodes);
        let right_idx = self.build_node(&right, depth + 1, nodes);
        nodes[current].left = left_idx;
        nodes[current].right = right_idx;

        current
    }

    fn find_best_split(&self, indices: &[usize], g_parent: f64, h_parent: f64) -> Option<Split> {
        let min_leaf = self.min_samples_leaf.max(1);
        let parent_score = g_parent * g_parent / (h_parent + HESSIAN_EPS);
        let feature_count = self.features.first().map(|f| f.len()).unwrap_or(0);
        let mut best: Option<Split> = None;

        for feature in 0..feature_count {
            let mut sorted = indices.to_vec();
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for k in 0..sorted.len().saturating_sub(1) {
                let i = sorted[k];
                g_left += self.gradients[i];
                h_left += self.hessians[i];

                let here = self.features[i][feature];
                let next = self.features[sorted[k + 1]][feature];
                if here == next || k + 1 < min_leaf || sorted.len() - (k + 1) < min_leaf {
                    continue;
                }

                let g_right = g_parent - g_left;
                let h_right = h_parent - h_left;
                let gain = g_left * g_left / (h_left + HESSIAN_EPS)
                    + g_right * g_right / (h_right + HESSIAN_EPS)
                    - parent_score;

                // Ties keep the earlier feature and lower threshold
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: here,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Per-row gradients and hessians of a ranking loss
///
/// `groups` lists the row indices of each query (race). For every pair with a higher
/// relevance on `i` than on `j`, RankNet pushes `i` up and `j` down with strength
/// `rho = 1 / (1 + exp(s_i - s_j))`, weighted by `|ΔNDCG|` for LambdaRank.
fn ranking_gradients(
    objective: Objective,
    relevance: &[f64],
    scores: &[f64],
    groups: &[Vec<usize>],
) -> (Vec<f64>, Vec<f64>) {
    let mut gradients = vec![0.0; scores.len()];
    let mut hessians = vec![0.0; scores.len()];

    for group in groups {
        // Current position of each member when sorted by score, best first
        let mut by_score = group.clone();
        by_score.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let mut rank_of = HashMap::with_capacity(group.len());
        for (pos, &row) in by_score.iter().enumerate() {
            rank_of.insert(row, pos);
        }

        let mut ideal: Vec<f64> = group.iter().map(|&i| relevance[i]).collect();
        ideal.sort_by(|a, b| b.total_cmp(a));
        let ideal_dcg = dcg(&ideal);

        for &i in group {
            for &j in group {
                if relevance[i] <= relevance[j] {
                    continue;
                }

                let weight = match objective {
                    Objective::LambdaRank if ideal_dcg > 0.0 => {
                        let (pi, pj) = (rank_of[&i], rank_of[&j]);
                        let gain_diff = (relevance[i] - relevance[j]).abs();
                        let discount_diff = (discount(pi) - discount(pj)).abs();
                        gain_diff * discount_diff / ideal_dcg
                    }
                    _ => 1.0,
                };

                let rho = 1.0 / (1.0 + (scores[i] - scores[j]).exp());
                gradients[i] -= weight * rho;
                gradients[j] += weight * rho;
                let curvature = weight * rho * (1.0 - rho);
                hessians[i] += curvature;
                hessians[j] += curvature;
            }
        }
    }

    (gradients, hessians)
}

fn discount(position: usize) -> f64 {
    1.0 / (position as f64 + 2.0).log2()
}

/// Discounted cumulative gain with linear gain, in list order
pub fn dcg(relevance: &[f64]) -> f64 {
    relevance
        .iter()
        .enumerate()
        .map(|(pos, &rel)| rel * discount(pos))
        .sum()
}

/// Boosted tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub objective: Objective,
    pub feature_count: usize,
    pub bias: f64,
    pub learning_rate: f64,
    pub trees: Vec<Tree>,
}

impl Booster {
    /// Train on a feature matrix
    ///
    /// For ranking objectives `targets` are relevance grades and `groups` the row indices
    /// of each query; squared error ignores `groups`.
    pub fn fit(
        features: &[Vec<f32>],
        targets: &[f64],
        groups: &[Vec<usize>],
        params: &GbdtParams,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(PaceError::InsufficientData("no training rows".to_string()));
        }
        if features.len() != targets.len() {
            return Err(PaceError::Model(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        let feature_count = features[0].len();
        if features.iter().any(|row| row.len() != feature_count) {
            return Err(PaceError::Model("ragged feature matrix".to_string()));
        }

        let bias = match params.objective {
            Objective::SquaredError => targets.iter().sum::<f64>() / targets.len() as f64,
            _ => 0.0,
        };

        let mut scores = vec![bias; features.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            let (gradients, hessians): (Vec<f64>, Vec<f64>) = match params.objective {
                Objective::SquaredError => (
                    scores.iter().zip(targets).map(|(s, t)| s - t).collect(),
                    vec![1.0; scores.len()],
                ),
                objective => ranking_gradients(objective, targets, &scores, groups),
            };

            let tree = TreeBuilder {
                features,
                gradients: &gradients,
                hessians: &hessians,
                max_depth: params.max_depth,
                min_samples_leaf: params.min_samples_leaf,
            }
            .build();

            for (score, row) in scores.iter_mut().zip(features) {
                *score += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                log::debug!("{} round {}/{}", params.objective, round + 1, params.n_estimators);
            }
        }

        Ok(Booster {
            objective: params.objective,
            feature_count,
            bias,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict_row(&self, features: &[f32]) -> f64 {
        self.bias
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(features))
                .sum::<f64>()
    }

    pub fn predict(&self, features: &[Vec<f32>]) -> Vec<f64> {
        features.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        log::info!("Saved {} trees to {}", self.trees.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f32>>, Vec<f64>) {
        let features: Vec<Vec<f32>> = (0..40).map(|i| vec![i as f32, (i % 3) as f32]).collect();
        let targets = (0..40).map(|i| if i < 20 { 1.0 } else { 3.0 }).collect();
        (features, targets)
    }

    #[test]
    fn test_objective_names() {
        assert_eq!(serde_json::to_string(&Objective::LambdaRank).unwrap(), "\"lambdarank\"");
        assert_eq!(serde_json::to_string(&Objective::Pairwise).unwrap(), "\"pairwise\"");
        assert_eq!(Objective::SquaredError.to_string(), "squarederror");
        assert!(!Objective::SquaredError.is_ranking());
    }

    #[test]
    fn test_single_split_finds_step() {
        let (features, targets) = step_data();
        let gradients: Vec<f64> = targets.iter().map(|t| 2.0 - t).collect();
        let hessians = vec![1.0; targets.len()];
        let tree = TreeBuilder {
            features: &features,
            gradients: &gradients,
            hessians: &hessians,
            max_depth: 1,
            min_samples_leaf: 1,
        }
        .build();

        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0].feature, 0);
        assert_eq!(tree.nodes[0].threshold, 19.0);
        assert!((tree.predict(&[0.0, 0.0]) + 1.0).abs() < 1e-4);
        assert!((tree.predict(&[39.0, 0.0]) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_split_between_adjacent_values() {
        let low = 1.000_000_1_f32;
        let high = f32::from_bits(low.to_bits() + 1);
        let features = vec![vec![low], vec![high]];
        let gradients = vec![1.0, -1.0];
        let hessians = vec![1.0; 2];
        let tree = TreeBuilder {
            features: &features,
            gradients: &gradients,
            hessians: &hessians,
            max_depth: 1,
            min_samples_leaf: 1,
        }
        .build();

        assert_eq!(tree.nodes.len(), 3);
        assert!(tree.predict(&[low]) < 0.0);
        assert!(tree.predict(&[high]) > 0.0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let features = vec![vec![0.0], vec![1.0], vec![2.0]];
        let gradients = vec![-1.0, 0.0, 1.0];
        let hessians = vec![1.0; 3];
        let tree = TreeBuilder {
            features: &features,
            gradients: &gradients,
            hessians: &hessians,
            max_depth: 4,
            min_samples_leaf: 2,
        }
        .build();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_squared_error_fits_step() {
        let (features, targets) = step_data();
        let params = GbdtParams {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 2,
            min_samples_leaf: 1,
            ..Default::default()
        };
        let model = Booster::fit(&features, &targets, &[], &params).unwrap();

        assert_eq!(model.bias, 2.0);
        assert!((model.predict_row(&[5.0, 0.0]) - 1.0).abs() < 0.01);
        assert!((model.predict_row(&[30.0, 0.0]) - 3.0).abs() < 0.01);
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    fn ranking_data() -> (Vec<Vec<f32>>, Vec<f64>, Vec<Vec<usize>>) {
        // Four groups of five; relevance follows the first feature
        let mut features = Vec::new();
        let mut relevance = Vec::new();
        let mut groups = Vec::new();
        for g in 0..4 {
            let mut group = Vec::new();
            for k in 0..5 {
                group.push(features.len());
                features.push(vec![k as f32 + g as f32 * 0.1, ((k + g) % 2) as f32]);
                relevance.push(k as f64);
            }
            groups.push(group);
        }
        (features, relevance, groups)
    }

    #[test]
    fn test_ranking_objectives_order_groups() {
        let (features, relevance, groups) = ranking_data();

        for objective in [Objective::Pairwise, Objective::LambdaRank] {
            let params = GbdtParams {
                objective,
                n_estimators: 30,
                learning_rate: 0.3,
                max_depth: 3,
                min_samples_leaf: 1,
            };
            let model = Booster::fit(&features, &relevance, &groups, &params).unwrap();
            assert_eq!(model.bias, 0.0);

            let scores = model.predict(&features);
            for group in &groups {
                for pair in group.windows(2) {
                    assert!(scores[pair[1]] > scores[pair[0]], "{} misorders a pair", objective);
                }
            }
        }
    }

    #[test]
    fn test_ranking_gradients_balance() {
        let relevance = vec![2.0, 1.0, 0.0];
        let scores = vec![0.0; 3];
        let groups = vec![vec![0, 1, 2]];
        let (g, h) = ranking_gradients(Objective::Pairwise, &relevance, &scores, &groups);

        // Best row is pushed up, worst down, and the pushes cancel out
        assert!(g[0] < 0.0 && g[2] > 0.0);
        assert!(g.iter().sum::<f64>().abs() < 1e-12);
        assert!(h.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_dcg() {
        // 3/log2(2) + 1/log2(3)
        let expected = 3.0 + 1.0 / 3f64.log2();
        assert!((dcg(&[3.0, 1.0]) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let params = GbdtParams::default();
        assert!(Booster::fit(&[], &[], &[], &params).is_err());
        assert!(Booster::fit(&[vec![1.0]], &[1.0, 2.0], &[], &params).is_err());
    }

    #[test]
    fn test_save_load() {
        let (features, targets) = step_data();
        let params = GbdtParams {
            n_estimators: 5,
            min_samples_leaf: 1,
            ..Default::default()
        };
        let model = Booster::fit(&features, &targets, &[], &params).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbdt.json");
        model.save(&path).unwrap();
        let loaded = Booster::load(&path).unwrap();
        assert_eq!(loaded.predict(&features), model.predict(&features));
    }
}
