//! Isolation forest outlier model
//!
//! Each tree recursively splits a random subsample on a random feature at a
//! random threshold until points are isolated or the height limit is hit.
//! Outliers isolate in fewer splits, so a short average path means anomalous.
//! Scores follow the usual convention: `score_samples` is the negated anomaly
//! score (lower is more abnormal) and the decision offset is the
//! `contamination` quantile of the training scores.

use crate::error::ArtifactError;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    params: ForestParams,
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Returns `None` when there are fewer than two samples to fit on.
    /// Contamination is clamped to [0, 0.5].
    pub fn fit(data: &[Vec<f64>], mut params: ForestParams) -> Option<Self> {
        if data.len() < 2 || params.n_trees == 0 {
            return None;
        }

        let contamination = if params.contamination.is_finite() {
            params.contamination.clamp(0.0, 0.5)
        } else {
            0.0
        };
        if contamination != params.contamination {
            log::warn!(
                "Contamination {} outside [0, 0.5], using {}",
                params.contamination,
                contamination
            );
            params.contamination = contamination;
        }

        let sample_size = params.max_samples.min(data.len()).max(2);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<&[f64]> = index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| data[i].as_slice())
                    .collect();
                build_tree(&sample, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params,
            trees,
            sample_size,
            offset: 0.0,
        };

        let scores: Vec<f64> = data.iter().map(|x| forest.score_sample(x)).collect();
        forest.offset = percentile(&scores, params.contamination * 100.0);
        log::debug!(
            "Fitted isolation forest: {} trees, {} samples per tree, offset {:.4}",
            forest.trees.len(),
            sample_size,
            forest.offset
        );
        Some(forest)
    }

    /// Negated anomaly score in [-1, 0); lower is more abnormal
    pub fn score_sample(&self, x: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| path_length(tree, x, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2f64).powf(-mean_depth / average_path_length(self.sample_size))
    }

    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_sample(x) - self.offset
    }

    /// `-1` for outliers, `1` for inliers
    pub fn predict(&self, x: &[f64]) -> i8 {
        if self.decision_function(x) < 0.0 {
            -1
        } else {
            1
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(self)?)?;
        log::info!("Saved anomaly model to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArtifactError::Missing(path.to_path_buf()));
        }
        let forest: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if forest.trees.is_empty() || forest.sample_size < 2 {
            return Err(ArtifactError::Invalid("empty isolation forest".to_string()));
        }
        Ok(forest)
    }
}

fn build_tree(sample: &[&[f64]], depth: usize, height_limit: usize, rng: &mut StdRng) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let dims = sample[0].len();
    let ranges: Vec<(usize, f64, f64)> = (0..dims)
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x[feature]), hi.max(x[feature]))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    // All remaining points are identical
    if ranges.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        sample.iter().copied().partition(|x| x[feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(&right, depth + 1, height_limit, rng)),
    }
}

fn path_length(node: &Node, x: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let value = x.get(*feature).copied().unwrap_or(0.0);
            if value <= *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` clamped to [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.is_empty() {
        return 0.0;
    }
    let q = if q.is_nan() { 0.0 } else { q.clamp(0.0, 100.0) };
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
