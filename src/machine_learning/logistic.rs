use super::tfidf::SparseVector;
use serde::{Deserialize, Serialize};

/// Binary logistic model over sparse TF-IDF rows: p = σ(w·x + b)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    /// Inverse of the regularisation strength C
    pub l2_penalty: f64,
}

impl LogisticRegression {
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: vec![0.0; n_features],
            bias: 0.0,
        }
    }

    /// Full-batch gradient descent on mean log-loss plus an L2 term on the
    /// weights. Deterministic for a given input order.
    pub fn fit(rows: &[SparseVector], labels: &[bool], n_features: usize, params: TrainingParams) -> Self {
        let mut model = Self::zeros(n_features);
        if rows.is_empty() {
            return model;
        }

        let n = rows.len() as f64;
        let reg = params.l2_penalty / n;
        let mut grad = vec![0.0; n_features];

        for epoch in 0..params.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;
            let mut loss = 0.0;

            for (row, &label) in rows.iter().zip(labels) {
                let p = model.probability(row);
                let y = if label { 1.0 } else { 0.0 };
                let err = p - y;
                for &(i, v) in row {
                    grad[i] += err * v;
                }
                grad_bias += err;
                loss -= y * p.max(1e-15).ln() + (1.0 - y) * (1.0 - p).max(1e-15).ln();
            }

            for (w, g) in model.weights.iter_mut().zip(&grad) {
                *w -= params.learning_rate * (g / n + reg * *w);
            }
            model.bias -= params.learning_rate * grad_bias / n;

            if epoch % 100 == 0 {
                log::trace!("epoch {} mean log-loss {:.5}", epoch, loss / n);
            }
        }

        model
    }

    pub fn decision(&self, row: &SparseVector) -> f64 {
        row.iter()
            .filter_map(|&(i, v)| self.weights.get(i).map(|w| w * v))
            .sum::<f64>()
            + self.bias
    }

    pub fn probability(&self, row: &SparseVector) -> f64 {
        sigmoid(self.decision(row))
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }

    pub fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
