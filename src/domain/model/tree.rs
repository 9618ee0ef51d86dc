//! CART regression tree (variance-reduction splits).

use crate::domain::error::AdvisorError;
use crate::domain::features::N_FEATURES;
use crate::domain::model::{FeatureVector, Regressor, check_training_shape};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` considers all of them.
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    config: TreeConfig,
    root: Option<Node>,
}

impl RegressionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self { config, root: None }
    }

    /// Fits on the rows selected by `indices` (which may repeat, for bootstrap samples).
    pub(crate) fn fit_indices(
        &mut self,
        x: &[FeatureVector],
        y: &[f64],
        indices: &[usize],
        rng: &mut StdRng,
    ) {
        self.root = Some(self.build(x, y, indices, 0, rng));
    }

    fn build(
        &self,
        x: &[FeatureVector],
        y: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let value = mean(&labels);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || variance(&labels) < 1e-12
        {
            return Node::Leaf(value);
        }

        match self.best_split(x, y, indices, rng) {
            Some(split) => Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: Box::new(self.build(x, y, &split.left, depth + 1, rng)),
                right: Box::new(self.build(x, y, &split.right, depth + 1, rng)),
            },
            None => Node::Leaf(value),
        }
    }

    fn best_split(
        &self,
        x: &[FeatureVector],
        y: &[f64],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..N_FEATURES).collect();
        features.shuffle(rng);
        features.truncate(self.config.max_features.unwrap_or(N_FEATURES).clamp(1, N_FEATURES));

        let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent = variance(&labels);
        let n = indices.len() as f64;

        let mut best_gain = 0.0;
        let mut best: Option<BestSplit> = None;

        for &feature in &features {
            let mut values: Vec<f64> = indices.iter().map(|&i| x[i][feature]).collect();
            values.sort_by(f64::total_cmp);
            values.dedup();

            for pair in values.windows(2) {
                let threshold = (pair[0] + pair[1]) / 2.0;
                let (left, right): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[i][feature] <= threshold);

                if left.len() < self.config.min_samples_leaf
                    || right.len() < self.config.min_samples_leaf
                {
                    continue;
                }

                let left_labels: Vec<f64> = left.iter().map(|&i| y[i]).collect();
                let right_labels: Vec<f64> = right.iter().map(|&i| y[i]).collect();
                let weighted = (left.len() as f64 * variance(&left_labels)
                    + right.len() as f64 * variance(&right_labels))
                    / n;
                let gain = parent - weighted;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        left,
                        right,
                    });
                }
            }
        }

        best
    }

    fn traverse(node: &Node, x: &FeatureVector) -> f64 {
        match node {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    Self::traverse(left, x)
                } else {
                    Self::traverse(right, x)
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        self.root.as_ref().map(depth_of).unwrap_or(0)
    }
}

impl Regressor for RegressionTree {
    fn fit(&mut self, x: &[FeatureVector], y: &[f64]) -> Result<(), AdvisorError> {
        check_training_shape(x, y)?;
        let indices: Vec<usize> = (0..x.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.fit_indices(x, y, &indices, &mut rng);
        Ok(())
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, AdvisorError> {
        self.root
            .as_ref()
            .map(|root| Self::traverse(root, x))
            .ok_or_else(|| AdvisorError::Model {
                reason: "tree has not been fitted".into(),
            })
    }

    fn name(&self) -> &str {
        "regression-tree"
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}
