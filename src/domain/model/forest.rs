//! Standardized random-forest regressor.
//!
//! Inputs are z-scored with a [`Standardizer`] fitted on the training rows,
//! then each tree is grown on a bootstrap sample with a random feature subset
//! per split. Tree `t` is seeded with `seed + t`, so a fixed seed gives
//! repeatable predictions.

use crate::domain::error::AdvisorError;
use crate::domain::features::N_FEATURES;
use crate::domain::model::tree::{RegressionTree, TreeConfig};
use crate::domain::model::{FeatureVector, Regressor, Standardizer, check_training_shape};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `None` uses log2(features) + 1.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 50,
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    fn features_per_split(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (N_FEATURES as f64).log2() as usize + 1)
            .clamp(1, N_FEATURES)
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    standardizer: Option<Standardizer>,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            standardizer: None,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &[FeatureVector], y: &[f64]) -> Result<(), AdvisorError> {
        check_training_shape(x, y)?;
        if self.config.trees == 0 {
            return Err(AdvisorError::Model {
                reason: "forest needs at least one tree".into(),
            });
        }

        let standardizer = Standardizer::fit(x);
        let z = standardizer.transform_all(x);
        let n = z.len();
        let max_features = self.config.features_per_split();

        self.trees = (0..self.config.trees)
            .map(|t| {
                let seed = self.config.seed.wrapping_add(t as u64);
                let mut rng = StdRng::seed_from_u64(seed);
                let indices: Vec<usize> = if self.config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                let mut tree = RegressionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: Some(max_features),
                    seed,
                });
                tree.fit_indices(&z, y, &indices, &mut rng);
                tree
            })
            .collect();
        self.standardizer = Some(standardizer);

        Ok(())
    }

    fn predict(&self, x: &FeatureVector) -> Result<f64, AdvisorError> {
        let standardizer = self.standardizer.as_ref().ok_or_else(|| AdvisorError::Model {
            reason: "forest has not been fitted".into(),
        })?;
        let z = standardizer.transform(x);

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict(&z)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn name(&self) -> &str {
        "random-forest"
    }
}
