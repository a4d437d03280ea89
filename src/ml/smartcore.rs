//! SmartCore ML Model Wrapper
//!
//! Wraps SmartCore's `RandomForestRegressor` behind the [`Regressor`] seam.

use std::fmt;

use ::smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use ::smartcore::linalg::basic::matrix::DenseMatrix;
use anyhow::Result;

use super::models::{ModelParams, Regressor};
use crate::config::ModelKind;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// SmartCore RandomForest Model Wrapper
pub struct SmartcoreRandomForest {
    model: Forest,
    n_features: usize,
    /// Training parameters for reproducibility
    pub n_trees: usize,
    pub max_depth: Option<u16>,
}

impl fmt::Debug for SmartcoreRandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartcoreRandomForest")
            .field("n_features", &self.n_features)
            .field("n_trees", &self.n_trees)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

fn to_matrix(x: &[Vec<f64>], n_features: usize) -> Result<DenseMatrix<f64>> {
    let mut flat_data = Vec::with_capacity(x.len() * n_features);
    for row in x {
        if row.len() != n_features {
            anyhow::bail!(
                "All feature vectors must have {} values, got {}",
                n_features,
                row.len()
            );
        }
        flat_data.extend_from_slice(row);
    }
    // Row-major layout
    Ok(DenseMatrix::new(x.len(), n_features, flat_data, false))
}

impl SmartcoreRandomForest {
    pub fn parameters(params: &ModelParams) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf.max(1),
            min_samples_split: params.min_samples_split.max(2),
            n_trees: params.n_trees.max(1),
            m: None, // sqrt(n_features)
            keep_samples: false,
            seed: params.seed,
        }
    }

    /// Train a new RandomForest model
    pub fn train(x: &[Vec<f64>], y: &[f64], params: &ModelParams) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        if x.len() != y.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                x.len(),
                y.len()
            );
        }

        let n_features = x[0].len();
        if n_features == 0 {
            anyhow::bail!("Cannot train without features");
        }

        let x_matrix = to_matrix(x, n_features)?;
        let y_vec = y.to_vec();

        let model = Forest::fit(&x_matrix, &y_vec, Self::parameters(params))
            .map_err(|e| anyhow::anyhow!("RandomForest training failed: {:?}", e))?;

        Ok(Self {
            model,
            n_features,
            n_trees: params.n_trees,
            max_depth: params.max_depth,
        })
    }
}

impl Regressor for SmartcoreRandomForest {
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(x, self.n_features)?;
        self.model
            .predict(&matrix)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;

    fn params(n_trees: usize, max_depth: Option<u16>) -> ModelParams {
        ModelParams {
            n_trees,
            max_depth,
            ..ModelParams::from_config(&TrainingConfig::default())
        }
    }

    #[test]
    fn test_parameters_follow_config() {
        let p = SmartcoreRandomForest::parameters(&params(100, Some(10)));
        assert_eq!(p.n_trees, 100);
        assert_eq!(p.max_depth, Some(10));
        assert_eq!(p.seed, 42);
        assert!(!p.keep_samples);
    }

    #[test]
    fn test_train_and_predict() {
        // y = 2x1 + 3x2
        let x: Vec<Vec<f64>> = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![1.0, 2.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![4.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 1.0],
            vec![1.0, 3.0],
            vec![4.0, 4.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1]).collect();

        let model = SmartcoreRandomForest::train(&x, &y, &params(20, Some(5))).unwrap();
        assert_eq!(model.n_trees, 20);

        let pred = model.predict(&[vec![2.0, 2.0]]).unwrap();
        assert_eq!(pred.len(), 1);
        // Ensemble of bootstrapped trees stays inside the target range
        assert!(pred[0] >= 5.0 && pred[0] <= 20.0);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(SmartcoreRandomForest::train(&x, &[1.0, 2.0], &params(5, None)).is_err());

        let model =
            SmartcoreRandomForest::train(&[vec![1.0], vec![2.0]], &[1.0, 2.0], &params(5, None))
                .unwrap();
        assert!(model.predict(&[vec![1.0, 2.0]]).is_err());
    }
}
