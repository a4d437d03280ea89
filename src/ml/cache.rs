//! Memoised training keyed by data identity and hyperparameters.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use tracing::debug;

use super::models::{ModelParams, TrainedModel};
use super::training::{ModelTrainer, TrainingError};
use super::{Dataset, FeatureSpec, Target};

const DEFAULT_CAPACITY: usize = 8;

/// Identity of one training pass: target, feature list, every value of the
/// dataset, the hyperparameters and the split fraction.
pub fn fingerprint(
    target: Target,
    spec: &FeatureSpec,
    data: &Dataset,
    params: &ModelParams,
    test_fraction: f64,
) -> u64 {
    let mut h = DefaultHasher::new();
    target.hash(&mut h);
    spec.hash(&mut h);
    data.dates.hash(&mut h);
    for row in &data.x {
        for v in row {
            v.to_bits().hash(&mut h);
        }
    }
    for v in &data.y {
        v.to_bits().hash(&mut h);
    }
    params.hash(&mut h);
    test_fraction.to_bits().hash(&mut h);
    h.finish()
}

/// Small most-recently-used cache of trained models.
#[derive(Debug)]
pub struct ModelCache {
    entries: VecDeque<(u64, TrainedModel)>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached model for identical inputs, or train and remember it.
    ///
    /// With hyperparameter search enabled the key covers the search grid's
    /// base parameters; the grid itself is part of the trainer config.
    pub fn get_or_train(
        &mut self,
        trainer: &ModelTrainer,
        target: Target,
        spec: &FeatureSpec,
        data: &Dataset,
    ) -> Result<TrainedModel, TrainingError> {
        let cfg = trainer.config();
        let mut key = fingerprint(
            target,
            spec,
            data,
            &ModelParams::from_config(cfg),
            cfg.test_fraction,
        );
        if cfg.search.enabled {
            let mut h = DefaultHasher::new();
            key.hash(&mut h);
            (
                cfg.search.n_splits,
                &cfg.search.n_trees,
                &cfg.search.max_depth,
                &cfg.search.min_samples_leaf,
            )
                .hash(&mut h);
            key = h.finish();
        }

        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.hits += 1;
            debug!(%target, "model cache hit");
            if let Some(entry) = self.entries.remove(pos) {
                let model = entry.1.clone();
                self.entries.push_back(entry);
                return Ok(model);
            }
        }

        self.misses += 1;
        let model = trainer.train(target, spec, data)?;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, model.clone()));
        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelKind, TrainingConfig};
    use crate::forecast::features::FeatureId;
    use chrono::{Duration, NaiveDate};

    fn dataset(offset: f64) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        Dataset {
            dates: (0..10).map(|i| start + Duration::days(i)).collect(),
            x: (0..10).map(|i| vec![i as f64]).collect(),
            y: (0..10).map(|i| offset + i as f64).collect(),
        }
    }

    fn trainer() -> ModelTrainer {
        ModelTrainer::new(TrainingConfig {
            model: ModelKind::Mean,
            ..TrainingConfig::default()
        })
    }

    #[test]
    fn test_identical_inputs_hit() {
        let spec = FeatureSpec::new(vec![FeatureId::Day]);
        let mut cache = ModelCache::default();
        let a = cache
            .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(0.0))
            .unwrap();
        let b = cache
            .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(0.0))
            .unwrap();
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(a.metadata().model_id, b.metadata().model_id);
    }

    #[test]
    fn test_changed_data_or_params_miss() {
        let spec = FeatureSpec::new(vec![FeatureId::Day]);
        let mut cache = ModelCache::default();
        cache
            .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(0.0))
            .unwrap();
        cache
            .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(1.0))
            .unwrap();

        let other = ModelTrainer::new(TrainingConfig {
            model: ModelKind::Mean,
            test_fraction: 0.3,
            ..TrainingConfig::default()
        });
        cache
            .get_or_train(&other, Target::PeakDemand, &spec, &dataset(0.0))
            .unwrap();
        assert_eq!(cache.misses(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let spec = FeatureSpec::new(vec![FeatureId::Day]);
        let mut cache = ModelCache::new(2);
        for offset in [0.0, 1.0, 2.0] {
            cache
                .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(offset))
                .unwrap();
        }
        assert_eq!(cache.len(), 2);
        cache
            .get_or_train(&trainer(), Target::PeakDemand, &spec, &dataset(0.0))
            .unwrap();
        assert_eq!(cache.misses(), 4);
    }
}
